use crate::cli::ServeArgs;
use crate::infra::{build_service, load_vat_table, AppState};
use crate::routes::with_marketplace_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use campaign_engine::config::AppConfig;
use campaign_engine::error::AppError;
use campaign_engine::marketplace::SystemClock;
use campaign_engine::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let vat_table = load_vat_table(&config.marketplace)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        vat_table: Arc::new(vat_table.clone()),
        currency: config.marketplace.currency,
    };

    let (service, _payouts) = build_service(&config.marketplace, vat_table, Arc::new(SystemClock));

    let app = with_marketplace_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        review_period_hours = config.marketplace.review_period_hours,
        currency = config.marketplace.currency.code(),
        "campaign engine ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
