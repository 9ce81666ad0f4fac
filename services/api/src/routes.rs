use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use campaign_engine::error::AppError;
use campaign_engine::marketplace::{
    marketplace_router, Currency, InfluencerId, InfluencerProfile, InfluencerState, Money,
    RecentPostMetrics, RewardBreakdown, RewardCalculator, RewardModel, VatTable,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::infra::{ApiService, AppState};

/// Stateless reward estimate for an influencer against a hypothetical campaign.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct QuoteRequest {
    pub(crate) reward_model: RewardModel,
    pub(crate) budget: u64,
    #[serde(default)]
    pub(crate) currency: Option<Currency>,
    pub(crate) units: u64,
    #[serde(default = "default_posts")]
    pub(crate) posts: u64,
    #[serde(default)]
    pub(crate) followers: u64,
    #[serde(default)]
    pub(crate) engagement_rate: f64,
    /// Measured interactions that replace `engagement_rate` when present.
    #[serde(default)]
    pub(crate) recent_posts: Vec<RecentPostMetrics>,
    #[serde(default)]
    pub(crate) estimated_impressions: Option<u64>,
    #[serde(default = "default_region")]
    pub(crate) region: String,
    #[serde(default)]
    pub(crate) vat_registered: bool,
    #[serde(default)]
    pub(crate) date: Option<NaiveDate>,
}

fn default_posts() -> u64 {
    1
}

fn default_region() -> String {
    "GB".to_string()
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct QuoteResponse {
    pub(crate) reward_model: RewardModel,
    pub(crate) units: u64,
    pub(crate) fund_units: u64,
    pub(crate) share_percentage: f64,
    pub(crate) reward: RewardBreakdown,
}

pub(crate) fn quote_reward(
    request: &QuoteRequest,
    fallback_currency: Currency,
    vat_table: &VatTable,
) -> Result<QuoteResponse, AppError> {
    if request.units == 0 {
        return Err(AppError::Input("fund units must be positive".to_string()));
    }
    if request.posts == 0 {
        return Err(AppError::Input("a campaign needs at least one post".to_string()));
    }
    if !request.engagement_rate.is_finite() || request.engagement_rate < 0.0 {
        return Err(AppError::Input(
            "engagement rate must be a non-negative fraction".to_string(),
        ));
    }

    let currency = request.currency.unwrap_or(fallback_currency);
    let calculator = RewardCalculator::new(
        request.reward_model,
        Money::new(request.budget, currency),
        request.units,
        request.posts,
    );
    let profile = InfluencerProfile {
        id: InfluencerId::from("quote"),
        username: "quote".to_string(),
        region: request.region.clone(),
        gender: None,
        birthday: None,
        followers: request.followers,
        engagement_rate: request.engagement_rate,
        estimated_impressions: request.estimated_impressions,
        vat_registered: request.vat_registered,
        interests: Vec::new(),
        state: InfluencerState::Verified,
    }
    .with_recent_posts(&request.recent_posts);

    let quote = calculator.quote(&profile);
    if quote.units > request.units {
        return Err(AppError::Input(format!(
            "influencer needs {} units but the fund only holds {}",
            quote.units, request.units
        )));
    }

    let on = request.date.unwrap_or_else(|| Utc::now().date_naive());
    let reward = RewardBreakdown::compute(
        quote.reward,
        request.vat_registered,
        &profile.region,
        on,
        vat_table,
    )
    .map_err(|err| AppError::Input(format!("reward cannot be priced: {err}")))?;

    Ok(QuoteResponse {
        reward_model: quote.reward_model,
        units: quote.units,
        fund_units: request.units,
        share_percentage: quote.units as f64 / request.units as f64 * 100.0,
        reward,
    })
}

pub(crate) fn with_marketplace_routes(service: Arc<ApiService>) -> axum::Router {
    marketplace_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/rewards/quote",
            axum::routing::post(reward_quote_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn reward_quote_endpoint(
    Extension(state): Extension<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<QuoteResponse>, AppError> {
    quote_reward(&request, state.currency, &state.vat_table).map(Json)
}
