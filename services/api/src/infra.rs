use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use campaign_engine::config::MarketplaceConfig;
use campaign_engine::error::AppError;
use campaign_engine::marketplace::{
    Clock, Currency, InMemoryMarketplaceStore, MarketplaceService, Notification,
    NotificationError, NotificationPublisher, PaymentId, PayoutError, PayoutProvider,
    PayoutReceipt, PayoutRequest, RewardModel, VatTable,
};
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

pub(crate) type ApiService =
    MarketplaceService<InMemoryMarketplaceStore, InMemoryPayoutProvider, LoggingNotificationPublisher>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) vat_table: Arc<VatTable>,
    pub(crate) currency: Currency,
}

/// Payout rail that settles immediately and keeps a ledger for inspection.
#[derive(Default, Clone)]
pub(crate) struct InMemoryPayoutProvider {
    ledger: Arc<Mutex<HashMap<PaymentId, PayoutRequest>>>,
}

impl PayoutProvider for InMemoryPayoutProvider {
    fn pay(&self, request: PayoutRequest) -> Result<PayoutReceipt, PayoutError> {
        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| PayoutError::Unavailable("payout ledger poisoned".to_string()))?;
        let reference = format!("payout-{}", request.payment_id);
        info!(
            payment_id = %request.payment_id,
            influencer_id = %request.influencer_id,
            amount = %request.amount,
            "payout settled"
        );
        ledger.insert(request.payment_id.clone(), request);
        Ok(PayoutReceipt { reference })
    }
}

impl InMemoryPayoutProvider {
    pub(crate) fn settled(&self) -> usize {
        self.ledger.lock().map(|ledger| ledger.len()).unwrap_or_default()
    }
}

/// Publishes notifications to the log stream.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotificationPublisher;

impl NotificationPublisher for LoggingNotificationPublisher {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        info!(
            template = %notification.template,
            recipient = %notification.recipient,
            details = ?notification.details,
            "notification dispatched"
        );
        Ok(())
    }
}

pub(crate) fn load_vat_table(config: &MarketplaceConfig) -> Result<VatTable, AppError> {
    match &config.vat_table {
        Some(path) => {
            let table = VatTable::from_path(path)?;
            info!(path = %path.display(), rates = table.len(), "vat table loaded");
            Ok(table)
        }
        None => Ok(VatTable::standard()),
    }
}

pub(crate) fn build_service(
    config: &MarketplaceConfig,
    vat_table: VatTable,
    clock: Arc<dyn Clock>,
) -> (Arc<ApiService>, InMemoryPayoutProvider) {
    let payouts = InMemoryPayoutProvider::default();
    let service = MarketplaceService::new(
        Arc::new(InMemoryMarketplaceStore::default()),
        Arc::new(payouts.clone()),
        Arc::new(LoggingNotificationPublisher),
        clock,
        vat_table,
        config.clone(),
    );
    (Arc::new(service), payouts)
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_reward_model(raw: &str) -> Result<RewardModel, String> {
    RewardModel::parse(raw).ok_or_else(|| {
        format!("unknown reward model '{raw}' (expected assets, cash, reach, engagement or impressions)")
    })
}

pub(crate) fn parse_currency(raw: &str) -> Result<Currency, String> {
    Currency::parse(raw).ok_or_else(|| format!("unsupported currency '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_engine::marketplace::{InfluencerId, Money, OfferId};

    #[test]
    fn payouts_are_recorded_with_reference() {
        let payouts = InMemoryPayoutProvider::default();
        let receipt = payouts
            .pay(PayoutRequest {
                payment_id: PaymentId::from("pay-000007"),
                offer_id: OfferId::from("off-000003"),
                influencer_id: InfluencerId::from("inf-ola"),
                amount: Money::new(4_500, Currency::Gbp),
            })
            .expect("payout settles");
        assert_eq!(receipt.reference, "payout-pay-000007");
        assert_eq!(payouts.settled(), 1);
    }

    #[test]
    fn cli_parsers_reject_unknown_values() {
        assert_eq!(parse_reward_model("Reach"), Ok(RewardModel::Reach));
        assert!(parse_reward_model("barter").is_err());
        assert_eq!(parse_currency("zar"), Ok(Currency::Zar));
        assert!(parse_date("2025-13-01").is_err());
    }

    #[test]
    fn falls_back_to_built_in_vat_rates() {
        let table = load_vat_table(&MarketplaceConfig::default()).expect("standard table");
        assert!(!table.is_empty());
    }
}
