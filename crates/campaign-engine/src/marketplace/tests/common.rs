use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::config::MarketplaceConfig;
use crate::marketplace::campaign::{NewCampaign, NewPost, PostType, RewardModel, Targeting};
use crate::marketplace::clock::Clock;
use crate::marketplace::domain::{InfluencerId, OfferId, PostId};
use crate::marketplace::gig::GigContent;
use crate::marketplace::influencer::{InfluencerProfile, InfluencerState};
use crate::marketplace::memory::InMemoryMarketplaceStore;
use crate::marketplace::money::{Currency, Money};
use crate::marketplace::repository::{
    Notification, NotificationError, NotificationPublisher, PayoutError, PayoutProvider,
    PayoutReceipt, PayoutRequest,
};
use crate::marketplace::reward::VatTable;
use crate::marketplace::service::MarketplaceService;
use crate::marketplace::{Actor, Campaign, Offer};

pub(super) type TestService =
    MarketplaceService<InMemoryMarketplaceStore, RecordingPayouts, RecordingNotifications>;

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Clock the tests move forward by hand.
#[derive(Debug)]
pub(super) struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub(super) fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

#[derive(Debug, Default)]
pub(super) struct RecordingPayouts {
    requests: Mutex<Vec<PayoutRequest>>,
    declining: AtomicBool,
}

impl RecordingPayouts {
    pub(super) fn decline_next(&self, declining: bool) {
        self.declining.store(declining, Ordering::SeqCst);
    }

    pub(super) fn requests(&self) -> Vec<PayoutRequest> {
        self.requests.lock().expect("payout mutex poisoned").clone()
    }
}

impl PayoutProvider for RecordingPayouts {
    fn pay(&self, request: PayoutRequest) -> Result<PayoutReceipt, PayoutError> {
        let mut requests = self.requests.lock().expect("payout mutex poisoned");
        requests.push(request.clone());
        if self.declining.load(Ordering::SeqCst) {
            return Err(PayoutError::Declined("account closed".to_string()));
        }
        Ok(PayoutReceipt {
            reference: format!("txn-{}", request.payment_id),
        })
    }
}

#[derive(Debug, Default)]
pub(super) struct RecordingNotifications {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifications {
    pub(super) fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub(super) fn templates(&self) -> Vec<String> {
        self.sent
            .lock()
            .expect("notification mutex poisoned")
            .iter()
            .map(|notification| notification.template.clone())
            .collect()
    }
}

impl NotificationPublisher for RecordingNotifications {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::Transport("smtp offline".to_string()));
        }
        self.sent
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct Harness {
    pub service: Arc<TestService>,
    pub clock: Arc<FixedClock>,
    pub payouts: Arc<RecordingPayouts>,
    pub notifications: Arc<RecordingNotifications>,
}

pub(super) fn harness() -> Harness {
    let clock = Arc::new(FixedClock::new(start()));
    let payouts = Arc::new(RecordingPayouts::default());
    let notifications = Arc::new(RecordingNotifications::default());
    let service = Arc::new(MarketplaceService::new(
        Arc::new(InMemoryMarketplaceStore::default()),
        payouts.clone(),
        notifications.clone(),
        clock.clone(),
        VatTable::standard(),
        MarketplaceConfig::default(),
    ));

    Harness {
        service,
        clock,
        payouts,
        notifications,
    }
}

pub(super) fn influencer(handle: &str, followers: u64) -> InfluencerProfile {
    InfluencerProfile {
        id: InfluencerId(format!("inf-{handle}")),
        username: handle.to_string(),
        region: "GB".to_string(),
        gender: None,
        birthday: NaiveDate::from_ymd_opt(1996, 3, 14),
        followers,
        engagement_rate: 0.04,
        estimated_impressions: None,
        vat_registered: false,
        interests: vec!["travel".to_string()],
        state: InfluencerState::Verified,
    }
}

pub(super) fn post(post_type: PostType) -> NewPost {
    NewPost {
        post_type,
        opened_at: start() - Duration::days(1),
        deadline: start() + Duration::days(30),
        requires_review_before_posting: true,
        brief: "Show the product in use".to_string(),
    }
}

pub(super) fn new_campaign(reward_model: RewardModel, units: u64, budget: u64) -> NewCampaign {
    NewCampaign {
        advertiser: "Northwind Outdoors".to_string(),
        name: "Spring trail launch".to_string(),
        reward_model,
        units,
        budget: Money::new(budget, Currency::Gbp),
        posts: vec![post(PostType::Standard)],
        targeting: Targeting::default(),
        apply_first: false,
        brand_match: false,
        brand_safety: false,
        require_insights: false,
        review_period_hours: None,
    }
}

pub(super) fn launched(service: &TestService, new: NewCampaign) -> Campaign {
    let campaign = service.create_campaign(new).expect("campaign drafted");
    service
        .launch_campaign(&campaign.id, Actor::Brand)
        .expect("campaign launched")
}

/// Register an influencer and open an offer for them.
pub(super) fn offer_for(service: &TestService, campaign: &Campaign, profile: InfluencerProfile) -> Offer {
    let profile = service
        .register_influencer(profile)
        .expect("influencer registered");
    service
        .create_offer(&campaign.id, &profile.id, Actor::Brand)
        .expect("offer created")
}

pub(super) fn content() -> GigContent {
    GigContent {
        caption: "Morning miles in the new trail shoes".to_string(),
        media_url: "https://cdn.example.com/gigs/trail.jpg".to_string(),
    }
}

/// Drive an accepted offer's only post to a live, approved gig.
pub(super) fn publish_gig(service: &TestService, offer_id: &OfferId, post_id: &PostId) {
    let gig = service
        .submit_gig(offer_id, post_id, content())
        .expect("gig submitted");
    service
        .approve_gig(&gig.id, Actor::Brand)
        .expect("gig approved");
    service
        .link_post(&gig.id, "https://instagram.com/p/abc123".to_string(), None)
        .expect("post linked");
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
