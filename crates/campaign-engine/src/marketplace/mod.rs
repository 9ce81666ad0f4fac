//! Influencer marketplace engine: campaigns with a reward fund, influencer offers that reserve
//! against it, and gigs whose approval and publication make an offer's reward claimable.

pub mod campaign;
pub mod clock;
pub mod domain;
pub mod fund;
pub mod gig;
pub mod influencer;
pub mod locks;
pub mod memory;
pub mod money;
pub mod offer;
pub mod repository;
pub mod reward;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use campaign::{
    Campaign, CampaignState, NewCampaign, NewPost, Post, PostType, RewardModel, Targeting,
    TargetingMismatch,
};
pub use clock::{Clock, SystemClock};
pub use domain::{Actor, CampaignId, GigId, InfluencerId, OfferId, PaymentId, PostId};
pub use fund::{Fund, FundError, FundProgress};
pub use gig::{Gig, GigContent, GigState, InsightState, InsightSubmission};
pub use influencer::{InfluencerProfile, InfluencerState, RecentPostMetrics};
pub use memory::InMemoryMarketplaceStore;
pub use money::{Currency, Money, MoneyError};
pub use offer::{ClaimBlocker, Claimability, Offer, OfferState, PaymentState};
pub use repository::{
    MarketplaceStore, Notification, NotificationError, NotificationPublisher, PayoutError,
    PayoutProvider, PayoutReceipt, PayoutRequest, RepositoryError,
};
pub use reward::{RewardBreakdown, RewardCalculator, RewardQuote, VatError, VatTable};
pub use router::marketplace_router;
pub use service::{MarketplaceError, MarketplaceService, OfferView};
