use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::campaign::Campaign;
use super::domain::{CampaignId, GigId, InfluencerId, OfferId, PaymentId};
use super::gig::Gig;
use super::influencer::InfluencerProfile;
use super::money::Money;
use super::offer::Offer;

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

pub trait CampaignRepository: Send + Sync {
    fn insert_campaign(&self, campaign: Campaign) -> Result<Campaign, RepositoryError>;
    fn update_campaign(&self, campaign: Campaign) -> Result<(), RepositoryError>;
    fn fetch_campaign(&self, id: &CampaignId) -> Result<Option<Campaign>, RepositoryError>;
}

pub trait OfferRepository: Send + Sync {
    fn insert_offer(&self, offer: Offer) -> Result<Offer, RepositoryError>;
    fn update_offer(&self, offer: Offer) -> Result<(), RepositoryError>;
    fn fetch_offer(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError>;
    fn offers_by_campaign(&self, campaign_id: &CampaignId) -> Result<Vec<Offer>, RepositoryError>;
}

pub trait GigRepository: Send + Sync {
    fn insert_gig(&self, gig: Gig) -> Result<Gig, RepositoryError>;
    fn update_gig(&self, gig: Gig) -> Result<(), RepositoryError>;
    fn fetch_gig(&self, id: &GigId) -> Result<Option<Gig>, RepositoryError>;
    fn gigs_by_offer(&self, offer_id: &OfferId) -> Result<Vec<Gig>, RepositoryError>;
}

pub trait InfluencerRepository: Send + Sync {
    fn insert_influencer(
        &self,
        influencer: InfluencerProfile,
    ) -> Result<InfluencerProfile, RepositoryError>;
    fn fetch_influencer(
        &self,
        id: &InfluencerId,
    ) -> Result<Option<InfluencerProfile>, RepositoryError>;
}

/// Storage abstraction covering every aggregate the marketplace service touches.
pub trait MarketplaceStore:
    CampaignRepository + OfferRepository + GigRepository + InfluencerRepository
{
}

impl<T> MarketplaceStore for T where
    T: CampaignRepository + OfferRepository + GigRepository + InfluencerRepository
{
}

/// Outbound payout rail (bank transfer, wallet, etc.).
pub trait PayoutProvider: Send + Sync {
    fn pay(&self, request: PayoutRequest) -> Result<PayoutReceipt, PayoutError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub payment_id: PaymentId,
    pub offer_id: OfferId,
    pub influencer_id: InfluencerId,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutReceipt {
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayoutError {
    #[error("payout declined: {0}")]
    Declined(String),
    #[error("payout rail unavailable: {0}")]
    Unavailable(String),
}

/// Trait describing outbound notification hooks (e-mail, push).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: String,
    pub recipient: InfluencerId,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
