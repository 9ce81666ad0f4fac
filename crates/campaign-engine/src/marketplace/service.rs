use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::campaign::{Campaign, CampaignState, CampaignTransitionError, NewCampaign, TargetingMismatch};
use super::clock::Clock;
use super::domain::{Actor, CampaignId, GigId, InfluencerId, OfferId, PaymentId, PostId};
use super::fund::{Fund, FundError, FundProgress};
use super::gig::{Gig, GigContent, GigState, GigTransitionError, InsightSubmission, ReviewPolicy};
use super::influencer::InfluencerProfile;
use super::money::{Money, MoneyError};
use super::offer::{
    ClaimBlocker, Claimability, Offer, OfferEvent, OfferEventKind, OfferState,
    OfferTransitionError, Payment, PaymentState, TransitionContext,
};
use super::repository::{
    MarketplaceStore, Notification, NotificationPublisher, PayoutError, PayoutProvider,
    PayoutRequest, RepositoryError,
};
use super::locks::ReservationLocks;
use super::reward::{RewardBreakdown, RewardCalculator, VatTable};
use crate::config::MarketplaceConfig;

static CAMPAIGN_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static OFFER_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static GIG_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static PAYMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_id(sequence: &AtomicU64, prefix: &str) -> String {
    let id = sequence.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{id:06}")
}

/// Error raised by the marketplace service.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("campaign is {0} and no longer takes offers")]
    CampaignClosed(&'static str),
    #[error("influencer {0} already has an open offer for this campaign")]
    DuplicateOffer(InfluencerId),
    #[error("campaign has no post {0}")]
    UnknownPost(PostId),
    #[error("post {0} is not open for submissions")]
    PostClosed(PostId),
    #[error("offer must be accepted and not yet claimed to change its content")]
    OfferNotAccepted,
    #[error("a gig for post {0} is already in progress")]
    GigAlreadySubmitted(PostId),
    #[error("offer is not claimable: {}", summarize(.0))]
    NotClaimable(Vec<ClaimBlocker>),
    #[error(transparent)]
    Campaign(#[from] CampaignTransitionError),
    #[error(transparent)]
    Offer(#[from] OfferTransitionError),
    #[error(transparent)]
    Gig(#[from] GigTransitionError),
    #[error(transparent)]
    Fund(#[from] FundError),
    #[error(transparent)]
    Money(#[from] MoneyError),
    #[error(transparent)]
    Targeting(#[from] TargetingMismatch),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Payout(#[from] PayoutError),
}

fn summarize(blockers: &[ClaimBlocker]) -> String {
    blockers
        .iter()
        .map(ClaimBlocker::summary)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Offer with everything a client needs to render its status.
#[derive(Debug, Clone, Serialize)]
pub struct OfferView {
    pub offer: Offer,
    pub campaign_state: CampaignState,
    pub reward: RewardBreakdown,
    pub claimability: Claimability,
    pub gigs: Vec<Gig>,
}

/// Service composing storage, fund accounting, reward calculation, and outbound collaborators.
pub struct MarketplaceService<S, P, N> {
    store: Arc<S>,
    payouts: Arc<P>,
    notifications: Arc<N>,
    clock: Arc<dyn Clock>,
    vat_table: Arc<VatTable>,
    locks: ReservationLocks,
    config: MarketplaceConfig,
}

impl<S, P, N> MarketplaceService<S, P, N>
where
    S: MarketplaceStore + 'static,
    P: PayoutProvider + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(
        store: Arc<S>,
        payouts: Arc<P>,
        notifications: Arc<N>,
        clock: Arc<dyn Clock>,
        vat_table: VatTable,
        config: MarketplaceConfig,
    ) -> Self {
        Self {
            store,
            payouts,
            notifications,
            clock,
            vat_table: Arc::new(vat_table),
            locks: ReservationLocks::new(),
            config,
        }
    }

    pub fn config(&self) -> &MarketplaceConfig {
        &self.config
    }

    // Influencers

    pub fn register_influencer(
        &self,
        influencer: InfluencerProfile,
    ) -> Result<InfluencerProfile, MarketplaceError> {
        if influencer.username.trim().is_empty() {
            return Err(MarketplaceError::Invalid("username is required".to_string()));
        }
        if !influencer.engagement_rate.is_finite() || influencer.engagement_rate < 0.0 {
            return Err(MarketplaceError::Invalid(
                "engagement rate must be a non-negative fraction".to_string(),
            ));
        }
        let stored = self.store.insert_influencer(influencer)?;
        info!(influencer_id = %stored.id, followers = stored.followers, "influencer registered");
        Ok(stored)
    }

    pub fn influencer(&self, id: &InfluencerId) -> Result<InfluencerProfile, MarketplaceError> {
        self.store
            .fetch_influencer(id)?
            .ok_or_else(|| not_found("influencer", id.as_str()))
    }

    // Campaigns

    pub fn create_campaign(&self, new: NewCampaign) -> Result<Campaign, MarketplaceError> {
        if new.name.trim().is_empty() {
            return Err(MarketplaceError::Invalid("campaign name is required".to_string()));
        }
        if let (Some(min), Some(max)) = (new.targeting.min_followers, new.targeting.max_followers)
        {
            if min > max {
                return Err(MarketplaceError::Invalid(
                    "targeting minimum followers exceeds maximum".to_string(),
                ));
            }
        }

        let id = CampaignId(next_id(&CAMPAIGN_SEQUENCE, "cmp"));
        let campaign = Campaign::draft(id, new, self.clock.now());
        let stored = self.store.insert_campaign(campaign)?;
        info!(
            campaign_id = %stored.id,
            reward_model = stored.reward_model.label(),
            units = stored.units,
            "campaign drafted"
        );
        Ok(stored)
    }

    pub fn campaign(&self, id: &CampaignId) -> Result<Campaign, MarketplaceError> {
        self.load_campaign(id)
    }

    pub fn launch_campaign(
        &self,
        id: &CampaignId,
        actor: Actor,
    ) -> Result<Campaign, MarketplaceError> {
        self.locks.with_campaign(id, || {
            let mut campaign = self.load_campaign(id)?;
            campaign.launch(self.clock.now(), actor)?;
            self.store.update_campaign(campaign.clone())?;
            info!(campaign_id = %id, "campaign launched");
            Ok(campaign)
        })
    }

    pub fn stash_campaign(
        &self,
        id: &CampaignId,
        actor: Actor,
    ) -> Result<Campaign, MarketplaceError> {
        self.locks.with_campaign(id, || {
            let mut campaign = self.load_campaign(id)?;
            campaign.stash(self.clock.now(), actor)?;
            self.store.update_campaign(campaign.clone())?;
            info!(campaign_id = %id, "campaign stashed");
            Ok(campaign)
        })
    }

    /// Complete a launched campaign, revoking offers that never reached a reservation.
    pub fn complete_campaign(
        &self,
        id: &CampaignId,
        actor: Actor,
    ) -> Result<Campaign, MarketplaceError> {
        self.locks.with_campaign(id, || {
            let mut campaign = self.load_campaign(id)?;
            let now = self.clock.now();
            campaign.complete(now, actor)?;

            let ctx = TransitionContext::for_campaign(&campaign, false);
            let mut revoked = 0usize;
            for mut offer in self.store.offers_by_campaign(id)? {
                if !offer.state.is_outstanding() {
                    continue;
                }
                let event = OfferEvent::new(OfferEventKind::Revoked, Actor::System, now)
                    .with_reason("campaign completed");
                offer.apply(event, &ctx)?;
                self.store.update_offer(offer)?;
                revoked += 1;
            }

            self.store.update_campaign(campaign.clone())?;
            info!(campaign_id = %id, revoked, "campaign completed");
            Ok(campaign)
        })
    }

    pub fn fund_progress(&self, id: &CampaignId) -> Result<FundProgress, MarketplaceError> {
        let campaign = self.load_campaign(id)?;
        let offers = self.store.offers_by_campaign(id)?;
        Ok(Fund::for_campaign(&campaign, &offers).progress())
    }

    // Offers

    pub fn create_offer(
        &self,
        campaign_id: &CampaignId,
        influencer_id: &InfluencerId,
        actor: Actor,
    ) -> Result<Offer, MarketplaceError> {
        let influencer = self.influencer(influencer_id)?;

        self.locks.with_campaign(campaign_id, || {
            let campaign = self.load_campaign(campaign_id)?;
            if !matches!(campaign.state, CampaignState::Draft | CampaignState::Launched) {
                return Err(MarketplaceError::CampaignClosed(campaign.state.label()));
            }

            let now = self.clock.now();
            campaign.targeting.check(&influencer, now.date_naive())?;

            let existing = self.store.offers_by_campaign(campaign_id)?;
            if existing
                .iter()
                .any(|offer| &offer.influencer_id == influencer_id && !offer.state.is_terminal())
            {
                return Err(MarketplaceError::DuplicateOffer(influencer_id.clone()));
            }

            let quote = RewardCalculator::for_campaign(&campaign).quote(&influencer);
            let offer = Offer::create(
                OfferId(next_id(&OFFER_SEQUENCE, "off")),
                campaign_id.clone(),
                influencer_id.clone(),
                quote.units,
                quote.reward,
                OfferEvent::new(OfferEventKind::Created, actor, now),
            );
            let stored = self.store.insert_offer(offer)?;
            info!(
                offer_id = %stored.id,
                campaign_id = %campaign_id,
                influencer_id = %influencer_id,
                units = stored.units,
                reward = %stored.reward,
                "offer created"
            );
            Ok(stored)
        })
    }

    pub fn send_invite(&self, offer_id: &OfferId, actor: Actor) -> Result<Offer, MarketplaceError> {
        let offer = self.transition_offer(offer_id, OfferEventKind::InviteSent, actor, None)?;
        self.notify(&offer, "offer_invite", &[("reward", offer.effective_reward().to_string())]);
        Ok(offer)
    }

    /// Influencer accepts an invitation directly, taking units from the fund.
    pub fn reserve_offer(&self, offer_id: &OfferId) -> Result<Offer, MarketplaceError> {
        self.transition_offer(offer_id, OfferEventKind::Reserved, Actor::Influencer, None)
    }

    pub fn request_participation(&self, offer_id: &OfferId) -> Result<Offer, MarketplaceError> {
        self.transition_offer(
            offer_id,
            OfferEventKind::RequestedParticipation,
            Actor::Influencer,
            None,
        )
    }

    pub fn set_as_candidate(
        &self,
        offer_id: &OfferId,
        actor: Actor,
    ) -> Result<Offer, MarketplaceError> {
        self.transition_offer(offer_id, OfferEventKind::SetAsCandidate, actor, None)
    }

    pub fn approve_by_brand(
        &self,
        offer_id: &OfferId,
        actor: Actor,
    ) -> Result<Offer, MarketplaceError> {
        let offer = self.transition_offer(offer_id, OfferEventKind::ApprovedByBrand, actor, None)?;
        self.notify(&offer, "offer_approved_by_brand", &[]);
        Ok(offer)
    }

    pub fn accept_offer(&self, offer_id: &OfferId) -> Result<Offer, MarketplaceError> {
        self.transition_offer(offer_id, OfferEventKind::Accepted, Actor::Influencer, None)
    }

    pub fn reject_offer(
        &self,
        offer_id: &OfferId,
        reason: Option<String>,
    ) -> Result<Offer, MarketplaceError> {
        self.transition_offer(offer_id, OfferEventKind::Rejected, Actor::Influencer, reason)
    }

    pub fn reject_candidate(
        &self,
        offer_id: &OfferId,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<Offer, MarketplaceError> {
        self.transition_offer(offer_id, OfferEventKind::RejectedByBrand, actor, reason)
    }

    pub fn revoke_offer(
        &self,
        offer_id: &OfferId,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<Offer, MarketplaceError> {
        let offer = self.transition_offer(offer_id, OfferEventKind::Revoked, actor, reason)?;
        self.notify(&offer, "offer_revoked", &[]);
        Ok(offer)
    }

    /// Re-open a rejected or revoked offer, re-pricing it from the influencer's current audience.
    pub fn renew_offer(&self, offer_id: &OfferId, actor: Actor) -> Result<Offer, MarketplaceError> {
        let offer = self.load_offer(offer_id)?;
        let influencer = self.influencer(&offer.influencer_id)?;
        let campaign_id = offer.campaign_id.clone();

        let offer = self.locks.with_campaign(&campaign_id, || {
            let mut offer = self.load_offer(offer_id)?;
            let campaign = self.load_campaign(&campaign_id)?;
            let now = self.clock.now();
            campaign.targeting.check(&influencer, now.date_naive())?;

            let siblings = self.store.offers_by_campaign(&campaign_id)?;
            if siblings.iter().any(|other| {
                other.id != offer.id
                    && other.influencer_id == offer.influencer_id
                    && !other.state.is_terminal()
            }) {
                return Err(MarketplaceError::DuplicateOffer(offer.influencer_id.clone()));
            }

            let ctx = TransitionContext::for_campaign(&campaign, false);
            offer.apply(OfferEvent::new(OfferEventKind::Renewed, actor, now), &ctx)?;
            let quote = RewardCalculator::for_campaign(&campaign).quote(&influencer);
            offer.units = quote.units;
            offer.reward = quote.reward;
            self.store.update_offer(offer.clone())?;
            info!(offer_id = %offer.id, units = offer.units, "offer renewed");
            Ok(offer)
        })?;

        self.notify(&offer, "offer_invite", &[("reward", offer.effective_reward().to_string())]);
        Ok(offer)
    }

    pub fn set_custom_reward(
        &self,
        offer_id: &OfferId,
        reward: Money,
    ) -> Result<Offer, MarketplaceError> {
        let mut offer = self.load_offer(offer_id)?;
        if offer.is_claimed() {
            return Err(OfferTransitionError::AlreadyClaimed.into());
        }
        offer.reward.ensure_same_currency(&reward)?;
        offer.custom_reward = Some(reward);
        self.store.update_offer(offer.clone())?;
        info!(offer_id = %offer_id, reward = %reward, "custom reward set");
        Ok(offer)
    }

    pub fn offer(&self, offer_id: &OfferId) -> Result<Offer, MarketplaceError> {
        self.load_offer(offer_id)
    }

    pub fn offer_view(&self, offer_id: &OfferId) -> Result<OfferView, MarketplaceError> {
        let offer = self.load_offer(offer_id)?;
        let campaign = self.load_campaign(&offer.campaign_id)?;
        let influencer = self.influencer(&offer.influencer_id)?;
        let gigs = self.store.gigs_by_offer(offer_id)?;
        let now = self.clock.now();

        let reward = self.breakdown(&offer, &influencer, now)?;
        let claimability = Claimability::evaluate(
            &offer,
            &campaign,
            &gigs,
            self.config.review_period_hours,
            now,
        );

        Ok(OfferView {
            offer,
            campaign_state: campaign.state,
            reward,
            claimability,
            gigs,
        })
    }

    /// Claim the reward for a claimable offer and dispatch the payout.
    pub fn claim_reward(&self, offer_id: &OfferId) -> Result<Offer, MarketplaceError> {
        let offer = self.load_offer(offer_id)?;
        let influencer = self.influencer(&offer.influencer_id)?;
        let campaign_id = offer.campaign_id.clone();

        let offer = self.locks.with_campaign(&campaign_id, || {
            let mut offer = self.load_offer(offer_id)?;
            let campaign = self.load_campaign(&campaign_id)?;
            let gigs = self.store.gigs_by_offer(offer_id)?;
            let now = self.clock.now();

            let claimability = Claimability::evaluate(
                &offer,
                &campaign,
                &gigs,
                self.config.review_period_hours,
                now,
            );
            if !claimability.claimable {
                return Err(MarketplaceError::NotClaimable(claimability.blockers));
            }

            let ctx = TransitionContext::for_campaign(&campaign, has_approved_gig(&gigs));
            offer.apply(
                OfferEvent::new(OfferEventKind::Claimed, Actor::Influencer, now),
                &ctx,
            )?;
            let breakdown = self.breakdown(&offer, &influencer, now)?;
            offer.payment = Some(Payment {
                id: PaymentId(next_id(&PAYMENT_SEQUENCE, "pay")),
                amount: breakdown.total,
                state: PaymentState::Pending,
                requested_at: now,
                completed_at: None,
                reference: None,
            });
            self.store.update_offer(offer.clone())?;
            info!(offer_id = %offer.id, total = %breakdown.total, "reward claimed");
            Ok(offer)
        })?;

        self.dispatch_payment(offer)
    }

    /// Re-send a payout that previously failed.
    pub fn retry_payment(&self, offer_id: &OfferId) -> Result<Offer, MarketplaceError> {
        let mut offer = self.load_offer(offer_id)?;
        let campaign = self.load_campaign(&offer.campaign_id)?;
        let ctx = TransitionContext::for_campaign(&campaign, true);
        offer.apply(
            OfferEvent::new(OfferEventKind::PaymentRetried, Actor::Admin, self.clock.now()),
            &ctx,
        )?;
        self.store.update_offer(offer.clone())?;
        self.dispatch_payment(offer)
    }

    // Gigs

    pub fn submit_gig(
        &self,
        offer_id: &OfferId,
        post_id: &PostId,
        content: GigContent,
    ) -> Result<Gig, MarketplaceError> {
        let offer = self.load_offer(offer_id)?;
        let campaign_id = offer.campaign_id.clone();

        self.locks.with_campaign(&campaign_id, || {
            let offer = self.load_offer(offer_id)?;
            let campaign = self.load_campaign(&campaign_id)?;
            if !campaign.is_launched() {
                return Err(OfferTransitionError::CampaignNotLaunched.into());
            }
            if offer.state != OfferState::Accepted || offer.is_claimed() {
                return Err(MarketplaceError::OfferNotAccepted);
            }

            let post = campaign
                .post(post_id)
                .ok_or_else(|| MarketplaceError::UnknownPost(post_id.clone()))?;
            let now = self.clock.now();
            if !post.is_open(now) {
                return Err(MarketplaceError::PostClosed(post_id.clone()));
            }

            let gigs = self.store.gigs_by_offer(offer_id)?;
            if gigs
                .iter()
                .any(|gig| &gig.post_id == post_id && gig.state.is_active())
            {
                return Err(MarketplaceError::GigAlreadySubmitted(post_id.clone()));
            }

            let gig = Gig::submit(
                GigId(next_id(&GIG_SEQUENCE, "gig")),
                offer_id.clone(),
                post_id.clone(),
                content,
                now,
            );
            let stored = self.store.insert_gig(gig)?;
            info!(gig_id = %stored.id, offer_id = %offer_id, post_id = %post_id, "gig submitted");
            Ok(stored)
        })
    }

    pub fn gig(&self, gig_id: &GigId) -> Result<Gig, MarketplaceError> {
        self.load_gig(gig_id)
    }

    pub fn review_gig(&self, gig_id: &GigId, actor: Actor) -> Result<Gig, MarketplaceError> {
        self.update_gig(gig_id, |gig, policy, now| gig.review(policy, actor, now))
    }

    pub fn approve_gig(&self, gig_id: &GigId, actor: Actor) -> Result<Gig, MarketplaceError> {
        self.update_gig(gig_id, |gig, policy, now| gig.approve(policy, actor, now))
    }

    pub fn reject_gig(
        &self,
        gig_id: &GigId,
        actor: Actor,
        reason: String,
    ) -> Result<Gig, MarketplaceError> {
        let gig = self.update_gig(gig_id, |gig, _, now| gig.reject(reason.clone(), actor, now))?;
        self.notify_gig(&gig, "gig_rejected", &reason);
        Ok(gig)
    }

    pub fn request_resubmission(
        &self,
        gig_id: &GigId,
        actor: Actor,
        reason: String,
    ) -> Result<Gig, MarketplaceError> {
        let gig = self.update_gig(gig_id, |gig, _, now| {
            gig.request_resubmission(reason.clone(), actor, now)
        })?;
        self.notify_gig(&gig, "gig_requires_resubmit", &reason);
        Ok(gig)
    }

    pub fn resubmit_gig(&self, gig_id: &GigId, content: GigContent) -> Result<Gig, MarketplaceError> {
        self.update_gig(gig_id, |gig, _, now| gig.resubmit(content, now))
    }

    pub fn link_post(
        &self,
        gig_id: &GigId,
        url: String,
        posted_at: Option<DateTime<Utc>>,
    ) -> Result<Gig, MarketplaceError> {
        if url.trim().is_empty() {
            return Err(MarketplaceError::Invalid("post url is required".to_string()));
        }
        self.update_gig(gig_id, |gig, policy, now| {
            gig.link_post(policy, url, posted_at.unwrap_or(now), now)
        })
    }

    pub fn mark_missing(&self, gig_id: &GigId) -> Result<Gig, MarketplaceError> {
        let gig = self.update_gig(gig_id, |gig, _, now| gig.mark_missing(now))?;
        warn!(gig_id = %gig_id, "posted gig is no longer visible");
        Ok(gig)
    }

    pub fn submit_insight(
        &self,
        gig_id: &GigId,
        submission: InsightSubmission,
    ) -> Result<Gig, MarketplaceError> {
        self.update_gig(gig_id, |gig, _, now| gig.submit_insight(submission, now))
    }

    pub fn approve_insight(&self, gig_id: &GigId, actor: Actor) -> Result<Gig, MarketplaceError> {
        self.update_gig(gig_id, |gig, _, now| gig.approve_insight(actor, now))
    }

    pub fn request_insight_resubmission(
        &self,
        gig_id: &GigId,
        actor: Actor,
        reason: String,
    ) -> Result<Gig, MarketplaceError> {
        let gig = self.update_gig(gig_id, |gig, _, now| {
            gig.request_insight_resubmission(reason.clone(), actor, now)
        })?;
        self.notify_gig(&gig, "insight_requires_resubmit", &reason);
        Ok(gig)
    }

    // Internals

    fn transition_offer(
        &self,
        offer_id: &OfferId,
        kind: OfferEventKind,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<Offer, MarketplaceError> {
        let campaign_id = self.load_offer(offer_id)?.campaign_id;

        self.locks.with_campaign(&campaign_id, || {
            let mut offer = self.load_offer(offer_id)?;
            let campaign = self.load_campaign(&campaign_id)?;
            let gigs = self.store.gigs_by_offer(offer_id)?;
            let ctx = TransitionContext::for_campaign(&campaign, has_approved_gig(&gigs));

            let next = offer.next_state(kind, &ctx)?;
            if offer.reserves_on(next) || kind == OfferEventKind::RequestedParticipation {
                let siblings = self.store.offers_by_campaign(&campaign_id)?;
                let mut fund = Fund::for_campaign(&campaign, &siblings);
                if offer.reserves_on(next) {
                    fund.reserve(offer.units)?;
                } else if !fund.is_reservable() {
                    return Err(FundError::Exhausted {
                        requested: offer.units,
                        remaining: fund.remaining(),
                    }
                    .into());
                }
            }

            let mut event = OfferEvent::new(kind, actor, self.clock.now());
            if let Some(reason) = reason {
                event = event.with_reason(reason);
            }
            let previous = offer.state;
            offer.apply(event, &ctx)?;
            self.store.update_offer(offer.clone())?;

            info!(
                offer_id = %offer.id,
                campaign_id = %campaign_id,
                from = previous.label(),
                to = offer.state.label(),
                actor = actor.label(),
                "offer transition"
            );
            Ok(offer)
        })
    }

    /// Gig changes share the campaign lock with offer transitions, which read gig state
    /// when deciding whether an offer may still be revoked.
    fn update_gig<F>(&self, gig_id: &GigId, apply: F) -> Result<Gig, MarketplaceError>
    where
        F: FnOnce(&mut Gig, &ReviewPolicy, DateTime<Utc>) -> Result<(), GigTransitionError>,
    {
        let offer_id = self.load_gig(gig_id)?.offer_id;
        let campaign_id = self.load_offer(&offer_id)?.campaign_id;

        self.locks.with_campaign(&campaign_id, || {
            let mut gig = self.load_gig(gig_id)?;
            let offer = self.load_offer(&gig.offer_id)?;
            if offer.state != OfferState::Accepted || offer.is_claimed() {
                return Err(MarketplaceError::OfferNotAccepted);
            }
            let campaign = self.load_campaign(&campaign_id)?;
            let post = campaign
                .post(&gig.post_id)
                .ok_or_else(|| MarketplaceError::UnknownPost(gig.post_id.clone()))?;
            let policy = ReviewPolicy {
                brand_safety: campaign.brand_safety,
                requires_review_before_posting: post.requires_review_before_posting,
            };

            let previous = gig.state;
            apply(&mut gig, &policy, self.clock.now())?;
            self.store.update_gig(gig.clone())?;

            info!(
                gig_id = %gig.id,
                offer_id = %gig.offer_id,
                from = previous.label(),
                to = gig.state.label(),
                "gig updated"
            );
            Ok(gig)
        })
    }

    fn dispatch_payment(&self, mut offer: Offer) -> Result<Offer, MarketplaceError> {
        let Some(payment) = offer.payment.clone() else {
            return Err(OfferTransitionError::NoPendingPayment.into());
        };
        let campaign = self.load_campaign(&offer.campaign_id)?;
        let ctx = TransitionContext::for_campaign(&campaign, true);

        let result = self.payouts.pay(PayoutRequest {
            payment_id: payment.id.clone(),
            offer_id: offer.id.clone(),
            influencer_id: offer.influencer_id.clone(),
            amount: payment.amount,
        });
        let now = self.clock.now();

        match result {
            Ok(receipt) => {
                offer.apply(
                    OfferEvent::new(OfferEventKind::PaymentCompleted, Actor::System, now),
                    &ctx,
                )?;
                if let Some(payment) = offer.payment.as_mut() {
                    payment.reference = Some(receipt.reference);
                }
                self.store.update_offer(offer.clone())?;
                info!(offer_id = %offer.id, amount = %payment.amount, "payout completed");
                self.notify(&offer, "payment_completed", &[("amount", payment.amount.to_string())]);
                Ok(offer)
            }
            Err(err) => {
                offer.apply(
                    OfferEvent::new(OfferEventKind::PaymentFailed, Actor::System, now)
                        .with_reason(err.to_string()),
                    &ctx,
                )?;
                self.store.update_offer(offer.clone())?;
                warn!(offer_id = %offer.id, error = %err, "payout failed");
                Err(err.into())
            }
        }
    }

    fn breakdown(
        &self,
        offer: &Offer,
        influencer: &InfluencerProfile,
        now: DateTime<Utc>,
    ) -> Result<RewardBreakdown, MarketplaceError> {
        Ok(RewardBreakdown::compute(
            offer.effective_reward(),
            influencer.vat_registered,
            &influencer.region,
            now.date_naive(),
            &self.vat_table,
        )?)
    }

    fn notify(&self, offer: &Offer, template: &str, extra: &[(&str, String)]) {
        let mut details = BTreeMap::new();
        details.insert("offer_id".to_string(), offer.id.to_string());
        details.insert("campaign_id".to_string(), offer.campaign_id.to_string());
        for (key, value) in extra {
            details.insert((*key).to_string(), value.clone());
        }

        let notification = Notification {
            template: template.to_string(),
            recipient: offer.influencer_id.clone(),
            details,
        };
        if let Err(err) = self.notifications.publish(notification) {
            warn!(offer_id = %offer.id, template, error = %err, "notification not delivered");
        }
    }

    fn notify_gig(&self, gig: &Gig, template: &str, reason: &str) {
        match self.load_offer(&gig.offer_id) {
            Ok(offer) => self.notify(
                &offer,
                template,
                &[
                    ("gig_id", gig.id.to_string()),
                    ("reason", reason.to_string()),
                ],
            ),
            Err(err) => warn!(gig_id = %gig.id, error = %err, "notification skipped"),
        }
    }

    fn load_campaign(&self, id: &CampaignId) -> Result<Campaign, MarketplaceError> {
        self.store
            .fetch_campaign(id)?
            .ok_or_else(|| not_found("campaign", id.as_str()))
    }

    fn load_offer(&self, id: &OfferId) -> Result<Offer, MarketplaceError> {
        self.store
            .fetch_offer(id)?
            .ok_or_else(|| not_found("offer", id.as_str()))
    }

    fn load_gig(&self, id: &GigId) -> Result<Gig, MarketplaceError> {
        self.store
            .fetch_gig(id)?
            .ok_or_else(|| not_found("gig", id.as_str()))
    }
}

fn has_approved_gig(gigs: &[Gig]) -> bool {
    gigs.iter().any(|gig| gig.state == GigState::Approved)
}

fn not_found(kind: &'static str, id: &str) -> MarketplaceError {
    MarketplaceError::NotFound {
        kind,
        id: id.to_string(),
    }
}
