//! Influencer offers against a campaign and their event-logged state machine.

mod claim;

pub use claim::{ClaimBlocker, Claimability};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::campaign::Campaign;
use super::domain::{Actor, CampaignId, InfluencerId, OfferId, PaymentId};
use super::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferState {
    Pending,
    Invited,
    Requested,
    Candidate,
    ApprovedByBrand,
    Accepted,
    Rejected,
    RejectedByBrand,
    Revoked,
}

impl OfferState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Invited => "invited",
            Self::Requested => "requested",
            Self::Candidate => "candidate",
            Self::ApprovedByBrand => "approved_by_brand",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::RejectedByBrand => "rejected_by_brand",
            Self::Revoked => "revoked",
        }
    }

    /// States whose units count against the campaign fund.
    pub const fn is_reserved(self) -> bool {
        matches!(self, Self::Accepted | Self::ApprovedByBrand)
    }

    /// Applications awaiting a brand decision.
    pub const fn is_submitted(self) -> bool {
        matches!(self, Self::Requested | Self::Candidate)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::RejectedByBrand | Self::Revoked)
    }

    /// Not yet holding a reservation and still open, so completion of the campaign closes it.
    pub const fn is_outstanding(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Invited | Self::Requested | Self::Candidate
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferEventKind {
    Created,
    InviteSent,
    Reserved,
    RequestedParticipation,
    SetAsCandidate,
    ApprovedByBrand,
    Accepted,
    Rejected,
    RejectedByBrand,
    Revoked,
    Renewed,
    Claimed,
    PaymentCompleted,
    PaymentFailed,
    PaymentRetried,
}

impl OfferEventKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "create",
            Self::InviteSent => "send_invite",
            Self::Reserved => "reserve",
            Self::RequestedParticipation => "request_participation",
            Self::SetAsCandidate => "set_as_candidate",
            Self::ApprovedByBrand => "approve_by_brand",
            Self::Accepted => "accept",
            Self::Rejected => "reject",
            Self::RejectedByBrand => "reject_candidate",
            Self::Revoked => "revoke",
            Self::Renewed => "renew",
            Self::Claimed => "claim",
            Self::PaymentCompleted => "complete_payment",
            Self::PaymentFailed => "fail_payment",
            Self::PaymentRetried => "retry_payment",
        }
    }
}

/// Entry in an offer's append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferEvent {
    pub kind: OfferEventKind,
    pub actor: Actor,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl OfferEvent {
    pub fn new(kind: OfferEventKind, actor: Actor, created: DateTime<Utc>) -> Self {
        Self {
            kind,
            actor,
            created,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pending,
    Paid,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub amount: Money,
    pub state: PaymentState,
    pub requested_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub reference: Option<String>,
}

/// Campaign facts an offer transition is guarded by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionContext {
    pub campaign_launched: bool,
    pub apply_first: bool,
    pub brand_match: bool,
    pub has_approved_gig: bool,
}

impl TransitionContext {
    pub fn for_campaign(campaign: &Campaign, has_approved_gig: bool) -> Self {
        Self {
            campaign_launched: campaign.is_launched(),
            apply_first: campaign.apply_first,
            brand_match: campaign.brand_match,
            has_approved_gig,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OfferTransitionError {
    #[error("offer is {from} and cannot {event}")]
    IllegalTransition {
        from: &'static str,
        event: &'static str,
    },
    #[error("campaign is not launched")]
    CampaignNotLaunched,
    #[error("campaign requires influencers to apply first")]
    RequiresApplication,
    #[error("campaign does not take applications")]
    InviteOnly,
    #[error("campaign does not use brand matching")]
    BrandMatchDisabled,
    #[error("offer has approved content and can no longer be revoked")]
    GigAlreadyApproved,
    #[error("offer reward has already been claimed")]
    AlreadyClaimed,
    #[error("offer has no pending payment")]
    NoPendingPayment,
    #[error("offer has no failed payment to retry")]
    NoFailedPayment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub campaign_id: CampaignId,
    pub influencer_id: InfluencerId,
    pub state: OfferState,
    /// Units this offer holds against the fund while reserved.
    pub units: u64,
    pub reward: Money,
    pub custom_reward: Option<Money>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub payment: Option<Payment>,
    pub history: Vec<OfferEvent>,
}

impl Offer {
    pub fn create(
        id: OfferId,
        campaign_id: CampaignId,
        influencer_id: InfluencerId,
        units: u64,
        reward: Money,
        event: OfferEvent,
    ) -> Self {
        Self {
            id,
            campaign_id,
            influencer_id,
            state: OfferState::Pending,
            units,
            reward,
            custom_reward: None,
            accepted_at: None,
            claimed_at: None,
            payment: None,
            history: vec![event],
        }
    }

    /// Reward actually owed, honoring a manually negotiated override.
    pub fn effective_reward(&self) -> Money {
        self.custom_reward.unwrap_or(self.reward)
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed_at.is_some()
    }

    pub fn is_paid(&self) -> bool {
        matches!(
            self.payment.as_ref().map(|payment| payment.state),
            Some(PaymentState::Paid)
        )
    }

    /// Resolve the state an event would move the offer into without mutating it.
    pub fn next_state(
        &self,
        kind: OfferEventKind,
        ctx: &TransitionContext,
    ) -> Result<OfferState, OfferTransitionError> {
        use OfferState::*;

        let illegal = || OfferTransitionError::IllegalTransition {
            from: self.state.label(),
            event: kind.label(),
        };
        let launched = || {
            if ctx.campaign_launched {
                Ok(())
            } else {
                Err(OfferTransitionError::CampaignNotLaunched)
            }
        };

        match kind {
            OfferEventKind::Created => Err(illegal()),
            OfferEventKind::InviteSent => match self.state {
                Pending => launched().map(|_| Invited),
                _ => Err(illegal()),
            },
            OfferEventKind::Reserved => match self.state {
                Pending | Invited => {
                    launched()?;
                    if ctx.apply_first {
                        return Err(OfferTransitionError::RequiresApplication);
                    }
                    Ok(Accepted)
                }
                _ => Err(illegal()),
            },
            OfferEventKind::RequestedParticipation => match self.state {
                Pending | Invited => {
                    launched()?;
                    if !ctx.apply_first {
                        return Err(OfferTransitionError::InviteOnly);
                    }
                    Ok(Requested)
                }
                _ => Err(illegal()),
            },
            OfferEventKind::SetAsCandidate => match self.state {
                Requested => {
                    launched()?;
                    if !ctx.brand_match {
                        return Err(OfferTransitionError::BrandMatchDisabled);
                    }
                    Ok(Candidate)
                }
                _ => Err(illegal()),
            },
            OfferEventKind::ApprovedByBrand => match (self.state, ctx.brand_match) {
                (Candidate, true) | (Requested, false) => launched().map(|_| ApprovedByBrand),
                _ => Err(illegal()),
            },
            OfferEventKind::Accepted => match self.state {
                ApprovedByBrand => launched().map(|_| Accepted),
                _ => Err(illegal()),
            },
            OfferEventKind::Rejected => match self.state {
                Pending | Invited | ApprovedByBrand => Ok(Rejected),
                _ => Err(illegal()),
            },
            OfferEventKind::RejectedByBrand => match self.state {
                Requested | Candidate => Ok(RejectedByBrand),
                _ => Err(illegal()),
            },
            OfferEventKind::Revoked => {
                if self.state.is_terminal() {
                    return Err(illegal());
                }
                if self.is_claimed() {
                    return Err(OfferTransitionError::AlreadyClaimed);
                }
                if ctx.has_approved_gig {
                    return Err(OfferTransitionError::GigAlreadyApproved);
                }
                Ok(Revoked)
            }
            OfferEventKind::Renewed => match self.state {
                Rejected | Revoked => launched().map(|_| Invited),
                _ => Err(illegal()),
            },
            OfferEventKind::Claimed => match self.state {
                Accepted if self.is_claimed() => Err(OfferTransitionError::AlreadyClaimed),
                Accepted => Ok(Accepted),
                _ => Err(illegal()),
            },
            OfferEventKind::PaymentCompleted | OfferEventKind::PaymentFailed => {
                match self.payment.as_ref().map(|payment| payment.state) {
                    Some(PaymentState::Pending) => Ok(self.state),
                    _ => Err(OfferTransitionError::NoPendingPayment),
                }
            }
            OfferEventKind::PaymentRetried => {
                match self.payment.as_ref().map(|payment| payment.state) {
                    Some(PaymentState::Failed) => Ok(self.state),
                    _ => Err(OfferTransitionError::NoFailedPayment),
                }
            }
        }
    }

    /// Validate and record an event, moving the offer into its next state.
    pub fn apply(
        &mut self,
        event: OfferEvent,
        ctx: &TransitionContext,
    ) -> Result<OfferState, OfferTransitionError> {
        let next = self.next_state(event.kind, ctx)?;

        match event.kind {
            OfferEventKind::Reserved | OfferEventKind::Accepted => {
                self.accepted_at = Some(event.created);
            }
            OfferEventKind::Claimed => {
                self.claimed_at = Some(event.created);
            }
            OfferEventKind::PaymentCompleted | OfferEventKind::PaymentFailed => {
                if let Some(payment) = self.payment.as_mut() {
                    payment.state = if event.kind == OfferEventKind::PaymentCompleted {
                        PaymentState::Paid
                    } else {
                        PaymentState::Failed
                    };
                    payment.completed_at = Some(event.created);
                }
            }
            OfferEventKind::PaymentRetried => {
                if let Some(payment) = self.payment.as_mut() {
                    payment.state = PaymentState::Pending;
                    payment.requested_at = event.created;
                    payment.completed_at = None;
                }
            }
            OfferEventKind::Revoked | OfferEventKind::Renewed | OfferEventKind::Rejected => {
                self.accepted_at = None;
            }
            _ => {}
        }

        self.state = next;
        self.history.push(event);
        Ok(next)
    }

    /// Whether moving to `next` takes units from the fund.
    pub fn reserves_on(&self, next: OfferState) -> bool {
        !self.state.is_reserved() && next.is_reserved()
    }
}
