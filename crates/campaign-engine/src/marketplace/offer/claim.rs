use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Offer, OfferState};
use crate::marketplace::campaign::Campaign;
use crate::marketplace::domain::{GigId, PostId};
use crate::marketplace::gig::Gig;

/// Why an offer cannot be claimed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ClaimBlocker {
    NotAccepted { state: &'static str },
    AlreadyClaimed,
    MissingGig { post_id: PostId },
    GigNotLive { gig_id: GigId },
    InReviewPeriod { until: DateTime<Utc> },
    InsightRequired { gig_id: GigId },
}

impl ClaimBlocker {
    pub fn summary(&self) -> String {
        match self {
            ClaimBlocker::NotAccepted { state } => format!("offer is {state}"),
            ClaimBlocker::AlreadyClaimed => "reward already claimed".to_string(),
            ClaimBlocker::MissingGig { post_id } => format!("no gig submitted for {post_id}"),
            ClaimBlocker::GigNotLive { gig_id } => format!("gig {gig_id} is not live"),
            ClaimBlocker::InReviewPeriod { until } => {
                format!("review period runs until {}", until.to_rfc3339())
            }
            ClaimBlocker::InsightRequired { gig_id } => {
                format!("gig {gig_id} needs approved insights")
            }
        }
    }
}

/// Derived claim status for an offer at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claimability {
    pub claimable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimable_at: Option<DateTime<Utc>>,
    pub blockers: Vec<ClaimBlocker>,
}

impl Claimability {
    /// An offer becomes claimable once every post has a live gig, the review period after the
    /// latest posting has elapsed, and insights are valid wherever they are required.
    pub fn evaluate(
        offer: &Offer,
        campaign: &Campaign,
        gigs: &[Gig],
        default_review_hours: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let mut blockers = Vec::new();

        if offer.state != OfferState::Accepted {
            blockers.push(ClaimBlocker::NotAccepted {
                state: offer.state.label(),
            });
        }
        if offer.is_claimed() {
            blockers.push(ClaimBlocker::AlreadyClaimed);
        }

        let review_period = campaign.review_period(default_review_hours);
        let mut latest_post: Option<DateTime<Utc>> = None;
        let mut all_posted = true;

        for post in &campaign.posts {
            let gig = gigs
                .iter()
                .find(|gig| gig.post_id == post.id && gig.state.is_active());

            let Some(gig) = gig else {
                all_posted = false;
                blockers.push(ClaimBlocker::MissingGig {
                    post_id: post.id.clone(),
                });
                continue;
            };

            if !gig.is_live() {
                all_posted = false;
                blockers.push(ClaimBlocker::GigNotLive {
                    gig_id: gig.id.clone(),
                });
            }

            if let Some(posted_at) = gig.posted_at {
                latest_post = Some(latest_post.map_or(posted_at, |latest| latest.max(posted_at)));
            }

            if campaign.requires_insight_for(post) && !gig.has_valid_insight() {
                blockers.push(ClaimBlocker::InsightRequired {
                    gig_id: gig.id.clone(),
                });
            }
        }

        // An unrepresentable end of the review window never opens.
        let claimable_at = if all_posted {
            latest_post.map(|posted_at| {
                posted_at
                    .checked_add_signed(review_period)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            })
        } else {
            None
        };

        if let Some(until) = claimable_at {
            if now < until {
                blockers.push(ClaimBlocker::InReviewPeriod { until });
            }
        }

        Self {
            claimable: blockers.is_empty() && claimable_at.is_some(),
            claimable_at,
            blockers,
        }
    }
}
