//! Submitted content per offer and post, with its review sub-state-machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Actor, GigId, OfferId, PostId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GigState {
    Submitted,
    Reviewed,
    Approved,
    Rejected,
    RequiresResubmit,
}

impl GigState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Reviewed => "reviewed",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::RequiresResubmit => "requires_resubmit",
        }
    }

    /// Rejected gigs free the post slot for a fresh submission.
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightState {
    Submitted,
    Approved,
    RequiresResubmit,
}

/// Audience statistics reported by the influencer for a published gig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub reach: u64,
    pub impressions: u64,
    pub engagements: u64,
    pub state: InsightState,
    pub submitted_at: DateTime<Utc>,
}

/// Content and statistics an influencer submits for review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GigContent {
    pub caption: String,
    pub media_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightSubmission {
    pub reach: u64,
    pub impressions: u64,
    pub engagements: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GigEventKind {
    Submitted,
    Reviewed,
    Approved,
    Rejected,
    ResubmissionRequested,
    Resubmitted,
    Posted,
    MarkedMissing,
    InsightSubmitted,
    InsightApproved,
    InsightResubmissionRequested,
}

impl GigEventKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Submitted => "submit",
            Self::Reviewed => "review",
            Self::Approved => "approve",
            Self::Rejected => "reject",
            Self::ResubmissionRequested => "request_resubmission",
            Self::Resubmitted => "resubmit",
            Self::Posted => "link_post",
            Self::MarkedMissing => "mark_missing",
            Self::InsightSubmitted => "submit_insight",
            Self::InsightApproved => "approve_insight",
            Self::InsightResubmissionRequested => "request_insight_resubmission",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GigEvent {
    pub kind: GigEventKind,
    pub actor: Actor,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Campaign rules the gig review flow depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewPolicy {
    pub brand_safety: bool,
    pub requires_review_before_posting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GigTransitionError {
    #[error("gig is {from} and cannot {event}")]
    IllegalTransition {
        from: &'static str,
        event: &'static str,
    },
    #[error("campaign has no brand safety review")]
    BrandSafetyDisabled,
    #[error("gig must be approved before it is posted")]
    NotApprovedForPosting,
    #[error("gig has already been posted")]
    AlreadyPosted,
    #[error("post time {posted_at} must fall between {earliest} and {now}")]
    PostedAtOutOfRange {
        posted_at: DateTime<Utc>,
        earliest: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    #[error("gig has not been posted")]
    NotPosted,
    #[error("no insight has been submitted")]
    NoInsight,
    #[error("insight is {0:?} and cannot change")]
    InsightLocked(InsightState),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gig {
    pub id: GigId,
    pub offer_id: OfferId,
    pub post_id: PostId,
    pub state: GigState,
    pub content: GigContent,
    pub reject_reason: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub post_url: Option<String>,
    pub is_missing: bool,
    pub insight: Option<Insight>,
    pub history: Vec<GigEvent>,
}

impl Gig {
    pub fn submit(
        id: GigId,
        offer_id: OfferId,
        post_id: PostId,
        content: GigContent,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            offer_id,
            post_id,
            state: GigState::Submitted,
            content,
            reject_reason: None,
            posted_at: None,
            post_url: None,
            is_missing: false,
            insight: None,
            history: vec![GigEvent {
                kind: GigEventKind::Submitted,
                actor: Actor::Influencer,
                created: now,
                reason: None,
            }],
        }
    }

    pub fn is_posted(&self) -> bool {
        self.posted_at.is_some()
    }

    /// Approved, published, and still visible on the platform.
    pub fn is_live(&self) -> bool {
        self.state == GigState::Approved && self.is_posted() && !self.is_missing
    }

    pub fn has_valid_insight(&self) -> bool {
        matches!(
            self.insight.as_ref().map(|insight| insight.state),
            Some(InsightState::Approved)
        )
    }

    pub fn review(
        &mut self,
        policy: &ReviewPolicy,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<(), GigTransitionError> {
        if !policy.brand_safety {
            return Err(GigTransitionError::BrandSafetyDisabled);
        }
        self.expect_state(&[GigState::Submitted], GigEventKind::Reviewed)?;
        self.state = GigState::Reviewed;
        self.log(GigEventKind::Reviewed, actor, now, None);
        Ok(())
    }

    pub fn approve(
        &mut self,
        policy: &ReviewPolicy,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<(), GigTransitionError> {
        let allowed: &[GigState] = if policy.brand_safety {
            &[GigState::Reviewed]
        } else {
            &[GigState::Submitted, GigState::Reviewed]
        };
        self.expect_state(allowed, GigEventKind::Approved)?;
        self.state = GigState::Approved;
        self.reject_reason = None;
        self.log(GigEventKind::Approved, actor, now, None);
        Ok(())
    }

    pub fn request_resubmission(
        &mut self,
        reason: String,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<(), GigTransitionError> {
        self.expect_state(
            &[GigState::Submitted, GigState::Reviewed],
            GigEventKind::ResubmissionRequested,
        )?;
        self.state = GigState::RequiresResubmit;
        self.reject_reason = Some(reason.clone());
        self.log(GigEventKind::ResubmissionRequested, actor, now, Some(reason));
        Ok(())
    }

    pub fn resubmit(
        &mut self,
        content: GigContent,
        now: DateTime<Utc>,
    ) -> Result<(), GigTransitionError> {
        self.expect_state(&[GigState::RequiresResubmit], GigEventKind::Resubmitted)?;
        self.state = GigState::Submitted;
        self.content = content;
        self.log(GigEventKind::Resubmitted, Actor::Influencer, now, None);
        Ok(())
    }

    pub fn reject(
        &mut self,
        reason: String,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<(), GigTransitionError> {
        self.expect_state(
            &[GigState::Submitted, GigState::Reviewed, GigState::Approved],
            GigEventKind::Rejected,
        )?;
        if self.is_posted() {
            return Err(GigTransitionError::AlreadyPosted);
        }
        self.state = GigState::Rejected;
        self.reject_reason = Some(reason.clone());
        self.log(GigEventKind::Rejected, actor, now, Some(reason));
        Ok(())
    }

    pub fn link_post(
        &mut self,
        policy: &ReviewPolicy,
        url: String,
        posted_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), GigTransitionError> {
        if self.is_posted() {
            return Err(GigTransitionError::AlreadyPosted);
        }
        let postable = match self.state {
            GigState::Approved => true,
            GigState::Submitted | GigState::Reviewed => !policy.requires_review_before_posting,
            _ => false,
        };
        if !postable {
            return Err(GigTransitionError::NotApprovedForPosting);
        }
        // The review window starts at the post time, so it cannot predate the latest decision.
        let earliest = self.history.last().map_or(now, |event| event.created);
        if posted_at < earliest || posted_at > now {
            return Err(GigTransitionError::PostedAtOutOfRange {
                posted_at,
                earliest,
                now,
            });
        }
        self.posted_at = Some(posted_at);
        self.post_url = Some(url);
        self.log(GigEventKind::Posted, Actor::Influencer, now, None);
        Ok(())
    }

    pub fn mark_missing(&mut self, now: DateTime<Utc>) -> Result<(), GigTransitionError> {
        if !self.is_posted() {
            return Err(GigTransitionError::NotPosted);
        }
        self.is_missing = true;
        self.log(GigEventKind::MarkedMissing, Actor::System, now, None);
        Ok(())
    }

    pub fn submit_insight(
        &mut self,
        submission: InsightSubmission,
        now: DateTime<Utc>,
    ) -> Result<(), GigTransitionError> {
        if !self.is_posted() {
            return Err(GigTransitionError::NotPosted);
        }
        if let Some(existing) = &self.insight {
            if existing.state == InsightState::Approved {
                return Err(GigTransitionError::InsightLocked(existing.state));
            }
        }
        self.insight = Some(Insight {
            reach: submission.reach,
            impressions: submission.impressions,
            engagements: submission.engagements,
            state: InsightState::Submitted,
            submitted_at: now,
        });
        self.log(GigEventKind::InsightSubmitted, Actor::Influencer, now, None);
        Ok(())
    }

    pub fn approve_insight(
        &mut self,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<(), GigTransitionError> {
        self.set_insight_state(InsightState::Approved)?;
        self.log(GigEventKind::InsightApproved, actor, now, None);
        Ok(())
    }

    pub fn request_insight_resubmission(
        &mut self,
        reason: String,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<(), GigTransitionError> {
        self.set_insight_state(InsightState::RequiresResubmit)?;
        self.log(
            GigEventKind::InsightResubmissionRequested,
            actor,
            now,
            Some(reason),
        );
        Ok(())
    }

    fn set_insight_state(&mut self, state: InsightState) -> Result<(), GigTransitionError> {
        let insight = self.insight.as_mut().ok_or(GigTransitionError::NoInsight)?;
        if insight.state != InsightState::Submitted {
            return Err(GigTransitionError::InsightLocked(insight.state));
        }
        insight.state = state;
        Ok(())
    }

    fn expect_state(
        &self,
        allowed: &[GigState],
        event: GigEventKind,
    ) -> Result<(), GigTransitionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(GigTransitionError::IllegalTransition {
                from: self.state.label(),
                event: event.label(),
            })
        }
    }

    fn log(&mut self, kind: GigEventKind, actor: Actor, now: DateTime<Utc>, reason: Option<String>) {
        self.history.push(GigEvent {
            kind,
            actor,
            created: now,
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 8, 30, 0)
            .single()
            .expect("valid")
    }

    fn gig() -> Gig {
        Gig::submit(
            GigId::from("gig-1"),
            OfferId::from("off-1"),
            PostId::from("cmp-1-post-1"),
            GigContent {
                caption: "Morning run with #northwind".to_string(),
                media_url: "https://cdn.example.com/gig-1.jpg".to_string(),
            },
            now(),
        )
    }

    fn policy(brand_safety: bool) -> ReviewPolicy {
        ReviewPolicy {
            brand_safety,
            requires_review_before_posting: true,
        }
    }

    #[test]
    fn brand_safety_campaigns_review_before_approval() {
        let mut gig = gig();
        let policy = policy(true);
        assert_eq!(
            gig.approve(&policy, Actor::Brand, now()),
            Err(GigTransitionError::IllegalTransition {
                from: "submitted",
                event: "approve"
            })
        );
        gig.review(&policy, Actor::Admin, now()).expect("reviewed");
        gig.approve(&policy, Actor::Brand, now()).expect("approved");
        assert_eq!(gig.state, GigState::Approved);
    }

    #[test]
    fn review_step_is_optional_without_brand_safety() {
        let mut gig = gig();
        let policy = policy(false);
        assert_eq!(
            gig.review(&policy, Actor::Admin, now()),
            Err(GigTransitionError::BrandSafetyDisabled)
        );
        gig.approve(&policy, Actor::Brand, now()).expect("approved");
    }

    #[test]
    fn resubmission_round_trip_returns_to_submitted() {
        let mut gig = gig();
        gig.request_resubmission("Logo not visible".to_string(), Actor::Brand, now())
            .expect("resubmission requested");
        assert_eq!(gig.reject_reason.as_deref(), Some("Logo not visible"));

        let content = GigContent {
            caption: "Take two".to_string(),
            media_url: "https://cdn.example.com/gig-1b.jpg".to_string(),
        };
        gig.resubmit(content.clone(), now()).expect("resubmitted");
        assert_eq!(gig.state, GigState::Submitted);
        assert_eq!(gig.content, content);
    }

    #[test]
    fn posting_requires_approval_when_review_is_mandatory() {
        let mut gig = gig();
        let policy = policy(false);
        let url = "https://instagram.com/p/abc".to_string();
        assert_eq!(
            gig.link_post(&policy, url.clone(), now(), now()),
            Err(GigTransitionError::NotApprovedForPosting)
        );

        let relaxed = ReviewPolicy {
            brand_safety: false,
            requires_review_before_posting: false,
        };
        gig.link_post(&relaxed, url, now(), now()).expect("posted");
        assert!(!gig.is_live());
        gig.approve(&relaxed, Actor::Brand, now()).expect("approved");
        assert!(gig.is_live());
    }

    #[test]
    fn post_time_must_follow_approval_and_not_lie_in_the_future() {
        let mut gig = gig();
        let policy = policy(false);
        let approved_at = now() + Duration::hours(2);
        gig.approve(&policy, Actor::Brand, approved_at).expect("approved");

        let linked_at = approved_at + Duration::hours(1);
        let url = "https://instagram.com/p/late".to_string();
        for posted_at in [approved_at - Duration::days(365), linked_at + Duration::minutes(5)] {
            assert_eq!(
                gig.link_post(&policy, url.clone(), posted_at, linked_at),
                Err(GigTransitionError::PostedAtOutOfRange {
                    posted_at,
                    earliest: approved_at,
                    now: linked_at,
                })
            );
        }
        assert!(gig.posted_at.is_none());

        gig.link_post(&policy, url, approved_at, linked_at)
            .expect("posting at the approval instant is allowed");
        assert_eq!(gig.posted_at, Some(approved_at));
    }

    #[test]
    fn posted_gigs_cannot_be_rejected_and_can_go_missing() {
        let mut gig = gig();
        let policy = policy(false);
        gig.approve(&policy, Actor::Brand, now()).expect("approved");
        gig.link_post(&policy, "https://instagram.com/p/xyz".to_string(), now(), now())
            .expect("posted");
        assert_eq!(
            gig.reject("Off brief".to_string(), Actor::Brand, now()),
            Err(GigTransitionError::AlreadyPosted)
        );

        gig.mark_missing(now() + Duration::days(1)).expect("flagged");
        assert!(!gig.is_live());
    }

    #[test]
    fn insights_are_reviewed_once() {
        let mut gig = gig();
        let stats = InsightSubmission {
            reach: 4_000,
            impressions: 5_200,
            engagements: 310,
        };
        assert_eq!(
            gig.submit_insight(stats, now()),
            Err(GigTransitionError::NotPosted)
        );

        let policy = policy(false);
        gig.approve(&policy, Actor::Brand, now()).expect("approved");
        gig.link_post(&policy, "https://instagram.com/s/1".to_string(), now(), now())
            .expect("posted");
        gig.submit_insight(stats, now()).expect("insight submitted");
        gig.request_insight_resubmission("Blurry screenshot".to_string(), Actor::Admin, now())
            .expect("resubmission requested");
        gig.submit_insight(stats, now()).expect("insight resubmitted");
        gig.approve_insight(Actor::Admin, now()).expect("insight approved");
        assert!(gig.has_valid_insight());
        assert_eq!(
            gig.submit_insight(stats, now()),
            Err(GigTransitionError::InsightLocked(InsightState::Approved))
        );
    }
}
