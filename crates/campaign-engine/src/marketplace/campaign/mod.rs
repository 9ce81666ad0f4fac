//! Brand campaigns: reward model, post slots, targeting, and the launch lifecycle.

mod targeting;

pub use targeting::{Targeting, TargetingMismatch};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Actor, CampaignId, PostId};
use super::money::Money;

/// How influencer participation is priced and accounted against the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardModel {
    /// Product gifting; units are posts and no cash changes hands.
    Assets,
    /// Fixed cash per post.
    Cash,
    /// Priced per follower reached.
    Reach,
    /// Priced per estimated engagement.
    Engagement,
    /// Priced per estimated impression.
    Impressions,
}

impl RewardModel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Assets => "assets",
            Self::Cash => "cash",
            Self::Reach => "reach",
            Self::Engagement => "engagement",
            Self::Impressions => "impressions",
        }
    }

    /// Audience-based models account in followers/engagements/impressions rather than posts.
    pub const fn is_audience_based(self) -> bool {
        matches!(self, Self::Reach | Self::Engagement | Self::Impressions)
    }

    pub const fn pays_cash(self) -> bool {
        !matches!(self, Self::Assets)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "assets" => Some(Self::Assets),
            "cash" => Some(Self::Cash),
            "reach" => Some(Self::Reach),
            "engagement" => Some(Self::Engagement),
            "impressions" => Some(Self::Impressions),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignState {
    Draft,
    Launched,
    Completed,
    Stashed,
}

impl CampaignState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Launched => "launched",
            Self::Completed => "completed",
            Self::Stashed => "stashed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    Standard,
    Story,
    Video,
    Reel,
    TikTok,
}

impl PostType {
    /// Ephemeral formats can only be verified through submitted insights.
    pub const fn requires_insight(self) -> bool {
        matches!(self, Self::Story)
    }
}

/// One piece of content each participating influencer must deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub post_type: PostType,
    pub opened_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub requires_review_before_posting: bool,
    #[serde(default)]
    pub brief: String,
}

impl Post {
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.opened_at <= now && now <= self.deadline
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignEventKind {
    Created,
    Launched,
    Completed,
    Stashed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignEvent {
    pub kind: CampaignEventKind,
    pub actor: Actor,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CampaignTransitionError {
    #[error("campaign is {from} and cannot be {action}")]
    IllegalTransition {
        from: &'static str,
        action: &'static str,
    },
    #[error("campaign has no posts")]
    NoPosts,
    #[error("campaign has no units to reserve")]
    NoUnits,
    #[error("campaign has no budget for a {0} reward model")]
    NoBudget(&'static str),
    #[error("post {0} deadline has already passed")]
    DeadlinePassed(PostId),
    #[error("post {0} closes before it opens")]
    InvalidPostWindow(PostId),
}

/// Payload accepted when a brand drafts a new campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCampaign {
    pub advertiser: String,
    pub name: String,
    pub reward_model: RewardModel,
    pub units: u64,
    pub budget: Money,
    pub posts: Vec<NewPost>,
    #[serde(default)]
    pub targeting: Targeting,
    #[serde(default)]
    pub apply_first: bool,
    #[serde(default)]
    pub brand_match: bool,
    #[serde(default)]
    pub brand_safety: bool,
    #[serde(default)]
    pub require_insights: bool,
    #[serde(default)]
    pub review_period_hours: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub post_type: PostType,
    pub opened_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    #[serde(default)]
    pub requires_review_before_posting: bool,
    #[serde(default)]
    pub brief: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub advertiser: String,
    pub name: String,
    pub state: CampaignState,
    pub reward_model: RewardModel,
    /// Fund size, measured in the reward model's unit.
    pub units: u64,
    pub budget: Money,
    pub posts: Vec<Post>,
    pub targeting: Targeting,
    pub apply_first: bool,
    pub brand_match: bool,
    pub brand_safety: bool,
    pub require_insights: bool,
    pub review_period_hours: Option<u32>,
    pub history: Vec<CampaignEvent>,
}

impl Campaign {
    pub fn draft(id: CampaignId, new: NewCampaign, now: DateTime<Utc>) -> Self {
        let posts = new
            .posts
            .into_iter()
            .enumerate()
            .map(|(index, post)| Post {
                id: PostId(format!("{}-post-{}", id, index + 1)),
                post_type: post.post_type,
                opened_at: post.opened_at,
                deadline: post.deadline,
                requires_review_before_posting: post.requires_review_before_posting,
                brief: post.brief,
            })
            .collect();

        Self {
            id,
            advertiser: new.advertiser,
            name: new.name,
            state: CampaignState::Draft,
            reward_model: new.reward_model,
            units: new.units,
            budget: new.budget,
            posts,
            targeting: new.targeting,
            apply_first: new.apply_first,
            brand_match: new.brand_match,
            brand_safety: new.brand_safety,
            require_insights: new.require_insights,
            review_period_hours: new.review_period_hours,
            history: vec![CampaignEvent {
                kind: CampaignEventKind::Created,
                actor: Actor::Brand,
                created: now,
            }],
        }
    }

    pub fn is_launched(&self) -> bool {
        self.state == CampaignState::Launched
    }

    pub fn post(&self, id: &PostId) -> Option<&Post> {
        self.posts.iter().find(|post| &post.id == id)
    }

    pub fn post_count(&self) -> u64 {
        self.posts.len() as u64
    }

    pub fn review_period(&self, default_hours: u32) -> Duration {
        Duration::hours(i64::from(self.review_period_hours.unwrap_or(default_hours)))
    }

    /// Insights are mandatory when the fund is audience-based or the format is ephemeral.
    pub fn requires_insight_for(&self, post: &Post) -> bool {
        self.require_insights
            || self.reward_model.is_audience_based()
            || post.post_type.requires_insight()
    }

    pub fn launch(
        &mut self,
        now: DateTime<Utc>,
        actor: Actor,
    ) -> Result<(), CampaignTransitionError> {
        self.ensure_state(CampaignState::Draft, "launched")?;

        if self.posts.is_empty() {
            return Err(CampaignTransitionError::NoPosts);
        }
        if self.units == 0 {
            return Err(CampaignTransitionError::NoUnits);
        }
        if self.reward_model.pays_cash() && self.budget.is_zero() {
            return Err(CampaignTransitionError::NoBudget(self.reward_model.label()));
        }
        for post in &self.posts {
            if post.deadline < post.opened_at {
                return Err(CampaignTransitionError::InvalidPostWindow(post.id.clone()));
            }
            if post.deadline < now {
                return Err(CampaignTransitionError::DeadlinePassed(post.id.clone()));
            }
        }

        self.record(CampaignState::Launched, CampaignEventKind::Launched, now, actor);
        Ok(())
    }

    pub fn complete(
        &mut self,
        now: DateTime<Utc>,
        actor: Actor,
    ) -> Result<(), CampaignTransitionError> {
        self.ensure_state(CampaignState::Launched, "completed")?;
        self.record(
            CampaignState::Completed,
            CampaignEventKind::Completed,
            now,
            actor,
        );
        Ok(())
    }

    pub fn stash(&mut self, now: DateTime<Utc>, actor: Actor) -> Result<(), CampaignTransitionError> {
        self.ensure_state(CampaignState::Draft, "stashed")?;
        self.record(CampaignState::Stashed, CampaignEventKind::Stashed, now, actor);
        Ok(())
    }

    fn ensure_state(
        &self,
        expected: CampaignState,
        action: &'static str,
    ) -> Result<(), CampaignTransitionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CampaignTransitionError::IllegalTransition {
                from: self.state.label(),
                action,
            })
        }
    }

    fn record(
        &mut self,
        state: CampaignState,
        kind: CampaignEventKind,
        now: DateTime<Utc>,
        actor: Actor,
    ) {
        self.state = state;
        self.history.push(CampaignEvent {
            kind,
            actor,
            created: now,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::money::Currency;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).single().expect("valid")
    }

    fn new_campaign(reward_model: RewardModel, budget: u64) -> NewCampaign {
        NewCampaign {
            advertiser: "Northwind".to_string(),
            name: "Spring launch".to_string(),
            reward_model,
            units: 10,
            budget: Money::new(budget, Currency::Gbp),
            posts: vec![NewPost {
                post_type: PostType::Standard,
                opened_at: now(),
                deadline: now() + Duration::days(30),
                requires_review_before_posting: true,
                brief: String::new(),
            }],
            targeting: Targeting::default(),
            apply_first: false,
            brand_match: false,
            brand_safety: false,
            require_insights: false,
            review_period_hours: None,
        }
    }

    #[test]
    fn draft_assigns_post_ids_and_logs_creation() {
        let campaign = Campaign::draft(
            CampaignId::from("cmp-1"),
            new_campaign(RewardModel::Cash, 100_000),
            now(),
        );
        assert_eq!(campaign.state, CampaignState::Draft);
        assert_eq!(campaign.posts[0].id, PostId::from("cmp-1-post-1"));
        assert_eq!(campaign.history.len(), 1);
    }

    #[test]
    fn launch_requires_budget_for_cash_models_only() {
        let mut cash = Campaign::draft(
            CampaignId::from("cmp-1"),
            new_campaign(RewardModel::Cash, 0),
            now(),
        );
        assert_eq!(
            cash.launch(now(), Actor::Admin),
            Err(CampaignTransitionError::NoBudget("cash"))
        );

        let mut gifting = Campaign::draft(
            CampaignId::from("cmp-2"),
            new_campaign(RewardModel::Assets, 0),
            now(),
        );
        assert_eq!(gifting.launch(now(), Actor::Admin), Ok(()));
        assert!(gifting.is_launched());
    }

    #[test]
    fn launch_rejects_expired_posts() {
        let mut campaign = Campaign::draft(
            CampaignId::from("cmp-1"),
            new_campaign(RewardModel::Cash, 100_000),
            now(),
        );
        let later = now() + Duration::days(31);
        assert_eq!(
            campaign.launch(later, Actor::Admin),
            Err(CampaignTransitionError::DeadlinePassed(PostId::from(
                "cmp-1-post-1"
            )))
        );
    }

    #[test]
    fn lifecycle_guards_each_transition() {
        let mut campaign = Campaign::draft(
            CampaignId::from("cmp-1"),
            new_campaign(RewardModel::Reach, 100_000),
            now(),
        );
        assert_eq!(
            campaign.complete(now(), Actor::Admin),
            Err(CampaignTransitionError::IllegalTransition {
                from: "draft",
                action: "completed"
            })
        );
        campaign.launch(now(), Actor::Admin).expect("launches");
        assert!(campaign.stash(now(), Actor::Admin).is_err());
        campaign.complete(now(), Actor::Admin).expect("completes");
        assert_eq!(campaign.state, CampaignState::Completed);
        assert_eq!(campaign.history.len(), 3);
    }

    #[test]
    fn audience_models_always_require_insights() {
        let campaign = Campaign::draft(
            CampaignId::from("cmp-1"),
            new_campaign(RewardModel::Impressions, 100_000),
            now(),
        );
        assert!(campaign.requires_insight_for(&campaign.posts[0]));
        assert_eq!(campaign.review_period(48), Duration::hours(48));
    }
}
