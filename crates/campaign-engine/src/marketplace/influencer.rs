use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::InfluencerId;

/// Share of followers assumed to see a post when no audience insight is on file.
pub const DEFAULT_IMPRESSION_RATIO: f64 = 0.25;

/// Posts considered when deriving an engagement rate.
pub const ENGAGEMENT_SAMPLE_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Female,
    Male,
    Other,
}

/// Onboarding status of an influencer account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfluencerState {
    New,
    Reviewed,
    Verified,
    Disabled,
    Cooldown,
}

impl InfluencerState {
    pub const fn can_participate(self) -> bool {
        matches!(self, Self::Reviewed | Self::Verified)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Reviewed => "reviewed",
            Self::Verified => "verified",
            Self::Disabled => "disabled",
            Self::Cooldown => "cooldown",
        }
    }
}

/// Interaction counts for one of the influencer's own recent posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentPostMetrics {
    pub likes: u64,
    pub comments: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluencerProfile {
    pub id: InfluencerId,
    pub username: String,
    /// ISO 3166 alpha-2 region code.
    pub region: String,
    pub gender: Option<Gender>,
    pub birthday: Option<NaiveDate>,
    pub followers: u64,
    #[serde(default)]
    pub engagement_rate: f64,
    pub estimated_impressions: Option<u64>,
    pub vat_registered: bool,
    #[serde(default)]
    pub interests: Vec<String>,
    pub state: InfluencerState,
}

impl InfluencerProfile {
    pub fn estimated_engagements(&self) -> u64 {
        estimate(self.followers, self.engagement_rate)
    }

    pub fn estimated_impressions(&self) -> u64 {
        self.estimated_impressions
            .unwrap_or_else(|| estimate(self.followers, DEFAULT_IMPRESSION_RATIO))
    }

    /// Replace the engagement rate with one measured from recent posts, when any are given.
    pub fn with_recent_posts(mut self, recent_posts: &[RecentPostMetrics]) -> Self {
        if !recent_posts.is_empty() {
            self.engagement_rate = engagement_rate(recent_posts, self.followers);
        }
        self
    }

    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        self.birthday.and_then(|birthday| today.years_since(birthday))
    }
}

/// Mean `(likes + comments) / followers` over the most recent posts.
pub fn engagement_rate(recent_posts: &[RecentPostMetrics], followers: u64) -> f64 {
    if followers == 0 {
        return 0.0;
    }

    let sample: Vec<_> = recent_posts.iter().take(ENGAGEMENT_SAMPLE_SIZE).collect();
    if sample.is_empty() {
        return 0.0;
    }

    let total: f64 = sample
        .iter()
        .map(|post| post.likes.saturating_add(post.comments) as f64 / followers as f64)
        .sum();
    total / sample.len() as f64
}

fn estimate(followers: u64, ratio: f64) -> u64 {
    if !ratio.is_finite() || ratio <= 0.0 {
        return 0;
    }
    (followers as f64 * ratio).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(followers: u64, engagement_rate: f64) -> InfluencerProfile {
        InfluencerProfile {
            id: InfluencerId::from("inf-1"),
            username: "daisy".to_string(),
            region: "GB".to_string(),
            gender: Some(Gender::Female),
            birthday: NaiveDate::from_ymd_opt(1995, 6, 15),
            followers,
            engagement_rate,
            estimated_impressions: None,
            vat_registered: false,
            interests: Vec::new(),
            state: InfluencerState::Verified,
        }
    }

    #[test]
    fn engagement_rate_averages_recent_posts_only() {
        let mut posts = vec![
            RecentPostMetrics {
                likes: 90,
                comments: 10,
            };
            ENGAGEMENT_SAMPLE_SIZE
        ];
        posts.push(RecentPostMetrics {
            likes: 10_000,
            comments: 0,
        });

        let rate = engagement_rate(&posts, 1_000);
        assert!((rate - 0.1).abs() < 1e-9);
    }

    #[test]
    fn engagement_rate_is_zero_without_data() {
        assert_eq!(engagement_rate(&[], 1_000), 0.0);
        assert_eq!(
            engagement_rate(
                &[RecentPostMetrics {
                    likes: 1,
                    comments: 1
                }],
                0
            ),
            0.0
        );
    }

    #[test]
    fn recent_posts_replace_the_declared_rate() {
        let posts = [
            RecentPostMetrics {
                likes: 400,
                comments: 100,
            },
            RecentPostMetrics {
                likes: u64::MAX,
                comments: 1,
            },
        ];
        let measured = profile(10_000, 0.5).with_recent_posts(&posts[..1]);
        assert!((measured.engagement_rate - 0.05).abs() < 1e-9);
        assert_eq!(measured.estimated_engagements(), 500);

        let saturated = profile(10_000, 0.5).with_recent_posts(&posts[1..]);
        assert!(saturated.engagement_rate.is_finite());

        let untouched = profile(10_000, 0.035).with_recent_posts(&[]);
        assert!((untouched.engagement_rate - 0.035).abs() < 1e-9);
    }

    #[test]
    fn estimates_fall_back_to_follower_ratios() {
        let influencer = profile(10_000, 0.035);
        assert_eq!(influencer.estimated_engagements(), 350);
        assert_eq!(influencer.estimated_impressions(), 2_500);

        let mut with_insight = profile(10_000, 0.035);
        with_insight.estimated_impressions = Some(4_200);
        assert_eq!(with_insight.estimated_impressions(), 4_200);
    }

    #[test]
    fn age_counts_completed_years() {
        let influencer = profile(1, 0.0);
        let today = NaiveDate::from_ymd_opt(2025, 6, 14).expect("valid");
        assert_eq!(influencer.age_on(today), Some(29));
    }
}
