use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::super::influencer::{Gender, InfluencerProfile};

/// Eligibility criteria a campaign applies to influencers. Empty lists mean "any".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Targeting {
    pub regions: Vec<String>,
    pub gender: Option<Gender>,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub min_followers: Option<u64>,
    pub max_followers: Option<u64>,
    pub interests: Vec<String>,
}

/// Reasons an influencer falls outside a campaign's targeting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetingMismatch {
    #[error("influencer account is {0} and cannot participate")]
    IneligibleState(&'static str),
    #[error("region {0} is not targeted")]
    Region(String),
    #[error("gender is not targeted")]
    Gender,
    #[error("age {age:?} outside targeted range")]
    Age { age: Option<u32> },
    #[error("{found} followers below targeted minimum {min}")]
    TooFewFollowers { min: u64, found: u64 },
    #[error("{found} followers above targeted maximum {max}")]
    TooManyFollowers { max: u64, found: u64 },
    #[error("no targeted interest matched")]
    Interests,
}

impl Targeting {
    pub fn check(
        &self,
        influencer: &InfluencerProfile,
        today: NaiveDate,
    ) -> Result<(), TargetingMismatch> {
        if !influencer.state.can_participate() {
            return Err(TargetingMismatch::IneligibleState(influencer.state.label()));
        }

        if !self.regions.is_empty()
            && !self
                .regions
                .iter()
                .any(|region| region.eq_ignore_ascii_case(&influencer.region))
        {
            return Err(TargetingMismatch::Region(influencer.region.clone()));
        }

        if let Some(gender) = self.gender {
            if influencer.gender != Some(gender) {
                return Err(TargetingMismatch::Gender);
            }
        }

        if self.min_age.is_some() || self.max_age.is_some() {
            let age = influencer.age_on(today);
            let within = match age {
                Some(age) => {
                    self.min_age.map_or(true, |min| age >= min)
                        && self.max_age.map_or(true, |max| age <= max)
                }
                None => false,
            };
            if !within {
                return Err(TargetingMismatch::Age { age });
            }
        }

        if let Some(min) = self.min_followers {
            if influencer.followers < min {
                return Err(TargetingMismatch::TooFewFollowers {
                    min,
                    found: influencer.followers,
                });
            }
        }

        if let Some(max) = self.max_followers {
            if influencer.followers > max {
                return Err(TargetingMismatch::TooManyFollowers {
                    max,
                    found: influencer.followers,
                });
            }
        }

        if !self.interests.is_empty()
            && !influencer.interests.iter().any(|interest| {
                self.interests
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(interest))
            })
        {
            return Err(TargetingMismatch::Interests);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::domain::InfluencerId;
    use crate::marketplace::influencer::InfluencerState;

    fn influencer() -> InfluencerProfile {
        InfluencerProfile {
            id: InfluencerId::from("inf-7"),
            username: "trailrunner".to_string(),
            region: "GB".to_string(),
            gender: Some(Gender::Male),
            birthday: NaiveDate::from_ymd_opt(1990, 1, 1),
            followers: 12_000,
            engagement_rate: 0.04,
            estimated_impressions: None,
            vat_registered: false,
            interests: vec!["Fitness".to_string(), "Travel".to_string()],
            state: InfluencerState::Reviewed,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid")
    }

    #[test]
    fn empty_targeting_accepts_eligible_accounts() {
        assert_eq!(Targeting::default().check(&influencer(), today()), Ok(()));
    }

    #[test]
    fn rejects_accounts_that_cannot_participate() {
        let mut profile = influencer();
        profile.state = InfluencerState::Cooldown;
        assert_eq!(
            Targeting::default().check(&profile, today()),
            Err(TargetingMismatch::IneligibleState("cooldown"))
        );
    }

    #[test]
    fn checks_region_followers_and_interests() {
        let targeting = Targeting {
            regions: vec!["gb".to_string(), "IE".to_string()],
            min_followers: Some(5_000),
            max_followers: Some(50_000),
            interests: vec!["fitness".to_string()],
            ..Targeting::default()
        };
        assert_eq!(targeting.check(&influencer(), today()), Ok(()));

        let mut abroad = influencer();
        abroad.region = "US".to_string();
        assert_eq!(
            targeting.check(&abroad, today()),
            Err(TargetingMismatch::Region("US".to_string()))
        );

        let mut small = influencer();
        small.followers = 900;
        assert_eq!(
            targeting.check(&small, today()),
            Err(TargetingMismatch::TooFewFollowers {
                min: 5_000,
                found: 900
            })
        );

        let mut off_topic = influencer();
        off_topic.interests = vec!["Gaming".to_string()];
        assert_eq!(
            targeting.check(&off_topic, today()),
            Err(TargetingMismatch::Interests)
        );
    }

    #[test]
    fn age_range_requires_known_birthday() {
        let targeting = Targeting {
            min_age: Some(18),
            max_age: Some(30),
            ..Targeting::default()
        };
        assert_eq!(
            targeting.check(&influencer(), today()),
            Err(TargetingMismatch::Age { age: Some(35) })
        );

        let mut unknown = influencer();
        unknown.birthday = None;
        assert_eq!(
            targeting.check(&unknown, today()),
            Err(TargetingMismatch::Age { age: None })
        );
    }
}
