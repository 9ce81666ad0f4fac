//! Budget accounting per reward model.
//!
//! A fund snapshot counts the units held by reserving offers against the campaign's configured
//! units. Callers must hold the campaign's reservation lock between building the snapshot and
//! persisting the reserving transition.

use serde::Serialize;

use super::campaign::{Campaign, RewardModel};
use super::offer::Offer;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FundError {
    #[error("fund exhausted: {requested} units requested, {remaining} remaining")]
    Exhausted { requested: u64, remaining: u64 },
    #[error("offer carries no units for a {0} campaign")]
    ZeroUnits(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fund {
    reward_model: RewardModel,
    total: u64,
    reserved: u64,
    submitted: u64,
    minimum_reservation: u64,
}

/// Reporting view over a fund snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundProgress {
    pub reward_model: RewardModel,
    pub total: u64,
    pub reserved: u64,
    pub submitted: u64,
    pub remaining: u64,
    pub reserved_percentage: f64,
    pub is_reservable: bool,
}

impl Fund {
    pub fn for_campaign(campaign: &Campaign, offers: &[Offer]) -> Self {
        let (reserved, submitted) = offers
            .iter()
            .filter(|offer| offer.campaign_id == campaign.id)
            .fold((0u64, 0u64), |(reserved, submitted), offer| {
                if offer.state.is_reserved() {
                    (reserved.saturating_add(offer.units), submitted)
                } else if offer.state.is_submitted() {
                    (reserved, submitted.saturating_add(offer.units))
                } else {
                    (reserved, submitted)
                }
            });

        let minimum_reservation = match campaign.reward_model {
            RewardModel::Assets | RewardModel::Cash => campaign.post_count().max(1),
            RewardModel::Reach => campaign.targeting.min_followers.unwrap_or(1).max(1),
            RewardModel::Engagement | RewardModel::Impressions => 1,
        };

        Self {
            reward_model: campaign.reward_model,
            total: campaign.units,
            reserved,
            submitted,
            minimum_reservation,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn reserved(&self) -> u64 {
        self.reserved
    }

    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.reserved)
    }

    /// Whether any influencer could still take a slot in this campaign.
    pub fn is_reservable(&self) -> bool {
        self.remaining() >= self.minimum_reservation
    }

    pub fn can_reserve(&self, units: u64) -> bool {
        units > 0 && self.reserved.saturating_add(units) <= self.total
    }

    pub fn reserve(&mut self, units: u64) -> Result<(), FundError> {
        if units == 0 {
            return Err(FundError::ZeroUnits(self.reward_model.label()));
        }
        if !self.can_reserve(units) {
            return Err(FundError::Exhausted {
                requested: units,
                remaining: self.remaining(),
            });
        }
        self.reserved += units;
        Ok(())
    }

    pub fn release(&mut self, units: u64) {
        self.reserved = self.reserved.saturating_sub(units);
    }

    pub fn progress(&self) -> FundProgress {
        let reserved_percentage = if self.total == 0 {
            0.0
        } else {
            (self.reserved as f64 / self.total as f64) * 100.0
        };

        FundProgress {
            reward_model: self.reward_model,
            total: self.total,
            reserved: self.reserved,
            submitted: self.submitted,
            remaining: self.remaining(),
            reserved_percentage,
            is_reservable: self.is_reservable(),
        }
    }
}
