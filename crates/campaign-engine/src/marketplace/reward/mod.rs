//! Reward computation: how much an influencer earns and what the VAT breakdown looks like.

mod vat;

pub use vat::{VatError, VatRate, VatTable};

use chrono::NaiveDate;
use serde::Serialize;

use super::campaign::{Campaign, RewardModel};
use super::influencer::InfluencerProfile;
use super::money::{Money, MoneyError};

/// Prices participation proportionally to the fund: a reservation of `u` units out of `U`
/// earns `budget * u / U`, so rewards across all reservations never exceed the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardCalculator {
    reward_model: RewardModel,
    budget: Money,
    total_units: u64,
    post_count: u64,
}

impl RewardCalculator {
    pub fn new(reward_model: RewardModel, budget: Money, total_units: u64, post_count: u64) -> Self {
        Self {
            reward_model,
            budget,
            total_units,
            post_count,
        }
    }

    pub fn for_campaign(campaign: &Campaign) -> Self {
        Self::new(
            campaign.reward_model,
            campaign.budget,
            campaign.units,
            campaign.post_count(),
        )
    }

    /// Units an influencer would hold against the fund.
    pub fn units_for(&self, influencer: &InfluencerProfile) -> u64 {
        match self.reward_model {
            RewardModel::Assets | RewardModel::Cash => self.post_count,
            RewardModel::Reach => influencer.followers,
            RewardModel::Engagement => influencer.estimated_engagements(),
            RewardModel::Impressions => influencer.estimated_impressions(),
        }
    }

    pub fn reward_for_units(&self, units: u64) -> Money {
        if !self.reward_model.pays_cash() {
            return Money::zero(self.budget.currency);
        }
        self.budget.scale(units, self.total_units)
    }

    pub fn quote(&self, influencer: &InfluencerProfile) -> RewardQuote {
        let units = self.units_for(influencer);
        RewardQuote {
            reward_model: self.reward_model,
            units,
            reward: self.reward_for_units(units),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RewardQuote {
    pub reward_model: RewardModel,
    pub units: u64,
    pub reward: Money,
}

/// Net/VAT/total split of a reward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RewardBreakdown {
    pub net: Money,
    pub vat: Money,
    pub total: Money,
    pub vat_percentage: f64,
}

impl RewardBreakdown {
    /// VAT is added on top of the net reward for VAT-registered influencers only.
    pub fn compute(
        net: Money,
        vat_registered: bool,
        region: &str,
        on: NaiveDate,
        table: &VatTable,
    ) -> Result<Self, MoneyError> {
        let basis_points = if vat_registered {
            table
                .rate(region, on)
                .map(|rate| rate.basis_points)
                .unwrap_or(0)
        } else {
            0
        };

        let vat = net.basis_points(basis_points);
        let total = net.checked_add(vat)?;

        Ok(Self {
            net,
            vat,
            total,
            vat_percentage: f64::from(basis_points) / 100.0,
        })
    }
}
