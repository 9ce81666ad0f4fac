use serde::{Deserialize, Serialize};
use std::fmt;

/// Settlement currencies supported by the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Gbp,
    Eur,
    Usd,
    Aud,
    Zar,
}

impl Currency {
    pub const fn code(self) -> &'static str {
        match self {
            Self::Gbp => "GBP",
            Self::Eur => "EUR",
            Self::Usd => "USD",
            Self::Aud => "AUD",
            Self::Zar => "ZAR",
        }
    }

    const fn symbol(self) -> Option<&'static str> {
        match self {
            Self::Gbp => Some("£"),
            Self::Eur => Some("€"),
            Self::Usd => Some("$"),
            Self::Aud | Self::Zar => None,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GBP" => Some(Self::Gbp),
            "EUR" => Some(Self::Eur),
            "USD" => Some(Self::Usd),
            "AUD" => Some(Self::Aud),
            "ZAR" => Some(Self::Zar),
            _ => None,
        }
    }
}

/// Amount in minor units (pence, cents) tagged with its currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    pub amount: u64,
    pub currency: Currency,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("cannot combine {left} with {right}")]
    CurrencyMismatch { left: &'static str, right: &'static str },
    #[error("amount overflow")]
    Overflow,
}

impl Money {
    pub const fn new(amount: u64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub const fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    pub const fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency.code(),
                right: other.currency.code(),
            });
        }
        Ok(())
    }

    pub fn checked_add(self, other: Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(&other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(MoneyError::Overflow)?;
        Ok(Money::new(amount, self.currency))
    }

    /// `self * numerator / denominator`, rounded down. A zero denominator yields zero.
    pub fn scale(self, numerator: u64, denominator: u64) -> Money {
        if denominator == 0 {
            return Money::zero(self.currency);
        }
        let scaled = (self.amount as u128) * (numerator as u128) / (denominator as u128);
        Money::new(scaled.min(u64::MAX as u128) as u64, self.currency)
    }

    /// Basis-point share of the amount, rounded half up.
    pub fn basis_points(self, bps: u32) -> Money {
        let scaled = ((self.amount as u128) * (bps as u128) + 5_000) / 10_000;
        Money::new(scaled.min(u64::MAX as u128) as u64, self.currency)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let major = self.amount / 100;
        let minor = self.amount % 100;
        match self.currency.symbol() {
            Some(symbol) => write!(f, "{symbol}{major}.{minor:02}"),
            None => write!(f, "{major}.{minor:02} {}", self.currency.code()),
        }
    }
}
