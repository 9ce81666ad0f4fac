use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

identifier!(
    /// Identifier wrapper for brand campaigns.
    CampaignId
);
identifier!(
    /// Identifier wrapper for a single post slot inside a campaign.
    PostId
);
identifier!(
    /// Identifier wrapper for influencer offers.
    OfferId
);
identifier!(
    /// Identifier wrapper for submitted gigs.
    GigId
);
identifier!(InfluencerId);
identifier!(PaymentId);

/// Who triggered a logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Influencer,
    Brand,
    Admin,
    System,
}

impl Actor {
    pub const fn label(self) -> &'static str {
        match self {
            Actor::Influencer => "influencer",
            Actor::Brand => "brand",
            Actor::Admin => "admin",
            Actor::System => "system",
        }
    }
}
