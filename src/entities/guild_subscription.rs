//! Guild subscription entity - billing tier written by the billing side.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Subscription database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "guild_subscriptions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub guild_id: String,
    /// `"free"`, `"paid"`, `"active"`, `"lifetime"`
    pub tier: String,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Billing tier. Anything unrecognised is treated as `Free`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionTier {
    Free,
    Paid,
    Active,
    Lifetime,
}

impl SubscriptionTier {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "paid" => Self::Paid,
            "active" => Self::Active,
            "lifetime" => Self::Lifetime,
            _ => Self::Free,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Paid => "paid",
            Self::Active => "active",
            Self::Lifetime => "lifetime",
        }
    }

    /// Premium tiers unlock voice labels and lifetime folding.
    #[must_use]
    pub const fn is_premium(self) -> bool {
        !matches!(self, Self::Free)
    }
}
