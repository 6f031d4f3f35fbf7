//! Guild settings entity - per-guild channel/role configuration and the
//! premium running totals.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Guild settings database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "guild_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub guild_id: String,
    /// Comma-separated channel ids bets may be posted to
    pub bet_channel_ids: String,
    /// Role mentioned on every posted card
    pub notify_role_id: Option<String>,
    /// Voice channel renamed to the month-to-date total
    pub monthly_voice_channel_id: Option<String>,
    /// Voice channel renamed to the year-to-date total
    pub yearly_voice_channel_id: Option<String>,
    /// Current year's running total, refreshed by the voice label loop
    pub running_total: f64,
    /// Sum of all folded years
    pub lifetime_total: f64,
    /// Last year already folded into `lifetime_total`
    pub lifetime_folded_year: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parsed allow-list of bet channels.
    #[must_use]
    pub fn bet_channels(&self) -> Vec<String> {
        self.bet_channel_ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}
