//! Wager entity - one placed bet.
//!
//! A wager is pending while both `won` and `loss` are false. Settlement flips
//! exactly one of them, once; the pair is never both true.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Wager database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wagers")]
pub struct Model {
    /// Time-derived serial, assigned by `core::serial`
    #[sea_orm(primary_key, auto_increment = false)]
    pub serial: i64,
    /// Discord guild the wager was placed in
    pub guild_id: String,
    /// Discord user who placed (and alone may resolve) the wager
    pub user_id: String,
    /// League code, e.g. `"NFL"` or `"UFC"` for a sub-league pick
    pub league: String,
    /// `"standard"` or `"prop"`
    pub bet_type: String,
    /// Path id within the league family, e.g. `"spread"`
    pub path: String,
    /// Team, player, fighter or horse the wager backs
    pub subject: String,
    /// Opposing side, when the path has one
    pub opponent: Option<String>,
    /// Spread, total or finishing position text
    pub line: Option<String>,
    /// American odds, `None` when none were given
    pub odds: Option<i32>,
    /// Free-text prop descriptor
    pub prop: Option<String>,
    /// Rendered one-line description shown on the card
    pub summary: String,
    /// Units risked (1-3 by policy)
    pub units: i32,
    /// Settlement-relevant amount derived from odds and units
    pub stake: f64,
    /// Channel holding the posted card
    pub channel_id: String,
    /// Posted card message id
    #[sea_orm(unique)]
    pub message_id: Option<String>,
    /// Role pinged when the card was posted
    pub notify_role_id: Option<String>,
    pub won: bool,
    pub loss: bool,
    /// User who resolved the wager
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Wager and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One wager has its ledger entry
    #[sea_orm(has_many = "super::unit_record::Entity")]
    UnitRecords,
}

impl Related<super::unit_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UnitRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Resolution state derived from the `won`/`loss` flag pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WagerState {
    Pending,
    Won,
    Lost,
}

impl Model {
    #[must_use]
    pub const fn state(&self) -> WagerState {
        match (self.won, self.loss) {
            (true, _) => WagerState::Won,
            (false, true) => WagerState::Lost,
            (false, false) => WagerState::Pending,
        }
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        !self.won && !self.loss
    }
}
