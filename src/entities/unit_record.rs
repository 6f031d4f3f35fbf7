//! Unit record entity - the ledger.
//!
//! Two kinds of rows share this table:
//! - per-wager rows (`serial` and `user_id` set), created with `units = 0`
//!   at placement and overwritten once at settlement;
//! - period summary rows (`serial` and `user_id` NULL) written by the monthly
//!   rollup, carrying the period sum in `total` and the period start in
//!   `timestamp`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ledger row
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "unit_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub guild_id: String,
    /// Wager serial; NULL for period summary rows
    pub serial: Option<i64>,
    /// Bettor; NULL for period summary rows
    pub user_id: Option<String>,
    /// Signed unit delta of the wager's settlement (0 while pending)
    pub units: f64,
    /// Period sum, only on summary rows
    pub total: Option<f64>,
    /// Settlement time for wager rows, period start for summary rows
    pub timestamp: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::wager::Entity",
        from = "Column::Serial",
        to = "super::wager::Column::Serial"
    )]
    Wager,
}

impl Related<super::wager::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wager.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
