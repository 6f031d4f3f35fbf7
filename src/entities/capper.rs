//! Capper entity - per (guild, user) win/loss counters.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Capper database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cappers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub guild_id: String,
    pub user_id: String,
    /// Name used on the impersonated webhook card
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub wins: i32,
    pub losses: i32,
    /// Net units for the last completed year, written by the yearly rollup
    pub yearly_total: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
