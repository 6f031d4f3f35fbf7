//! Capper statistics
//!
//! Read-only views over the counters and the ledger: a capper's record,
//! the guild leaderboard and the list of open wagers.

use super::odds::round_units;
use crate::entities::{Capper, UnitRecord, Wager, capper, unit_record, wager};
use crate::errors::Result;
use sea_orm::{QueryOrder, prelude::*};
use std::collections::HashMap;

/// One capper's record in a guild.
#[derive(Debug, Clone, PartialEq)]
pub struct CapperStats {
    pub user_id: String,
    pub display_name: String,
    pub wins: i32,
    pub losses: i32,
    /// Sum of every settled ledger delta
    pub net_units: f64,
    pub pending: usize,
    pub yearly_total: Option<f64>,
}

impl CapperStats {
    /// Win percentage over settled wagers; `None` before the first result.
    #[must_use]
    pub fn win_rate(&self) -> Option<f64> {
        let settled = self.wins + self.losses;
        (settled > 0).then(|| round_units(f64::from(self.wins) * 100.0 / f64::from(settled)))
    }
}

/// Record for `user_id`, or `None` if they never placed a wager here.
pub async fn get_stats(
    db: &DatabaseConnection,
    guild_id: &str,
    user_id: &str,
) -> Result<Option<CapperStats>> {
    let Some(capper) = Capper::find()
        .filter(capper::Column::GuildId.eq(guild_id))
        .filter(capper::Column::UserId.eq(user_id))
        .one(db)
        .await?
    else {
        return Ok(None);
    };

    let rows = UnitRecord::find()
        .filter(unit_record::Column::GuildId.eq(guild_id))
        .filter(unit_record::Column::UserId.eq(user_id))
        .all(db)
        .await?;
    let net_units = round_units(rows.iter().map(|row| row.units).sum());

    let pending = pending_wagers(db, guild_id, user_id).await?.len();

    Ok(Some(CapperStats {
        user_id: capper.user_id,
        display_name: capper.display_name,
        wins: capper.wins,
        losses: capper.losses,
        net_units,
        pending,
        yearly_total: capper.yearly_total,
    }))
}

/// Top `limit` cappers in the guild by net units, best first.
pub async fn leaderboard(
    db: &DatabaseConnection,
    guild_id: &str,
    limit: usize,
) -> Result<Vec<CapperStats>> {
    let cappers = Capper::find()
        .filter(capper::Column::GuildId.eq(guild_id))
        .all(db)
        .await?;

    let rows = UnitRecord::find()
        .filter(unit_record::Column::GuildId.eq(guild_id))
        .filter(unit_record::Column::Serial.is_not_null())
        .all(db)
        .await?;
    let mut net: HashMap<String, f64> = HashMap::new();
    for row in rows {
        if let Some(user_id) = row.user_id {
            *net.entry(user_id).or_insert(0.0) += row.units;
        }
    }

    let mut board: Vec<CapperStats> = cappers
        .into_iter()
        .filter(|capper| capper.wins + capper.losses > 0)
        .map(|capper| CapperStats {
            net_units: round_units(net.get(&capper.user_id).copied().unwrap_or(0.0)),
            user_id: capper.user_id,
            display_name: capper.display_name,
            wins: capper.wins,
            losses: capper.losses,
            pending: 0,
            yearly_total: capper.yearly_total,
        })
        .collect();

    board.sort_by(|a, b| {
        b.net_units
            .total_cmp(&a.net_units)
            .then_with(|| b.wins.cmp(&a.wins))
    });
    board.truncate(limit);
    Ok(board)
}

/// Open wagers for one capper, oldest first.
pub async fn pending_wagers(
    db: &DatabaseConnection,
    guild_id: &str,
    user_id: &str,
) -> Result<Vec<wager::Model>> {
    Wager::find()
        .filter(wager::Column::GuildId.eq(guild_id))
        .filter(wager::Column::UserId.eq(user_id))
        .filter(wager::Column::Won.eq(false))
        .filter(wager::Column::Loss.eq(false))
        .order_by_asc(wager::Column::Serial)
        .all(db)
        .await
        .map_err(Into::into)
}
