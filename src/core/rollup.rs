//! Ledger rollups
//!
//! Period totals are always re-derived from the per-wager ledger rows whose
//! timestamp falls inside the period, so every job here can be re-run for
//! the same period and lands on the same numbers.
//!
//! - monthly: one summary row per (guild, month start) in `unit_records`
//! - yearly: each capper's `yearly_total`, plus the one-way lifetime fold
//!   for premium guilds
//! - voice labels: month-to-date and year-to-date totals shown as voice
//!   channel names for premium guilds

use super::guild;
use super::odds::{format_units, round_units};
use super::surface::VoiceLabelSurface;
use crate::entities::{Capper, GuildSettings, UnitRecord, capper, guild_settings, unit_record};
use crate::errors::{Error, Result};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use sea_orm::sea_query::{Condition, Expr};
use sea_orm::{Set, TransactionTrait, prelude::*};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl Month {
    #[must_use]
    pub fn containing(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    #[must_use]
    pub const fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    #[must_use]
    pub const fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn start(self) -> Result<DateTime<Utc>> {
        day_start(self.year, self.month)
    }

    pub fn end(self) -> Result<DateTime<Utc>> {
        self.next().start()
    }

    /// `YYYY-MM`, as stored in `system_state`.
    #[must_use]
    pub fn key(self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        let (year, month) = key.trim().split_once('-')?;
        let month = Self {
            year: year.parse().ok()?,
            month: month.parse().ok()?,
        };
        (1..=12).contains(&month.month).then_some(month)
    }
}

fn day_start(year: i32, month: u32) -> Result<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| Error::Config {
            message: format!("Invalid period {year:04}-{month:02}"),
        })
}

/// `[start, end)` of a calendar year.
pub fn year_bounds(year: i32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    Ok((day_start(year, 1)?, day_start(year + 1, 1)?))
}

/// Sum of the ledger deltas, rounded to cents of a unit.
#[must_use]
pub fn fold_deltas(rows: &[unit_record::Model]) -> f64 {
    round_units(rows.iter().map(|row| row.units).sum())
}

/// Per-guild sums.
#[must_use]
pub fn fold_by_guild(rows: &[unit_record::Model]) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for row in rows {
        *totals.entry(row.guild_id.clone()).or_insert(0.0) += row.units;
    }
    totals.values_mut().for_each(|total| *total = round_units(*total));
    totals
}

/// Per-(guild, user) sums.
#[must_use]
pub fn fold_by_user(rows: &[unit_record::Model]) -> BTreeMap<(String, String), f64> {
    let mut totals = BTreeMap::new();
    for row in rows {
        if let Some(user_id) = &row.user_id {
            *totals
                .entry((row.guild_id.clone(), user_id.clone()))
                .or_insert(0.0) += row.units;
        }
    }
    totals.values_mut().for_each(|total| *total = round_units(*total));
    totals
}

/// Per-wager ledger rows stamped inside `[start, end)`, optionally for one
/// guild. Period summary rows are never included.
pub async fn ledger_rows<C: ConnectionTrait>(
    db: &C,
    guild_id: Option<&str>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<unit_record::Model>> {
    let mut query = UnitRecord::find()
        .filter(unit_record::Column::Serial.is_not_null())
        .filter(unit_record::Column::Timestamp.gte(start))
        .filter(unit_record::Column::Timestamp.lt(end));
    if let Some(guild_id) = guild_id {
        query = query.filter(unit_record::Column::GuildId.eq(guild_id));
    }
    query.all(db).await.map_err(Into::into)
}

/// Result of one monthly rollup.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyRollup {
    pub month: Month,
    /// (guild id, period total)
    pub guild_totals: Vec<(String, f64)>,
}

/// Writes the period summary row for every guild with ledger activity in
/// `month`. Re-running overwrites the rows with the same totals.
pub async fn run_monthly_rollup(db: &DatabaseConnection, month: Month) -> Result<MonthlyRollup> {
    let start = month.start()?;
    let end = month.end()?;

    let txn = db.begin().await?;
    let rows = ledger_rows(&txn, None, start, end).await?;
    let totals = fold_by_guild(&rows);

    for (guild_id, total) in &totals {
        let existing = UnitRecord::find()
            .filter(unit_record::Column::GuildId.eq(guild_id))
            .filter(unit_record::Column::Serial.is_null())
            .filter(unit_record::Column::Timestamp.eq(start))
            .one(&txn)
            .await?;

        if let Some(summary) = existing {
            let mut active: unit_record::ActiveModel = summary.into();
            active.total = Set(Some(*total));
            active.update(&txn).await?;
        } else {
            unit_record::ActiveModel {
                guild_id: Set(guild_id.clone()),
                serial: Set(None),
                user_id: Set(None),
                units: Set(0.0),
                total: Set(Some(*total)),
                timestamp: Set(start),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
    }

    txn.commit().await?;

    info!(month = %month.key(), guilds = totals.len(), "Monthly rollup complete");
    Ok(MonthlyRollup {
        month,
        guild_totals: totals.into_iter().collect(),
    })
}

/// Result of one yearly rollup.
#[derive(Debug, Clone, PartialEq)]
pub struct YearlyRollup {
    pub year: i32,
    pub cappers_updated: usize,
    /// Premium guilds whose year was folded into the lifetime total by this run
    pub guilds_folded: Vec<String>,
}

/// Writes each capper's total for `year` and folds the year into the
/// lifetime total of premium guilds.
///
/// The fold is guarded by `lifetime_folded_year`, so a guild's year is
/// added at most once no matter how often this runs.
pub async fn run_yearly_rollup(db: &DatabaseConnection, year: i32) -> Result<YearlyRollup> {
    let (start, end) = year_bounds(year)?;

    let txn = db.begin().await?;
    let rows = ledger_rows(&txn, None, start, end).await?;

    let user_totals = fold_by_user(&rows);
    for ((guild_id, user_id), total) in &user_totals {
        let updated = Capper::update_many()
            .col_expr(capper::Column::YearlyTotal, Expr::value(*total))
            .filter(capper::Column::GuildId.eq(guild_id))
            .filter(capper::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            capper::ActiveModel {
                guild_id: Set(guild_id.clone()),
                user_id: Set(user_id.clone()),
                display_name: Set(user_id.clone()),
                avatar_url: Set(None),
                wins: Set(0),
                losses: Set(0),
                yearly_total: Set(Some(*total)),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
    }
    txn.commit().await?;

    let guild_totals = fold_by_guild(&rows);
    let mut guilds_folded = Vec::new();
    for guild_id in guild::premium_guild_ids(db).await? {
        let year_total = guild_totals.get(&guild_id).copied().unwrap_or(0.0);
        guild::get_or_create_settings(db, &guild_id).await?;

        let folded = GuildSettings::update_many()
            .col_expr(
                guild_settings::Column::LifetimeTotal,
                Expr::col(guild_settings::Column::LifetimeTotal).add(year_total),
            )
            .col_expr(guild_settings::Column::RunningTotal, Expr::value(0.0))
            .col_expr(guild_settings::Column::LifetimeFoldedYear, Expr::value(year))
            .filter(guild_settings::Column::GuildId.eq(&guild_id))
            .filter(
                Condition::any()
                    .add(guild_settings::Column::LifetimeFoldedYear.is_null())
                    .add(guild_settings::Column::LifetimeFoldedYear.lt(year)),
            )
            .exec(db)
            .await?;

        if folded.rows_affected == 1 {
            guilds_folded.push(guild_id);
        }
    }

    info!(
        year,
        cappers = user_totals.len(),
        folded = guilds_folded.len(),
        "Yearly rollup complete"
    );
    Ok(YearlyRollup {
        year,
        cappers_updated: user_totals.len(),
        guilds_folded,
    })
}

/// Voice channel name for a period total, e.g. `📅 Month: +4.5u`.
#[must_use]
pub fn format_label(period: &str, total: f64) -> String {
    let icon = if period == "Year" { "📆" } else { "📅" };
    format!("{icon} {period}: {}", format_units(total))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoiceLabelReport {
    pub renamed: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Recomputes month-to-date and year-to-date totals for every premium guild
/// and renames its voice channels when the shown label differs.
///
/// A failure in one guild is logged and the rest still run.
pub async fn refresh_voice_labels(
    db: &DatabaseConnection,
    surface: &dyn VoiceLabelSurface,
    now: DateTime<Utc>,
) -> Result<VoiceLabelReport> {
    let mut report = VoiceLabelReport::default();

    for guild_id in guild::premium_guild_ids(db).await? {
        if let Err(e) = refresh_guild_labels(db, surface, &guild_id, now, &mut report).await {
            report.failed += 1;
            warn!(%guild_id, error = %e, "Failed to refresh voice labels");
        }
    }
    Ok(report)
}

async fn refresh_guild_labels(
    db: &DatabaseConnection,
    surface: &dyn VoiceLabelSurface,
    guild_id: &str,
    now: DateTime<Utc>,
    report: &mut VoiceLabelReport,
) -> Result<()> {
    let Some(settings) = guild::get_settings(db, guild_id).await? else {
        return Ok(());
    };

    let month_start = Month::containing(now).start()?;
    let (year_start, _) = year_bounds(now.year())?;
    let year_rows = ledger_rows(db, Some(guild_id), year_start, now).await?;
    let month_rows: Vec<_> = year_rows
        .iter()
        .filter(|row| row.timestamp >= month_start)
        .cloned()
        .collect();
    let year_total = fold_deltas(&year_rows);
    let month_total = fold_deltas(&month_rows);

    if (settings.running_total - year_total).abs() > f64::EPSILON {
        let mut active: guild_settings::ActiveModel = settings.clone().into();
        active.running_total = Set(year_total);
        active.update(db).await?;
    }

    let labels = [
        (settings.monthly_voice_channel_id, format_label("Month", month_total)),
        (settings.yearly_voice_channel_id, format_label("Year", year_total)),
    ];
    for (channel_id, label) in labels {
        let Some(channel_id) = channel_id else {
            continue;
        };
        let current = surface.channel_label(&channel_id).await?;
        if current == label {
            report.unchanged += 1;
        } else {
            surface.rename_channel(&channel_id, &label).await?;
            report.renamed += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::settlement::{Outcome, apply_settlement};
    use crate::entities::SubscriptionTier;
    use crate::test_utils::{FakeSurface, place_test_wager, setup_test_db};

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    async fn settle_at(
        db: &DatabaseConnection,
        user_id: &str,
        units: u8,
        odds: Option<i32>,
        outcome: Outcome,
        when: DateTime<Utc>,
    ) {
        let wager = place_test_wager(db, user_id, units, odds).await.unwrap();
        apply_settlement(db, wager.serial, outcome, user_id, when)
            .await
            .unwrap();
    }

    #[test]
    fn test_month_navigation() {
        let december = Month {
            year: 2025,
            month: 12,
        };
        assert_eq!(december.next(), Month { year: 2026, month: 1 });
        assert_eq!(december.next().previous(), december);
        assert_eq!(december.key(), "2025-12");
        assert_eq!(Month::parse("2025-12"), Some(december));
        assert_eq!(Month::parse("2025-13"), None);
        assert_eq!(december.end().unwrap(), at(2026, 1, 1) - chrono::Duration::hours(12));
    }

    #[test]
    fn test_format_label() {
        assert_eq!(format_label("Month", 4.5), "📅 Month: +4.5u");
        assert_eq!(format_label("Year", -2.0), "📆 Year: -2u");
    }

    #[tokio::test]
    async fn test_monthly_rollup_is_idempotent() {
        let db = setup_test_db().await.unwrap();
        settle_at(&db, "u1", 2, Some(-110), Outcome::Won, at(2026, 3, 5)).await;
        settle_at(&db, "u2", 1, None, Outcome::Lost, at(2026, 3, 20)).await;
        // Outside the month
        settle_at(&db, "u1", 3, None, Outcome::Won, at(2026, 4, 1)).await;

        let march = Month {
            year: 2026,
            month: 3,
        };
        let first = run_monthly_rollup(&db, march).await.unwrap();
        let second = run_monthly_rollup(&db, march).await.unwrap();

        assert_eq!(first.guild_totals, vec![("g1".to_string(), 1.2)]);
        assert_eq!(first, second);

        let summaries = UnitRecord::find()
            .filter(unit_record::Column::Serial.is_null())
            .all(&db)
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].total, Some(1.2));
        assert_eq!(summaries[0].timestamp, march.start().unwrap());
    }

    #[tokio::test]
    async fn test_monthly_rollup_picks_up_late_settlements() {
        let db = setup_test_db().await.unwrap();
        let march = Month {
            year: 2026,
            month: 3,
        };
        settle_at(&db, "u1", 1, None, Outcome::Won, at(2026, 3, 5)).await;
        run_monthly_rollup(&db, march).await.unwrap();

        settle_at(&db, "u1", 1, None, Outcome::Won, at(2026, 3, 6)).await;
        let rollup = run_monthly_rollup(&db, march).await.unwrap();
        assert_eq!(rollup.guild_totals, vec![("g1".to_string(), 2.0)]);
    }

    #[tokio::test]
    async fn test_yearly_rollup_sets_capper_totals_and_folds_once() {
        let db = setup_test_db().await.unwrap();
        guild::set_subscription_tier(&db, "g1", SubscriptionTier::Paid, Utc::now())
            .await
            .unwrap();
        settle_at(&db, "u1", 2, Some(150), Outcome::Won, at(2025, 2, 1)).await;
        settle_at(&db, "u1", 1, None, Outcome::Lost, at(2025, 11, 1)).await;
        settle_at(&db, "u2", 3, None, Outcome::Won, at(2025, 6, 1)).await;

        let rollup = run_yearly_rollup(&db, 2025).await.unwrap();
        assert_eq!(rollup.cappers_updated, 2);
        assert_eq!(rollup.guilds_folded, vec!["g1".to_string()]);

        let u1 = Capper::find()
            .filter(capper::Column::UserId.eq("u1"))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(u1.yearly_total, Some(1.0));

        let again = run_yearly_rollup(&db, 2025).await.unwrap();
        assert!(again.guilds_folded.is_empty());

        let settings = guild::get_settings(&db, "g1").await.unwrap().unwrap();
        assert_eq!(settings.lifetime_total, 4.0);
        assert_eq!(settings.running_total, 0.0);
        assert_eq!(settings.lifetime_folded_year, Some(2025));
    }

    #[tokio::test]
    async fn test_free_guilds_are_not_folded() {
        let db = setup_test_db().await.unwrap();
        settle_at(&db, "u1", 1, None, Outcome::Won, at(2025, 2, 1)).await;

        let rollup = run_yearly_rollup(&db, 2025).await.unwrap();
        assert!(rollup.guilds_folded.is_empty());
        assert!(guild::get_settings(&db, "g1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_voice_labels_only_renamed_when_changed() {
        let db = setup_test_db().await.unwrap();
        let surface = FakeSurface::new();
        guild::set_subscription_tier(&db, "g1", SubscriptionTier::Active, Utc::now())
            .await
            .unwrap();
        guild::set_voice_channels(&db, "g1", Some("v1".to_string()), Some("v2".to_string()))
            .await
            .unwrap();
        settle_at(&db, "u1", 2, None, Outcome::Won, at(2026, 1, 10)).await;
        settle_at(&db, "u1", 1, None, Outcome::Lost, at(2026, 3, 2)).await;

        let now = at(2026, 3, 15);
        let report = refresh_voice_labels(&db, &surface, now).await.unwrap();
        assert_eq!(report.renamed, 2);
        assert_eq!(surface.label("v1").await.as_deref(), Some("📅 Month: -1u"));
        assert_eq!(surface.label("v2").await.as_deref(), Some("📆 Year: +1u"));

        let report = refresh_voice_labels(&db, &surface, now).await.unwrap();
        assert_eq!(report.renamed, 0);
        assert_eq!(report.unchanged, 2);

        let settings = guild::get_settings(&db, "g1").await.unwrap().unwrap();
        assert_eq!(settings.running_total, 1.0);
    }
}
