//! Periodic job triggers
//!
//! Thin timers around the rollup functions. The last completed month and
//! year are remembered in `system_state`, so periods missed while the bot was
//! offline are caught up at startup and finished periods are not re-run on
//! every restart.

use super::rollup::{
    self, Month, MonthlyRollup, YearlyRollup, run_monthly_rollup, run_yearly_rollup, year_bounds,
};
use super::session::SessionRegistry;
use super::surface::VoiceLabelSurface;
use crate::config::settings::RollupConfig;
use crate::entities::{SystemState, system_state};
use crate::errors::Result;
use chrono::{DateTime, Datelike, Utc};
use sea_orm::{ConnectionTrait, Set, prelude::*};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

const LAST_MONTHLY_ROLLUP_KEY: &str = "last_monthly_rollup";
const LAST_YEARLY_ROLLUP_KEY: &str = "last_yearly_rollup";

// Slack after a boundary so late settlements at 23:59:59 are in
const BOUNDARY_GRACE: Duration = Duration::from_secs(30);

/// Reads a `system_state` value.
pub async fn get_state<C: ConnectionTrait>(db: &C, key: &str) -> Result<Option<String>> {
    Ok(SystemState::find()
        .filter(system_state::Column::Key.eq(key))
        .one(db)
        .await?
        .map(|state| state.value))
}

async fn set_state<C: ConnectionTrait>(db: &C, key: &str, value: String) -> Result<()> {
    let now = Utc::now();
    let existing = SystemState::find()
        .filter(system_state::Column::Key.eq(key))
        .one(db)
        .await?;

    if let Some(state) = existing {
        let mut active_model: system_state::ActiveModel = state.into();
        active_model.value = Set(value);
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        system_state::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

/// Start of the next calendar month.
pub fn next_month_boundary(now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    Month::containing(now).end()
}

/// Start of the next calendar year.
pub fn next_year_boundary(now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    Ok(year_bounds(now.year())?.1)
}

/// Rolls up every completed month not yet recorded, oldest first.
///
/// With no record at all only the month just completed is rolled up.
pub async fn catch_up_monthly(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<Vec<MonthlyRollup>> {
    let last_completed = Month::containing(now).previous();
    let mut month = match get_state(db, LAST_MONTHLY_ROLLUP_KEY)
        .await?
        .as_deref()
        .and_then(Month::parse)
    {
        Some(recorded) => recorded.next(),
        None => last_completed,
    };

    let mut results = Vec::new();
    while month <= last_completed {
        results.push(run_monthly_rollup(db, month).await?);
        set_state(db, LAST_MONTHLY_ROLLUP_KEY, month.key()).await?;
        month = month.next();
    }
    Ok(results)
}

/// Rolls up every completed year not yet recorded, oldest first.
pub async fn catch_up_yearly(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<Vec<YearlyRollup>> {
    let last_completed = now.year() - 1;
    let mut year = match get_state(db, LAST_YEARLY_ROLLUP_KEY)
        .await?
        .and_then(|value| value.trim().parse::<i32>().ok())
    {
        Some(recorded) => recorded + 1,
        None => last_completed,
    };

    let mut results = Vec::new();
    while year <= last_completed {
        results.push(run_yearly_rollup(db, year).await?);
        set_state(db, LAST_YEARLY_ROLLUP_KEY, year.to_string()).await?;
        year += 1;
    }
    Ok(results)
}

fn until(boundary: DateTime<Utc>) -> Duration {
    (boundary - Utc::now()).to_std().unwrap_or(Duration::ZERO) + BOUNDARY_GRACE
}

/// Handles the background loops need.
#[derive(Clone)]
pub struct JobContext {
    pub db: DatabaseConnection,
    pub voice: Arc<dyn VoiceLabelSurface>,
    pub sessions: SessionRegistry,
    pub config: RollupConfig,
}

/// Spawns the monthly, yearly, voice label and session sweep loops.
pub fn spawn_background_jobs(ctx: JobContext) -> JoinSet<()> {
    let mut jobs = JoinSet::new();

    let db = ctx.db.clone();
    jobs.spawn(async move {
        loop {
            match next_month_boundary(Utc::now()) {
                Ok(boundary) => tokio::time::sleep(until(boundary)).await,
                Err(e) => {
                    error!(error = %e, "Monthly rollup timer stopped");
                    return;
                }
            }
            match catch_up_monthly(&db, Utc::now()).await {
                Ok(done) => info!(periods = done.len(), "Monthly rollup job ran"),
                Err(e) => error!(error = %e, "Monthly rollup failed, will retry next boundary"),
            }
        }
    });

    let db = ctx.db.clone();
    jobs.spawn(async move {
        loop {
            match next_year_boundary(Utc::now()) {
                Ok(boundary) => tokio::time::sleep(until(boundary)).await,
                Err(e) => {
                    error!(error = %e, "Yearly rollup timer stopped");
                    return;
                }
            }
            match catch_up_yearly(&db, Utc::now()).await {
                Ok(done) => info!(periods = done.len(), "Yearly rollup job ran"),
                Err(e) => error!(error = %e, "Yearly rollup failed, will retry next boundary"),
            }
        }
    });

    let db = ctx.db.clone();
    let voice = Arc::clone(&ctx.voice);
    let period = Duration::from_secs(ctx.config.voice_label_interval_secs.max(1));
    jobs.spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match rollup::refresh_voice_labels(&db, voice.as_ref(), Utc::now()).await {
                Ok(report) => debug!(
                    renamed = report.renamed,
                    unchanged = report.unchanged,
                    failed = report.failed,
                    "Voice labels refreshed"
                ),
                Err(e) => error!(error = %e, "Voice label refresh failed"),
            }
        }
    });

    let sessions = ctx.sessions;
    let period = Duration::from_secs(ctx.config.session_sweep_secs.max(1));
    jobs.spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            sessions.sweep_expired().await;
        }
    });

    jobs
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::setup_test_db;
    use chrono::TimeZone;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(
            next_month_boundary(at(2026, 12, 15)).unwrap(),
            Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            next_year_boundary(at(2026, 3, 1)).unwrap(),
            Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_monthly_catch_up_runs_missed_months_once() {
        let db = setup_test_db().await.unwrap();

        let first = catch_up_monthly(&db, at(2026, 3, 2)).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].month, Month { year: 2026, month: 2 });
        assert!(catch_up_monthly(&db, at(2026, 3, 20)).await.unwrap().is_empty());

        // Offline through May and June
        let missed = catch_up_monthly(&db, at(2026, 7, 1)).await.unwrap();
        let months: Vec<_> = missed.iter().map(|r| r.month.key()).collect();
        assert_eq!(months, vec!["2026-03", "2026-04", "2026-05", "2026-06"]);
        assert_eq!(
            get_state(&db, LAST_MONTHLY_ROLLUP_KEY).await.unwrap().as_deref(),
            Some("2026-06")
        );
    }

    #[tokio::test]
    async fn test_yearly_catch_up() {
        let db = setup_test_db().await.unwrap();

        let first = catch_up_yearly(&db, at(2026, 1, 1)).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].year, 2025);
        assert!(catch_up_yearly(&db, at(2026, 6, 1)).await.unwrap().is_empty());

        let missed = catch_up_yearly(&db, at(2028, 1, 2)).await.unwrap();
        assert_eq!(missed.iter().map(|r| r.year).collect::<Vec<_>>(), vec![2026, 2027]);
    }
}
