//! Startup reconciliation
//!
//! Runs once before any live resolution signal is accepted. It rebuilds the
//! pending registry, settles wagers whose bettor reacted while the bot was
//! offline, and repairs ledger rows a crash left behind. Each wager is handled
//! on its own: a failure is logged and the pass moves on.
//!
//! Running the pass twice never changes a ledger row that already carries a
//! non-zero delta, and never settles a wager twice.

use super::settlement::{
    Outcome, OutcomeMarker, PendingRegistry, PendingWager, SettleResult, apply_settlement,
    finalize_notification, settlement_delta, write_ledger_effect,
};
use super::surface::{MarkerReaction, NotificationSurface};
use crate::entities::{UnitRecord, Wager, WagerState, unit_record, wager};
use crate::errors::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Condition;
use sea_orm::{ConnectionTrait, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument, warn};

/// Counts of what one pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub placeholders_created: usize,
    pub settled_offline: usize,
    pub registered_pending: usize,
    pub ledger_repaired: usize,
    pub skipped: usize,
}

/// Runs the full reconciliation pass.
#[instrument(skip_all)]
pub async fn reconcile(
    db: &DatabaseConnection,
    surface: &dyn NotificationSurface,
    pending: &PendingRegistry,
    now: DateTime<Utc>,
) -> Result<ReconciliationReport> {
    let mut report = ReconciliationReport::default();

    let open = Wager::find()
        .filter(wager::Column::Won.eq(false))
        .filter(wager::Column::Loss.eq(false))
        .filter(wager::Column::MessageId.is_not_null())
        .all(db)
        .await?;

    for wager in &open {
        if let Err(e) = reconcile_pending(db, surface, pending, wager, now, &mut report).await {
            report.skipped += 1;
            warn!(serial = wager.serial, guild_id = %wager.guild_id, error = %e, "Skipping pending wager");
        }
    }

    let settled = Wager::find()
        .filter(
            Condition::any()
                .add(wager::Column::Won.eq(true))
                .add(wager::Column::Loss.eq(true)),
        )
        .all(db)
        .await?;

    for wager in &settled {
        match repair_settled_ledger(db, wager).await {
            Ok(true) => report.ledger_repaired += 1,
            Ok(false) => {}
            Err(e) => {
                report.skipped += 1;
                warn!(serial = wager.serial, guild_id = %wager.guild_id, error = %e, "Skipping settled wager");
            }
        }
    }

    info!(
        placeholders = report.placeholders_created,
        settled_offline = report.settled_offline,
        pending = report.registered_pending,
        repaired = report.ledger_repaired,
        skipped = report.skipped,
        "Reconciliation complete"
    );
    Ok(report)
}

async fn ledger_row<C: ConnectionTrait>(
    db: &C,
    wager: &wager::Model,
) -> Result<Option<unit_record::Model>> {
    UnitRecord::find()
        .filter(unit_record::Column::GuildId.eq(&wager.guild_id))
        .filter(unit_record::Column::Serial.eq(wager.serial))
        .filter(unit_record::Column::UserId.eq(&wager.user_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// The single outcome the bettor marked, if exactly one kind is present.
fn owner_marker(reactions: &[MarkerReaction], owner_id: &str) -> Option<OutcomeMarker> {
    let mut markers = reactions
        .iter()
        .filter(|reaction| reaction.user_id == owner_id)
        .map(|reaction| reaction.marker);
    let first = markers.next()?;
    markers.all(|marker| marker == first).then_some(first)
}

async fn reconcile_pending(
    db: &DatabaseConnection,
    surface: &dyn NotificationSurface,
    pending: &PendingRegistry,
    wager: &wager::Model,
    now: DateTime<Utc>,
    report: &mut ReconciliationReport,
) -> Result<()> {
    if ledger_row(db, wager).await?.is_none() {
        unit_record::ActiveModel {
            guild_id: Set(wager.guild_id.clone()),
            serial: Set(Some(wager.serial)),
            user_id: Set(Some(wager.user_id.clone())),
            units: Set(0.0),
            total: Set(None),
            timestamp: Set(wager.created_at),
            ..Default::default()
        }
        .insert(db)
        .await?;
        report.placeholders_created += 1;
    }

    let Some(entry) = PendingWager::from_model(wager) else {
        return Ok(());
    };
    let message = entry.message_ref();
    let reactions = surface.outcome_reactions(&message).await?;

    let marker = owner_marker(&reactions, &wager.user_id);
    if marker.is_none() && reactions.iter().any(|r| r.user_id == wager.user_id) {
        warn!(serial = wager.serial, "Bettor left both outcome markers, keeping wager pending");
    }

    if let Some(marker) = marker {
        match apply_settlement(db, wager.serial, marker.outcome(), &wager.user_id, now).await? {
            SettleResult::Applied(settlement) => {
                info!(serial = wager.serial, outcome = settlement.outcome.label(), "Settled wager resolved while offline");
                finalize_notification(surface, &message, &settlement).await;
                report.settled_offline += 1;
            }
            SettleResult::AlreadyResolved => {}
        }
        return Ok(());
    }

    pending.insert(entry).await;
    report.registered_pending += 1;
    Ok(())
}

/// Writes the settlement delta for a settled wager whose ledger row is
/// missing or still holds the zero placeholder. Returns whether a row was
/// written.
async fn repair_settled_ledger(db: &DatabaseConnection, wager: &wager::Model) -> Result<bool> {
    let outcome = match wager.state() {
        WagerState::Won => Outcome::Won,
        WagerState::Lost => Outcome::Lost,
        WagerState::Pending => return Ok(false),
    };

    let txn = db.begin().await?;
    let needs_repair = match ledger_row(&txn, wager).await? {
        None => true,
        Some(row) => row.units == 0.0,
    };
    if !needs_repair {
        txn.rollback().await?;
        return Ok(false);
    }

    let delta = settlement_delta(outcome, wager.stake, wager.units);
    let at = wager.resolved_at.unwrap_or(wager.created_at);
    write_ledger_effect(&txn, wager, delta, at).await?;
    txn.commit().await?;

    info!(serial = wager.serial, delta, "Repaired ledger for settled wager");
    Ok(true)
}
