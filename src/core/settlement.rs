//! Settlement engine
//!
//! Applies a resolution signal (an outcome reaction on a posted card) to
//! exactly one pending wager, exactly once. The database row is the
//! authority: every settlement runs in one transaction that locks the wager,
//! flips its flags through a guarded conditional update, bumps the capper's
//! counter and writes the ledger effect. Concurrent or replayed signals for a
//! settled wager see zero affected rows and roll back.
//!
//! The in-memory [`PendingRegistry`] only maps card message ids to wagers so
//! reactions on unrelated messages can be dropped without a query.

use super::odds::round_units;
use super::surface::{CardResolution, MessageRef, NotificationSurface};
use crate::config::settings::MarkerConfig;
use crate::entities::{Capper, UnitRecord, Wager, capper, unit_record, wager};
use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, QuerySelect, Set, TransactionTrait, prelude::*,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

/// Terminal state of a settled wager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won,
    Lost,
}

impl Outcome {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Won => "Won",
            Self::Lost => "Lost",
        }
    }
}

/// Reaction marker a bettor uses to report an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeMarker {
    Positive,
    Negative,
}

impl OutcomeMarker {
    #[must_use]
    pub const fn outcome(self) -> Outcome {
        match self {
            Self::Positive => Outcome::Won,
            Self::Negative => Outcome::Lost,
        }
    }

    /// Maps a reaction emoji to a marker; any other emoji is not a marker.
    #[must_use]
    pub fn from_emoji(emoji: &str, markers: &MarkerConfig) -> Option<Self> {
        if emoji == markers.positive {
            Some(Self::Positive)
        } else if emoji == markers.negative {
            Some(Self::Negative)
        } else {
            None
        }
    }

    #[must_use]
    pub fn emoji(self, markers: &MarkerConfig) -> &str {
        match self {
            Self::Positive => &markers.positive,
            Self::Negative => &markers.negative,
        }
    }
}

/// One reaction event, already translated off the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionSignal {
    pub guild_id: String,
    pub channel_id: String,
    pub message_id: String,
    pub marker: OutcomeMarker,
    pub acting_user_id: String,
}

/// Lookup hint for a wager awaiting its outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWager {
    pub serial: i64,
    pub guild_id: String,
    pub user_id: String,
    pub channel_id: String,
    pub message_id: String,
}

impl PendingWager {
    /// `None` for wagers whose card was never recorded.
    #[must_use]
    pub fn from_model(model: &wager::Model) -> Option<Self> {
        Some(Self {
            serial: model.serial,
            guild_id: model.guild_id.clone(),
            user_id: model.user_id.clone(),
            channel_id: model.channel_id.clone(),
            message_id: model.message_id.clone()?,
        })
    }

    #[must_use]
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            channel_id: self.channel_id.clone(),
            message_id: self.message_id.clone(),
        }
    }
}

/// Pending wagers keyed by card message id.
#[derive(Debug, Clone, Default)]
pub struct PendingRegistry {
    inner: Arc<RwLock<HashMap<String, PendingWager>>>,
}

impl PendingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, pending: PendingWager) {
        self.inner
            .write()
            .await
            .insert(pending.message_id.clone(), pending);
    }

    pub async fn remove(&self, message_id: &str) -> Option<PendingWager> {
        self.inner.write().await.remove(message_id)
    }

    /// Removes the entry for `serial`, wherever its card lives.
    pub async fn remove_serial(&self, serial: i64) -> Option<PendingWager> {
        let mut inner = self.inner.write().await;
        let message_id = inner
            .values()
            .find(|pending| pending.serial == serial)
            .map(|pending| pending.message_id.clone())?;
        inner.remove(&message_id)
    }

    pub async fn get(&self, message_id: &str) -> Option<PendingWager> {
        self.inner.read().await.get(message_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

/// Ledger effect of a settlement: a win pays the stake, a loss always costs
/// the units risked whatever the odds were.
#[must_use]
pub fn settlement_delta(outcome: Outcome, stake: f64, units: i32) -> f64 {
    match outcome {
        Outcome::Won => round_units(stake),
        Outcome::Lost => -f64::from(units),
    }
}

/// A committed settlement.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub serial: i64,
    pub guild_id: String,
    pub user_id: String,
    pub outcome: Outcome,
    pub delta: f64,
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettleResult {
    Applied(Settlement),
    AlreadyResolved,
}

/// Settles wager `serial` in one transaction.
///
/// Nothing is written unless the wager is still pending when the guarded
/// update runs; a wager that is already won or lost yields
/// [`SettleResult::AlreadyResolved`] with no ledger effect. Any failure rolls
/// the whole transaction back and leaves the wager pending.
#[instrument(skip(db), fields(serial))]
pub async fn apply_settlement(
    db: &DatabaseConnection,
    serial: i64,
    outcome: Outcome,
    resolved_by: &str,
    now: DateTime<Utc>,
) -> Result<SettleResult> {
    let txn = db.begin().await?;

    let wager = Wager::find_by_id(serial)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or(Error::WagerNotFound { serial })?;

    if !wager.is_pending() {
        txn.rollback().await?;
        return Ok(SettleResult::AlreadyResolved);
    }

    let updated = Wager::update_many()
        .col_expr(wager::Column::Won, Expr::value(outcome == Outcome::Won))
        .col_expr(wager::Column::Loss, Expr::value(outcome == Outcome::Lost))
        .col_expr(wager::Column::ResolvedBy, Expr::value(resolved_by))
        .col_expr(wager::Column::ResolvedAt, Expr::value(now))
        .filter(wager::Column::Serial.eq(serial))
        .filter(wager::Column::Won.eq(false))
        .filter(wager::Column::Loss.eq(false))
        .exec(&txn)
        .await?;

    if updated.rows_affected != 1 {
        txn.rollback().await?;
        return Ok(SettleResult::AlreadyResolved);
    }

    let delta = settlement_delta(outcome, wager.stake, wager.units);
    bump_capper(&txn, &wager, outcome).await?;
    write_ledger_effect(&txn, &wager, delta, now).await?;

    txn.commit().await?;

    Ok(SettleResult::Applied(Settlement {
        serial,
        guild_id: wager.guild_id,
        user_id: wager.user_id,
        outcome,
        delta,
        resolved_by: resolved_by.to_string(),
        resolved_at: now,
    }))
}

async fn bump_capper<C: ConnectionTrait>(db: &C, wager: &wager::Model, outcome: Outcome) -> Result<()> {
    let column = match outcome {
        Outcome::Won => capper::Column::Wins,
        Outcome::Lost => capper::Column::Losses,
    };

    let updated = Capper::update_many()
        .col_expr(column, Expr::col(column).add(1))
        .filter(capper::Column::GuildId.eq(&wager.guild_id))
        .filter(capper::Column::UserId.eq(&wager.user_id))
        .exec(db)
        .await?;

    if updated.rows_affected == 0 {
        capper::ActiveModel {
            guild_id: Set(wager.guild_id.clone()),
            user_id: Set(wager.user_id.clone()),
            display_name: Set(wager.user_id.clone()),
            avatar_url: Set(None),
            wins: Set(i32::from(outcome == Outcome::Won)),
            losses: Set(i32::from(outcome == Outcome::Lost)),
            yearly_total: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

/// Overwrites (or creates) the wager's ledger row with `delta`, stamped at
/// the settlement time.
pub(crate) async fn write_ledger_effect<C: ConnectionTrait>(
    db: &C,
    wager: &wager::Model,
    delta: f64,
    at: DateTime<Utc>,
) -> Result<()> {
    let updated = UnitRecord::update_many()
        .col_expr(unit_record::Column::Units, Expr::value(delta))
        .col_expr(unit_record::Column::Timestamp, Expr::value(at))
        .filter(unit_record::Column::GuildId.eq(&wager.guild_id))
        .filter(unit_record::Column::Serial.eq(wager.serial))
        .filter(unit_record::Column::UserId.eq(&wager.user_id))
        .exec(db)
        .await?;

    if updated.rows_affected == 0 {
        unit_record::ActiveModel {
            guild_id: Set(wager.guild_id.clone()),
            serial: Set(Some(wager.serial)),
            user_id: Set(Some(wager.user_id.clone())),
            units: Set(delta),
            total: Set(None),
            timestamp: Set(at),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

/// Recolours the card and strips its reactions. Failures are logged only;
/// the ledger already holds the truth.
pub async fn finalize_notification(
    surface: &dyn NotificationSurface,
    message: &MessageRef,
    settlement: &Settlement,
) {
    let resolution = CardResolution {
        outcome: settlement.outcome,
        resolved_by: settlement.resolved_by.clone(),
        delta: settlement.delta,
    };

    if let Err(e) = surface.update_notification(message, &resolution).await {
        warn!(serial = settlement.serial, error = %e, "Failed to update settled card");
    }
    if let Err(e) = surface.strip_reactions(message).await {
        warn!(serial = settlement.serial, error = %e, "Failed to strip reactions from settled card");
    }
}

/// What happened to one signal.
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    /// Not a pending card
    Ignored,
    /// Someone other than the bettor reacted
    Unauthorized { removed: bool },
    AlreadyResolved,
    Settled(Settlement),
}

/// Drains resolution signals and settles wagers.
pub struct SettlementEngine {
    db: DatabaseConnection,
    pending: PendingRegistry,
    surface: Arc<dyn NotificationSurface>,
}

impl SettlementEngine {
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        pending: PendingRegistry,
        surface: Arc<dyn NotificationSurface>,
    ) -> Self {
        Self {
            db,
            pending,
            surface,
        }
    }

    #[must_use]
    pub const fn pending(&self) -> &PendingRegistry {
        &self.pending
    }

    /// Handles one signal end to end.
    ///
    /// Database failures are returned to the caller and never retried here;
    /// the wager stays pending and the next reconciliation pass picks it up.
    pub async fn handle_signal(&self, signal: &ResolutionSignal) -> Result<SettlementOutcome> {
        let Some(pending) = self.pending.get(&signal.message_id).await else {
            return Ok(SettlementOutcome::Ignored);
        };
        if pending.guild_id != signal.guild_id {
            return Ok(SettlementOutcome::Ignored);
        }

        let message = pending.message_ref();

        if signal.acting_user_id != pending.user_id {
            let removed = match self
                .surface
                .remove_reaction(&message, &signal.acting_user_id, signal.marker)
                .await
            {
                Ok(()) => true,
                Err(e) => {
                    debug!(serial = pending.serial, error = %e, "Could not remove stray reaction");
                    false
                }
            };
            return Ok(SettlementOutcome::Unauthorized { removed });
        }

        let result = apply_settlement(
            &self.db,
            pending.serial,
            signal.marker.outcome(),
            &signal.acting_user_id,
            Utc::now(),
        )
        .await?;

        self.pending.remove(&signal.message_id).await;

        match result {
            SettleResult::AlreadyResolved => Ok(SettlementOutcome::AlreadyResolved),
            SettleResult::Applied(settlement) => {
                info!(
                    serial = settlement.serial,
                    guild_id = %settlement.guild_id,
                    outcome = settlement.outcome.label(),
                    delta = settlement.delta,
                    "Wager settled"
                );
                finalize_notification(self.surface.as_ref(), &message, &settlement).await;
                Ok(SettlementOutcome::Settled(settlement))
            }
        }
    }

    /// Processes signals until every sender is dropped, one task per signal.
    pub async fn run(self: Arc<Self>, mut signals: mpsc::Receiver<ResolutionSignal>) {
        let mut tasks = JoinSet::new();

        while let Some(signal) = signals.recv().await {
            let engine = Arc::clone(&self);
            tasks.spawn(async move {
                if let Err(e) = engine.handle_signal(&signal).await {
                    error!(
                        message_id = %signal.message_id,
                        guild_id = %signal.guild_id,
                        error = %e,
                        "Dropped resolution signal"
                    );
                }
            });

            // Reap finished tasks so the set doesn't grow unbounded
            while tasks.try_join_next().is_some() {}
        }

        while tasks.join_next().await.is_some() {}
        info!("Settlement engine stopped");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::entities::WagerState;
    use crate::test_utils::{FakeSurface, place_test_wager, setup_test_db};

    fn signal(wager: &wager::Model, user_id: &str, marker: OutcomeMarker) -> ResolutionSignal {
        ResolutionSignal {
            guild_id: wager.guild_id.clone(),
            channel_id: wager.channel_id.clone(),
            message_id: wager.message_id.clone().unwrap(),
            marker,
            acting_user_id: user_id.to_string(),
        }
    }

    async fn engine_with(
        db: &DatabaseConnection,
        wagers: &[&wager::Model],
    ) -> (Arc<SettlementEngine>, Arc<FakeSurface>) {
        let surface = Arc::new(FakeSurface::new());
        let pending = PendingRegistry::new();
        for wager in wagers {
            pending.insert(PendingWager::from_model(wager).unwrap()).await;
        }
        let engine = SettlementEngine::new(db.clone(), pending, surface.clone());
        (Arc::new(engine), surface)
    }

    async fn ledger_units(db: &DatabaseConnection, serial: i64) -> f64 {
        UnitRecord::find()
            .filter(unit_record::Column::Serial.eq(serial))
            .one(db)
            .await
            .unwrap()
            .unwrap()
            .units
    }

    async fn capper_record(db: &DatabaseConnection, user_id: &str) -> (i32, i32) {
        let capper = Capper::find()
            .filter(capper::Column::UserId.eq(user_id))
            .one(db)
            .await
            .unwrap()
            .unwrap();
        (capper.wins, capper.losses)
    }

    #[test]
    fn test_settlement_delta_is_asymmetric() {
        assert_eq!(settlement_delta(Outcome::Won, 2.2, 2), 2.2);
        assert_eq!(settlement_delta(Outcome::Lost, 2.2, 2), -2.0);
        assert_eq!(settlement_delta(Outcome::Lost, 1.0, 3), -3.0);
    }

    #[test]
    fn test_marker_from_emoji() {
        let markers = MarkerConfig::default();
        assert_eq!(
            OutcomeMarker::from_emoji(&markers.positive, &markers),
            Some(OutcomeMarker::Positive)
        );
        assert_eq!(OutcomeMarker::from_emoji("🔥", &markers), None);
    }

    #[tokio::test]
    async fn test_owner_win_settles_wager() {
        let db = setup_test_db().await.unwrap();
        let wager = place_test_wager(&db, "u1", 2, Some(-110)).await.unwrap();
        let (engine, surface) = engine_with(&db, &[&wager]).await;

        let outcome = engine
            .handle_signal(&signal(&wager, "u1", OutcomeMarker::Positive))
            .await
            .unwrap();
        assert!(matches!(outcome, SettlementOutcome::Settled(ref s) if s.delta == 2.2));

        let stored = Wager::find_by_id(wager.serial).one(&db).await.unwrap().unwrap();
        assert_eq!(stored.state(), WagerState::Won);
        assert_eq!(stored.resolved_by.as_deref(), Some("u1"));
        assert_eq!(ledger_units(&db, wager.serial).await, 2.2);
        assert_eq!(capper_record(&db, "u1").await, (1, 0));

        assert!(engine.pending().is_empty().await);
        assert_eq!(surface.updated().await.len(), 1);
        assert_eq!(surface.stripped().await.len(), 1);
    }

    #[tokio::test]
    async fn test_loss_costs_units_regardless_of_odds() {
        let db = setup_test_db().await.unwrap();
        let wager = place_test_wager(&db, "u1", 2, Some(-150)).await.unwrap();
        assert_eq!(wager.stake, 3.0);

        let result = apply_settlement(&db, wager.serial, Outcome::Lost, "u1", Utc::now())
            .await
            .unwrap();
        assert!(matches!(result, SettleResult::Applied(ref s) if s.delta == -2.0));
        assert_eq!(ledger_units(&db, wager.serial).await, -2.0);
        assert_eq!(capper_record(&db, "u1").await, (0, 1));
    }

    #[tokio::test]
    async fn test_replayed_settlement_is_noop() {
        let db = setup_test_db().await.unwrap();
        let wager = place_test_wager(&db, "u1", 1, Some(150)).await.unwrap();

        apply_settlement(&db, wager.serial, Outcome::Won, "u1", Utc::now())
            .await
            .unwrap();
        let replay = apply_settlement(&db, wager.serial, Outcome::Lost, "u1", Utc::now())
            .await
            .unwrap();

        assert_eq!(replay, SettleResult::AlreadyResolved);
        let stored = Wager::find_by_id(wager.serial).one(&db).await.unwrap().unwrap();
        assert_eq!(stored.state(), WagerState::Won);
        assert_eq!(ledger_units(&db, wager.serial).await, 1.0);
        assert_eq!(capper_record(&db, "u1").await, (1, 0));
    }

    #[tokio::test]
    async fn test_concurrent_signals_apply_exactly_once() {
        let db = setup_test_db().await.unwrap();
        let wager = place_test_wager(&db, "u1", 2, Some(-110)).await.unwrap();
        let (engine, _surface) = engine_with(&db, &[&wager]).await;

        let mut tasks = JoinSet::new();
        for i in 0..8 {
            let engine = Arc::clone(&engine);
            let marker = if i % 3 == 0 {
                OutcomeMarker::Negative
            } else {
                OutcomeMarker::Positive
            };
            let signal = signal(&wager, "u1", marker);
            tasks.spawn(async move { engine.handle_signal(&signal).await });
        }

        let mut settled = 0;
        while let Some(result) = tasks.join_next().await {
            if matches!(result.unwrap().unwrap(), SettlementOutcome::Settled(_)) {
                settled += 1;
            }
        }
        assert_eq!(settled, 1);

        let stored = Wager::find_by_id(wager.serial).one(&db).await.unwrap().unwrap();
        assert!(stored.won ^ stored.loss);
        let (wins, losses) = capper_record(&db, "u1").await;
        assert_eq!(wins + losses, 1);
        let units = ledger_units(&db, wager.serial).await;
        assert!(units == 2.2 || units == -2.0);
    }

    #[tokio::test]
    async fn test_stray_reaction_is_removed_without_state_change() {
        let db = setup_test_db().await.unwrap();
        let wager = place_test_wager(&db, "u1", 2, Some(-110)).await.unwrap();
        let (engine, surface) = engine_with(&db, &[&wager]).await;

        let outcome = engine
            .handle_signal(&signal(&wager, "intruder", OutcomeMarker::Positive))
            .await
            .unwrap();
        assert_eq!(outcome, SettlementOutcome::Unauthorized { removed: true });
        assert_eq!(surface.removed_reactions().await.len(), 1);

        let stored = Wager::find_by_id(wager.serial).one(&db).await.unwrap().unwrap();
        assert!(stored.is_pending());
        assert_eq!(ledger_units(&db, wager.serial).await, 0.0);
        assert_eq!(engine.pending().len().await, 1);
    }

    #[tokio::test]
    async fn test_stray_reaction_without_permission_is_ignored() {
        let db = setup_test_db().await.unwrap();
        let wager = place_test_wager(&db, "u1", 1, None).await.unwrap();
        let (engine, surface) = engine_with(&db, &[&wager]).await;
        surface.deny_reaction_removal().await;

        let outcome = engine
            .handle_signal(&signal(&wager, "intruder", OutcomeMarker::Negative))
            .await
            .unwrap();
        assert_eq!(outcome, SettlementOutcome::Unauthorized { removed: false });
    }

    #[tokio::test]
    async fn test_unknown_message_is_ignored() {
        let db = setup_test_db().await.unwrap();
        let wager = place_test_wager(&db, "u1", 1, None).await.unwrap();
        let (engine, _surface) = engine_with(&db, &[]).await;

        let outcome = engine
            .handle_signal(&signal(&wager, "u1", OutcomeMarker::Positive))
            .await
            .unwrap();
        assert_eq!(outcome, SettlementOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_card_update_failure_keeps_settlement() {
        let db = setup_test_db().await.unwrap();
        let wager = place_test_wager(&db, "u1", 1, Some(120)).await.unwrap();
        let (engine, surface) = engine_with(&db, &[&wager]).await;
        surface.fail_updates().await;

        let outcome = engine
            .handle_signal(&signal(&wager, "u1", OutcomeMarker::Positive))
            .await
            .unwrap();
        assert!(matches!(outcome, SettlementOutcome::Settled(_)));
        assert_eq!(ledger_units(&db, wager.serial).await, 1.0);
    }

    #[tokio::test]
    async fn test_run_drains_queue() {
        let db = setup_test_db().await.unwrap();
        let wager = place_test_wager(&db, "u1", 3, None).await.unwrap();
        let (engine, _surface) = engine_with(&db, &[&wager]).await;

        let (tx, rx) = mpsc::channel(8);
        tx.send(signal(&wager, "u1", OutcomeMarker::Negative))
            .await
            .unwrap();
        tx.send(signal(&wager, "u1", OutcomeMarker::Negative))
            .await
            .unwrap();
        drop(tx);
        Arc::clone(&engine).run(rx).await;

        assert_eq!(ledger_units(&db, wager.serial).await, -3.0);
        assert_eq!(capper_record(&db, "u1").await, (0, 1));
    }
}
