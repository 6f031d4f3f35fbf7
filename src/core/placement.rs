//! Wager placement and cancellation
//!
//! Placement turns a confirmed bet slip into a posted card plus a pending
//! wager with its zero ledger placeholder. The card is posted first so its
//! message id can be stored; if the database write then fails the card is
//! deleted again, so a failed confirm leaves nothing behind.

use super::odds::{Stake, format_units};
use super::paths::LegFields;
use super::resolver::PreviewArt;
use super::serial::SerialGenerator;
use super::session::SharedDraft;
use super::settlement::{PendingRegistry, PendingWager};
use super::surface::{MessageRef, NotificationSurface, PosterIdentity, WagerCard};
use crate::entities::{Capper, UnitRecord, Wager, capper, unit_record, wager};
use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ConnectionTrait, QuerySelect, Set, TransactionTrait, prelude::*};
use tracing::{error, info, instrument, warn};

/// Fully-formed bet slip, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct WagerDraft {
    pub guild_id: String,
    pub user_id: String,
    pub league: String,
    pub bet_type: String,
    pub path: String,
    pub leg: LegFields,
    pub summary: String,
    pub units: u8,
    pub stake: Stake,
    pub channel_id: String,
    pub art: PreviewArt,
}

impl WagerDraft {
    #[must_use]
    pub fn card(&self, serial: i64, notify_role_id: Option<String>) -> WagerCard {
        WagerCard {
            serial,
            league: self.league.clone(),
            summary: self.summary.clone(),
            units: self.units,
            stake: self.stake,
            entity_image: self.art.entity_image.clone(),
            league_image: self.art.league_image.clone(),
            notify_role_id,
        }
    }
}

/// Inserts the pending wager and its zero ledger row in one transaction and
/// records the bettor's card identity.
#[instrument(skip(db, draft, poster), fields(guild_id = %draft.guild_id))]
pub async fn place_wager(
    db: &DatabaseConnection,
    serial: i64,
    draft: &WagerDraft,
    message: &MessageRef,
    poster: &PosterIdentity,
    notify_role_id: Option<String>,
    now: DateTime<Utc>,
) -> Result<wager::Model> {
    let txn = db.begin().await?;

    let wager = wager::ActiveModel {
        serial: Set(serial),
        guild_id: Set(draft.guild_id.clone()),
        user_id: Set(draft.user_id.clone()),
        league: Set(draft.league.clone()),
        bet_type: Set(draft.bet_type.clone()),
        path: Set(draft.path.clone()),
        subject: Set(draft.leg.subject.clone()),
        opponent: Set(draft.leg.opponent.clone()),
        line: Set(draft.leg.line.clone()),
        odds: Set(draft.leg.odds.map(super::odds::Odds::value)),
        prop: Set(draft.leg.prop.clone()),
        summary: Set(draft.summary.clone()),
        units: Set(i32::from(draft.units)),
        stake: Set(draft.stake.amount),
        channel_id: Set(message.channel_id.clone()),
        message_id: Set(Some(message.message_id.clone())),
        notify_role_id: Set(notify_role_id),
        won: Set(false),
        loss: Set(false),
        resolved_by: Set(None),
        resolved_at: Set(None),
        created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    unit_record::ActiveModel {
        guild_id: Set(draft.guild_id.clone()),
        serial: Set(Some(serial)),
        user_id: Set(Some(draft.user_id.clone())),
        units: Set(0.0),
        total: Set(None),
        timestamp: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    upsert_capper_identity(&txn, &draft.guild_id, &draft.user_id, poster).await?;

    txn.commit().await?;
    Ok(wager)
}

async fn upsert_capper_identity<C: ConnectionTrait>(
    db: &C,
    guild_id: &str,
    user_id: &str,
    poster: &PosterIdentity,
) -> Result<()> {
    let updated = Capper::update_many()
        .col_expr(capper::Column::DisplayName, Expr::value(poster.display_name.as_str()))
        .col_expr(capper::Column::AvatarUrl, Expr::value(poster.avatar_url.clone()))
        .filter(capper::Column::GuildId.eq(guild_id))
        .filter(capper::Column::UserId.eq(user_id))
        .exec(db)
        .await?;

    if updated.rows_affected == 0 {
        capper::ActiveModel {
            guild_id: Set(guild_id.to_string()),
            user_id: Set(user_id.to_string()),
            display_name: Set(poster.display_name.clone()),
            avatar_url: Set(poster.avatar_url.clone()),
            wins: Set(0),
            losses: Set(0),
            yearly_total: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

/// Posts the card and persists the wager; deletes the card again if the
/// write fails. On success the wager is registered as pending.
pub async fn confirm_wager(
    db: &DatabaseConnection,
    surface: &dyn NotificationSurface,
    pending: &PendingRegistry,
    serials: &SerialGenerator,
    draft: &WagerDraft,
    poster: &PosterIdentity,
    notify_role_id: Option<String>,
) -> Result<wager::Model> {
    let now = Utc::now();
    let serial = serials.next(now);
    let card = draft.card(serial, notify_role_id.clone());

    let message = surface
        .post_notification(&draft.channel_id, &card, poster)
        .await?;

    match place_wager(db, serial, draft, &message, poster, notify_role_id, now).await {
        Ok(wager) => {
            if let Some(entry) = PendingWager::from_model(&wager) {
                pending.insert(entry).await;
            }
            info!(
                serial,
                guild_id = %wager.guild_id,
                user_id = %wager.user_id,
                stake = %format_units(wager.stake),
                "Wager placed"
            );
            Ok(wager)
        }
        Err(e) => {
            error!(serial, error = %e, "Failed to persist wager, removing its card");
            if let Err(delete_err) = surface.delete_notification(&message).await {
                error!(
                    serial,
                    message_id = %message.message_id,
                    error = %delete_err,
                    "Failed to delete orphaned card"
                );
            }
            Err(e)
        }
    }
}

/// Confirms an in-progress slip.
///
/// The draft is locked only to read the finished slip and to mark it
/// confirmed; posting and persisting run with the lock released.
pub async fn confirm_slip(
    db: &DatabaseConnection,
    surface: &dyn NotificationSurface,
    pending: &PendingRegistry,
    serials: &SerialGenerator,
    draft: &SharedDraft,
    poster: &PosterIdentity,
    notify_role_id: Option<String>,
) -> Result<wager::Model> {
    let slip = draft.lock().await.finalize()?;
    let wager =
        confirm_wager(db, surface, pending, serials, &slip, poster, notify_role_id).await?;

    // The wager exists now even if the slip expired meanwhile
    if let Err(e) = draft.lock().await.mark_confirmed() {
        warn!(serial = wager.serial, error = %e, "Slip closed before confirmation");
    }
    Ok(wager)
}

/// Deletes a pending wager and its ledger placeholder. Counters are left
/// alone since a pending wager never touched them.
#[instrument(skip(db))]
pub async fn cancel_wager(
    db: &DatabaseConnection,
    guild_id: &str,
    serial: i64,
    actor_id: &str,
    is_admin: bool,
) -> Result<wager::Model> {
    let txn = db.begin().await?;

    let wager = Wager::find_by_id(serial)
        .filter(wager::Column::GuildId.eq(guild_id))
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or(Error::WagerNotFound { serial })?;

    if !wager.is_pending() {
        txn.rollback().await?;
        return Err(Error::AlreadyResolved { serial });
    }
    if wager.user_id != actor_id && !is_admin {
        txn.rollback().await?;
        return Err(Error::NotWagerOwner {
            serial,
            user_id: actor_id.to_string(),
        });
    }

    // Ledger first: it references the wager
    UnitRecord::delete_many()
        .filter(unit_record::Column::Serial.eq(serial))
        .exec(&txn)
        .await?;

    let deleted = Wager::delete_many()
        .filter(wager::Column::Serial.eq(serial))
        .filter(wager::Column::Won.eq(false))
        .filter(wager::Column::Loss.eq(false))
        .exec(&txn)
        .await?;

    if deleted.rows_affected != 1 {
        txn.rollback().await?;
        return Err(Error::AlreadyResolved { serial });
    }

    txn.commit().await?;
    Ok(wager)
}

/// Cancels the wager, forgets its pending hint and removes its card.
pub async fn withdraw_wager(
    db: &DatabaseConnection,
    surface: &dyn NotificationSurface,
    pending: &PendingRegistry,
    guild_id: &str,
    serial: i64,
    actor_id: &str,
    is_admin: bool,
) -> Result<wager::Model> {
    let wager = cancel_wager(db, guild_id, serial, actor_id, is_admin).await?;
    pending.remove_serial(serial).await;

    if let Some(message_id) = wager.message_id.clone() {
        let message = MessageRef {
            channel_id: wager.channel_id.clone(),
            message_id,
        };
        if let Err(e) = surface.delete_notification(&message).await {
            warn!(serial, error = %e, "Failed to delete card of cancelled wager");
        }
    }

    info!(serial, guild_id, actor_id, "Wager cancelled");
    Ok(wager)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::odds::{Odds, compute_stake};
    use crate::core::draft::{BetDraft, DraftStage};
    use crate::core::resolver::EntityResolver;
    use crate::core::settlement::{Outcome, apply_settlement};
    use crate::core::surface::ChannelCapability;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use crate::test_utils::{FakeSurface, place_test_wager, setup_test_db, test_draft};

    fn poster() -> PosterIdentity {
        PosterIdentity {
            display_name: "Sharp Sam".to_string(),
            avatar_url: None,
        }
    }

    async fn ready_slip() -> SharedDraft {
        let mut slip = BetDraft::new("u1", "g1");
        slip.select_league("NFL").unwrap();
        slip.select_bet_type("standard").unwrap();
        slip.select_path("moneyline").unwrap();
        let values = [("subject", "eagles"), ("opponent", "dallas"), ("odds", "-110")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        slip.collect_fields(values, &EntityResolver::new("placeholder"))
            .await
            .unwrap();
        slip.select_units(2, 1, 5).unwrap();
        let capable = ChannelCapability {
            embed_links: true,
            manage_webhooks: true,
        };
        slip.select_channel("c1", &["c1".to_string()], capable)
            .unwrap();
        Arc::new(Mutex::new(slip))
    }

    #[tokio::test]
    async fn test_confirm_slip_posts_with_draft_unlocked() {
        let db = setup_test_db().await.unwrap();
        let surface = FakeSurface::new();
        let pending = PendingRegistry::new();
        let serials = SerialGenerator::new();
        let draft = ready_slip().await;
        surface.watch_draft(Arc::clone(&draft)).await;

        let wager = confirm_slip(&db, &surface, &pending, &serials, &draft, &poster(), None)
            .await
            .unwrap();

        assert_eq!(surface.draft_free_on_post().await, vec![true]);
        assert_eq!(draft.lock().await.stage(), DraftStage::Confirmed);
        assert!(wager.is_pending());
        assert_eq!(wager.stake, 2.2);
    }

    #[tokio::test]
    async fn test_confirm_slip_rejects_unfinished_draft() {
        let db = setup_test_db().await.unwrap();
        let surface = FakeSurface::new();
        let draft: SharedDraft = Arc::new(Mutex::new(BetDraft::new("u1", "g1")));

        let result = confirm_slip(
            &db,
            &surface,
            &PendingRegistry::new(),
            &SerialGenerator::new(),
            &draft,
            &poster(),
            None,
        )
        .await;

        assert!(matches!(result, Err(Error::DraftNotReady { .. })));
        assert!(surface.posted().await.is_empty());
    }

    #[tokio::test]
    async fn test_confirm_persists_pending_wager_and_placeholder() {
        let db = setup_test_db().await.unwrap();
        let surface = FakeSurface::new();
        let pending = PendingRegistry::new();
        let serials = SerialGenerator::new();
        let draft = test_draft("u1", 2, Odds::from_value(-110));
        assert_eq!(draft.stake, compute_stake(Odds::from_value(-110), 2));

        let wager = confirm_wager(&db, &surface, &pending, &serials, &draft, &poster(), None)
            .await
            .unwrap();

        assert!(wager.is_pending());
        assert_eq!(wager.stake, 2.2);
        let ledger = UnitRecord::find()
            .filter(unit_record::Column::Serial.eq(wager.serial))
            .all(&db)
            .await
            .unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].units, 0.0);

        let capper = Capper::find().one(&db).await.unwrap().unwrap();
        assert_eq!(capper.display_name, "Sharp Sam");
        assert_eq!((capper.wins, capper.losses), (0, 0));

        assert_eq!(surface.posted().await.len(), 1);
        assert!(pending.get(wager.message_id.as_deref().unwrap()).await.is_some());
    }

    #[tokio::test]
    async fn test_failed_persist_deletes_posted_card() {
        let db = setup_test_db().await.unwrap();
        let surface = FakeSurface::new();
        let pending = PendingRegistry::new();
        let serials = SerialGenerator::new();
        let draft = test_draft("u1", 1, None);

        // Posting the same message id twice trips the unique constraint
        surface.repeat_message_ids().await;
        confirm_wager(&db, &surface, &pending, &serials, &draft, &poster(), None)
            .await
            .unwrap();
        let result =
            confirm_wager(&db, &surface, &pending, &serials, &draft, &poster(), None).await;

        assert!(matches!(result, Err(Error::Database(_))));
        assert_eq!(surface.deleted().await.len(), 1);
        assert_eq!(Wager::find().all(&db).await.unwrap().len(), 1);
        assert_eq!(UnitRecord::find().all(&db).await.unwrap().len(), 1);
        assert_eq!(pending.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_post_writes_nothing() {
        let db = setup_test_db().await.unwrap();
        let surface = FakeSurface::new();
        surface.fail_posts().await;
        let pending = PendingRegistry::new();

        let result = confirm_wager(
            &db,
            &surface,
            &pending,
            &SerialGenerator::new(),
            &test_draft("u1", 1, None),
            &poster(),
            None,
        )
        .await;

        assert!(matches!(result, Err(Error::MissingPermission { .. })));
        assert!(Wager::find().all(&db).await.unwrap().is_empty());
        assert!(pending.is_empty().await);
    }

    #[tokio::test]
    async fn test_cancel_removes_wager_and_placeholder() {
        let db = setup_test_db().await.unwrap();
        let wager = place_test_wager(&db, "u1", 2, None).await.unwrap();

        cancel_wager(&db, &wager.guild_id, wager.serial, "u1", false)
            .await
            .unwrap();

        assert!(Wager::find_by_id(wager.serial).one(&db).await.unwrap().is_none());
        assert!(UnitRecord::find().all(&db).await.unwrap().is_empty());
        let capper = Capper::find().one(&db).await.unwrap().unwrap();
        assert_eq!((capper.wins, capper.losses), (0, 0));
    }

    #[tokio::test]
    async fn test_cancel_requires_owner_or_admin() {
        let db = setup_test_db().await.unwrap();
        let wager = place_test_wager(&db, "u1", 1, None).await.unwrap();

        let result = cancel_wager(&db, &wager.guild_id, wager.serial, "u2", false).await;
        assert!(matches!(result, Err(Error::NotWagerOwner { .. })));
        assert!(Wager::find_by_id(wager.serial).one(&db).await.unwrap().is_some());

        cancel_wager(&db, &wager.guild_id, wager.serial, "admin", true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_rejects_settled_wager() {
        let db = setup_test_db().await.unwrap();
        let wager = place_test_wager(&db, "u1", 1, None).await.unwrap();
        apply_settlement(&db, wager.serial, Outcome::Won, "u1", Utc::now())
            .await
            .unwrap();

        let result = cancel_wager(&db, &wager.guild_id, wager.serial, "u1", false).await;
        assert!(matches!(result, Err(Error::AlreadyResolved { .. })));
    }

    #[tokio::test]
    async fn test_withdraw_clears_pending_and_card() {
        let db = setup_test_db().await.unwrap();
        let surface = FakeSurface::new();
        let pending = PendingRegistry::new();
        let wager = place_test_wager(&db, "u1", 1, None).await.unwrap();
        pending
            .insert(PendingWager::from_model(&wager).unwrap())
            .await;

        withdraw_wager(&db, &surface, &pending, &wager.guild_id, wager.serial, "u1", false)
            .await
            .unwrap();

        assert!(pending.is_empty().await);
        assert_eq!(surface.deleted().await.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_unknown_serial() {
        let db = setup_test_db().await.unwrap();
        let result = cancel_wager(&db, "g1", 42, "u1", false).await;
        assert!(matches!(result, Err(Error::WagerNotFound { serial: 42 })));
    }
}
