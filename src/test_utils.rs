//! Shared test utilities for the capper bot.
//!
//! This module provides an in-memory database, wager factories with sensible
//! defaults and [`FakeSurface`], a recording stand-in for Discord.

use crate::{
    core::{
        odds::{Odds, compute_stake},
        paths::LegFields,
        placement::{self, WagerDraft},
        resolver::PreviewArt,
        serial::SerialGenerator,
        session::SharedDraft,
        settlement::OutcomeMarker,
        surface::{
            CardResolution, ChannelCapability, MarkerReaction, MessageRef, NotificationSurface,
            PosterIdentity, SurfaceError, SurfaceResult, VoiceLabelSurface, WagerCard,
        },
    },
    entities::{self, SubscriptionTier},
    errors::Result,
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use tokio::sync::Mutex;

static TEST_SERIALS: SerialGenerator = SerialGenerator::new();

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Builds a confirmed moneyline slip.
///
/// # Defaults
/// * `guild_id`: `"g1"`
/// * `channel_id`: `"c1"`
/// * league `NFL`, Philadelphia Eagles over Dallas Cowboys
pub fn test_draft(user_id: &str, units: u8, odds: Option<Odds>) -> WagerDraft {
    let summary = match odds {
        Some(odds) => format!("Philadelphia Eagles ML vs Dallas Cowboys ({odds})"),
        None => "Philadelphia Eagles ML vs Dallas Cowboys".to_string(),
    };

    WagerDraft {
        guild_id: "g1".to_string(),
        user_id: user_id.to_string(),
        league: "NFL".to_string(),
        bet_type: "standard".to_string(),
        path: "moneyline".to_string(),
        leg: LegFields {
            subject: "Philadelphia Eagles".to_string(),
            opponent: Some("Dallas Cowboys".to_string()),
            line: None,
            odds,
            prop: None,
        },
        summary,
        units,
        stake: compute_stake(odds, units),
        channel_id: "c1".to_string(),
        art: PreviewArt {
            entity_image: "entity.png".to_string(),
            league_image: "league.png".to_string(),
        },
    }
}

/// Persists a pending wager (with its ledger placeholder) straight through
/// placement, skipping the card post. The message id is `msg-<serial>`.
pub async fn place_test_wager(
    db: &DatabaseConnection,
    user_id: &str,
    units: u8,
    odds: Option<i32>,
) -> Result<entities::wager::Model> {
    let draft = test_draft(user_id, units, odds.and_then(Odds::from_value));
    let now = Utc::now();
    let serial = TEST_SERIALS.next(now);
    let message = MessageRef {
        channel_id: draft.channel_id.clone(),
        message_id: format!("msg-{serial}"),
    };
    let poster = PosterIdentity {
        display_name: user_id.to_string(),
        avatar_url: None,
    };

    placement::place_wager(db, serial, &draft, &message, &poster, None, now).await
}

/// Puts a guild on `tier`.
pub async fn set_test_subscription(
    db: &DatabaseConnection,
    guild_id: &str,
    tier: SubscriptionTier,
) -> Result<()> {
    crate::core::guild::set_subscription_tier(db, guild_id, tier, Utc::now()).await
}

#[derive(Debug, Default)]
struct FakeState {
    next_message: u64,
    posted: Vec<(String, WagerCard)>,
    updated: Vec<(MessageRef, CardResolution)>,
    deleted: Vec<MessageRef>,
    stripped: Vec<MessageRef>,
    removed_reactions: Vec<(MessageRef, String, OutcomeMarker)>,
    reactions: HashMap<String, Vec<MarkerReaction>>,
    labels: HashMap<String, String>,
    renames: usize,
    capabilities: HashMap<String, ChannelCapability>,
    repeat_message_ids: bool,
    fail_posts: bool,
    fail_updates: bool,
    fail_reaction_reads: bool,
    deny_reaction_removal: bool,
    watched_draft: Option<SharedDraft>,
    draft_free_on_post: Vec<bool>,
}

/// Records every call and lets tests inject failures.
#[derive(Debug, Default)]
pub struct FakeSurface {
    state: Mutex<FakeState>,
}

impl FakeSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn posted(&self) -> Vec<(String, WagerCard)> {
        self.state.lock().await.posted.clone()
    }

    pub async fn updated(&self) -> Vec<(MessageRef, CardResolution)> {
        self.state.lock().await.updated.clone()
    }

    pub async fn deleted(&self) -> Vec<MessageRef> {
        self.state.lock().await.deleted.clone()
    }

    pub async fn stripped(&self) -> Vec<MessageRef> {
        self.state.lock().await.stripped.clone()
    }

    pub async fn removed_reactions(&self) -> Vec<(MessageRef, String, OutcomeMarker)> {
        self.state.lock().await.removed_reactions.clone()
    }

    pub async fn label(&self, channel_id: &str) -> Option<String> {
        self.state.lock().await.labels.get(channel_id).cloned()
    }

    pub async fn renames(&self) -> usize {
        self.state.lock().await.renames
    }

    pub async fn set_reactions(&self, message_id: &str, reactions: Vec<MarkerReaction>) {
        self.state
            .lock()
            .await
            .reactions
            .insert(message_id.to_string(), reactions);
    }

    pub async fn set_capability(&self, channel_id: &str, capability: ChannelCapability) {
        self.state
            .lock()
            .await
            .capabilities
            .insert(channel_id.to_string(), capability);
    }

    /// Every post returns the same message id.
    pub async fn repeat_message_ids(&self) {
        self.state.lock().await.repeat_message_ids = true;
    }

    pub async fn fail_posts(&self) {
        self.state.lock().await.fail_posts = true;
    }

    pub async fn fail_updates(&self) {
        self.state.lock().await.fail_updates = true;
    }

    pub async fn fail_reaction_reads(&self) {
        self.state.lock().await.fail_reaction_reads = true;
    }

    pub async fn deny_reaction_removal(&self) {
        self.state.lock().await.deny_reaction_removal = true;
    }

    /// Records, on every post, whether `draft` could be locked right then.
    pub async fn watch_draft(&self, draft: SharedDraft) {
        self.state.lock().await.watched_draft = Some(draft);
    }

    pub async fn draft_free_on_post(&self) -> Vec<bool> {
        self.state.lock().await.draft_free_on_post.clone()
    }
}

#[async_trait]
impl NotificationSurface for FakeSurface {
    async fn post_notification(
        &self,
        channel_id: &str,
        card: &WagerCard,
        _poster: &PosterIdentity,
    ) -> SurfaceResult<MessageRef> {
        let mut state = self.state.lock().await;
        if let Some(draft) = state.watched_draft.clone() {
            state.draft_free_on_post.push(draft.try_lock().is_ok());
        }
        if state.fail_posts {
            return Err(SurfaceError::MissingPermission("Manage Webhooks".to_string()));
        }
        if !state.repeat_message_ids {
            state.next_message += 1;
        }
        let message_id = format!("fake-msg-{}", state.next_message);
        state.posted.push((channel_id.to_string(), card.clone()));
        Ok(MessageRef {
            channel_id: channel_id.to_string(),
            message_id,
        })
    }

    async fn update_notification(
        &self,
        message: &MessageRef,
        resolution: &CardResolution,
    ) -> SurfaceResult<()> {
        let mut state = self.state.lock().await;
        if state.fail_updates {
            return Err(SurfaceError::NotFound(message.message_id.clone()));
        }
        state.updated.push((message.clone(), resolution.clone()));
        Ok(())
    }

    async fn delete_notification(&self, message: &MessageRef) -> SurfaceResult<()> {
        self.state.lock().await.deleted.push(message.clone());
        Ok(())
    }

    async fn strip_reactions(&self, message: &MessageRef) -> SurfaceResult<()> {
        let mut state = self.state.lock().await;
        state.reactions.remove(&message.message_id);
        state.stripped.push(message.clone());
        Ok(())
    }

    async fn remove_reaction(
        &self,
        message: &MessageRef,
        user_id: &str,
        marker: OutcomeMarker,
    ) -> SurfaceResult<()> {
        let mut state = self.state.lock().await;
        if state.deny_reaction_removal {
            return Err(SurfaceError::MissingPermission("Manage Messages".to_string()));
        }
        state
            .removed_reactions
            .push((message.clone(), user_id.to_string(), marker));
        Ok(())
    }

    async fn outcome_reactions(&self, message: &MessageRef) -> SurfaceResult<Vec<MarkerReaction>> {
        let state = self.state.lock().await;
        if state.fail_reaction_reads {
            return Err(SurfaceError::Unavailable("channel gone".to_string()));
        }
        Ok(state
            .reactions
            .get(&message.message_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn channel_capability(&self, channel_id: &str) -> SurfaceResult<ChannelCapability> {
        Ok(self
            .state
            .lock()
            .await
            .capabilities
            .get(channel_id)
            .copied()
            .unwrap_or(ChannelCapability {
                embed_links: true,
                manage_webhooks: true,
            }))
    }
}

#[async_trait]
impl VoiceLabelSurface for FakeSurface {
    async fn channel_label(&self, channel_id: &str) -> SurfaceResult<String> {
        Ok(self
            .state
            .lock()
            .await
            .labels
            .get(channel_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn rename_channel(&self, channel_id: &str, label: &str) -> SurfaceResult<()> {
        let mut state = self.state.lock().await;
        state.labels.insert(channel_id.to_string(), label.to_string());
        state.renames += 1;
        Ok(())
    }
}
