//! Narrow interfaces to the platform the bot posts to.
//!
//! The core never sees Discord types: it talks to a [`NotificationSurface`]
//! for wager cards and reactions and to a [`VoiceLabelSurface`] for the
//! rollup labels. Implementations report failures as [`SurfaceError`], which
//! the core translates into its own [`Error`] before propagating.

use super::odds::Stake;
use super::settlement::{Outcome, OutcomeMarker};
use crate::errors::Error;
use async_trait::async_trait;
use thiserror::Error as ThisError;

/// Where a posted card lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel_id: String,
    pub message_id: String,
}

/// Identity the card is posted under (the capper, via webhook).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosterIdentity {
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Everything needed to render a freshly placed wager.
#[derive(Debug, Clone, PartialEq)]
pub struct WagerCard {
    pub serial: i64,
    pub league: String,
    pub summary: String,
    pub units: u8,
    pub stake: Stake,
    pub entity_image: String,
    pub league_image: String,
    pub notify_role_id: Option<String>,
}

/// Visual change applied to a card after settlement.
#[derive(Debug, Clone, PartialEq)]
pub struct CardResolution {
    pub outcome: Outcome,
    pub resolved_by: String,
    pub delta: f64,
}

/// A reaction carrying an outcome marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerReaction {
    pub marker: OutcomeMarker,
    pub user_id: String,
}

/// What the bot may do in a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelCapability {
    pub embed_links: bool,
    pub manage_webhooks: bool,
}

impl ChannelCapability {
    /// Names the first missing permission needed to post cards.
    #[must_use]
    pub const fn missing(&self) -> Option<&'static str> {
        if !self.embed_links {
            Some("Embed Links")
        } else if !self.manage_webhooks {
            Some("Manage Webhooks")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum SurfaceError {
    #[error("missing permission: {0}")]
    MissingPermission(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("surface unavailable: {0}")]
    Unavailable(String),
}

pub type SurfaceResult<T> = std::result::Result<T, SurfaceError>;

impl From<SurfaceError> for Error {
    fn from(value: SurfaceError) -> Self {
        match value {
            SurfaceError::MissingPermission(permission) => Self::MissingPermission { permission },
            SurfaceError::NotFound(what) | SurfaceError::Unavailable(what) => {
                Self::Surface { message: what }
            }
        }
    }
}

/// Posts, edits and inspects wager cards.
#[async_trait]
pub trait NotificationSurface: Send + Sync {
    /// Posts the card to `channel_id` under `poster`'s identity and adds the
    /// outcome reaction affordances.
    async fn post_notification(
        &self,
        channel_id: &str,
        card: &WagerCard,
        poster: &PosterIdentity,
    ) -> SurfaceResult<MessageRef>;

    async fn update_notification(
        &self,
        message: &MessageRef,
        resolution: &CardResolution,
    ) -> SurfaceResult<()>;

    async fn delete_notification(&self, message: &MessageRef) -> SurfaceResult<()>;

    async fn strip_reactions(&self, message: &MessageRef) -> SurfaceResult<()>;

    /// Removes one user's marker reaction. Implementations without the
    /// permission return `MissingPermission`.
    async fn remove_reaction(
        &self,
        message: &MessageRef,
        user_id: &str,
        marker: OutcomeMarker,
    ) -> SurfaceResult<()>;

    /// Current outcome-marker reactions on a card.
    async fn outcome_reactions(&self, message: &MessageRef) -> SurfaceResult<Vec<MarkerReaction>>;

    async fn channel_capability(&self, channel_id: &str) -> SurfaceResult<ChannelCapability>;
}

/// Reads and renames the rollup voice channels.
#[async_trait]
pub trait VoiceLabelSurface: Send + Sync {
    async fn channel_label(&self, channel_id: &str) -> SurfaceResult<String>;

    async fn rename_channel(&self, channel_id: &str, label: &str) -> SurfaceResult<()>;
}
