//! Outcome reactions on wager cards.
//!
//! The gateway handler only translates; it never touches the database. A
//! reaction that carries an outcome marker on a pending card becomes a
//! [`ResolutionSignal`] on the settlement queue.

use crate::bot::BotData;
use crate::config::settings::MarkerConfig;
use crate::core::settlement::{OutcomeMarker, ResolutionSignal};
use poise::serenity_prelude as serenity;
use tracing::{debug, warn};

/// Builds a signal from raw reaction fields, or `None` for reactions that
/// can't resolve anything (DMs, the bot's own affordances, other emoji).
#[must_use]
pub fn resolution_signal(
    guild_id: Option<&str>,
    channel_id: &str,
    message_id: &str,
    emoji: &str,
    user_id: Option<&str>,
    bot_user_id: &str,
    markers: &MarkerConfig,
) -> Option<ResolutionSignal> {
    let guild_id = guild_id?;
    let user_id = user_id?;
    if user_id == bot_user_id {
        return None;
    }
    let marker = OutcomeMarker::from_emoji(emoji, markers)?;

    Some(ResolutionSignal {
        guild_id: guild_id.to_string(),
        channel_id: channel_id.to_string(),
        message_id: message_id.to_string(),
        marker,
        acting_user_id: user_id.to_string(),
    })
}

/// Forwards outcome reactions on pending cards to the settlement engine.
pub async fn on_reaction_add(ctx: &serenity::Context, reaction: &serenity::Reaction, data: &BotData) {
    let serenity::ReactionType::Unicode(emoji) = &reaction.emoji else {
        return;
    };

    let message_id = reaction.message_id.to_string();
    if data.pending.get(&message_id).await.is_none() {
        return;
    }

    let guild_id = reaction.guild_id.map(|id| id.to_string());
    let user_id = reaction.user_id.map(|id| id.to_string());
    let bot_user_id = ctx.cache.current_user().id.to_string();

    let Some(signal) = resolution_signal(
        guild_id.as_deref(),
        &reaction.channel_id.to_string(),
        &message_id,
        emoji,
        user_id.as_deref(),
        &bot_user_id,
        &data.config.markers,
    ) else {
        return;
    };

    debug!(message_id = %signal.message_id, user_id = %signal.acting_user_id, "Outcome reaction");
    if let Err(e) = data.signals.send(signal).await {
        warn!(error = %e, "Settlement queue closed, dropping reaction");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_marker_reaction_becomes_signal() {
        let markers = MarkerConfig::default();
        let signal =
            resolution_signal(Some("g1"), "c1", "m1", "✅", Some("u1"), "bot", &markers).unwrap();

        assert_eq!(signal.marker, OutcomeMarker::Positive);
        assert_eq!(signal.acting_user_id, "u1");
        assert_eq!(signal.message_id, "m1");
    }

    #[test]
    fn test_irrelevant_reactions_are_dropped() {
        let markers = MarkerConfig::default();
        // Bot's own affordance
        assert!(resolution_signal(Some("g1"), "c1", "m1", "✅", Some("bot"), "bot", &markers).is_none());
        // Not a marker
        assert!(resolution_signal(Some("g1"), "c1", "m1", "🔥", Some("u1"), "bot", &markers).is_none());
        // Outside a guild
        assert!(resolution_signal(None, "c1", "m1", "❌", Some("u1"), "bot", &markers).is_none());
    }
}
