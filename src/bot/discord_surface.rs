//! Discord implementation of the notification and voice label surfaces.
//!
//! Cards are posted through a bot-owned webhook in the bet channel so they
//! show the capper's name and avatar. The webhook is reused when it already
//! exists and created otherwise.

use crate::config::settings::MarkerConfig;
use crate::core::odds::format_units;
use crate::core::settlement::{Outcome, OutcomeMarker};
use crate::core::surface::{
    CardResolution, ChannelCapability, MarkerReaction, MessageRef, NotificationSurface,
    PosterIdentity, SurfaceError, SurfaceResult, VoiceLabelSurface, WagerCard,
};
use async_trait::async_trait;
use poise::serenity_prelude::{self as serenity, Mentionable};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::warn;

const PENDING_COLOUR: u32 = 0x00F1_C40F;
const WON_COLOUR: u32 = 0x002E_CC71;
const LOST_COLOUR: u32 = 0x00E7_4C3C;

/// Translates a serenity failure into the surface taxonomy.
fn classify(error: &serenity::Error, what: &str) -> SurfaceError {
    if let serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response)) = error {
        match response.status_code.as_u16() {
            403 => return SurfaceError::MissingPermission(what.to_string()),
            404 => return SurfaceError::NotFound(what.to_string()),
            _ => {}
        }
    }
    SurfaceError::Unavailable(format!("{what}: {error}"))
}

fn parse_id(raw: &str) -> SurfaceResult<u64> {
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| SurfaceError::NotFound(format!("invalid id {raw}")))
}

fn channel_id(raw: &str) -> SurfaceResult<serenity::ChannelId> {
    parse_id(raw).map(serenity::ChannelId::new)
}

fn message_id(raw: &str) -> SurfaceResult<serenity::MessageId> {
    parse_id(raw).map(serenity::MessageId::new)
}

/// Embed for a freshly posted wager.
#[must_use]
pub fn card_embed(card: &WagerCard) -> serenity::CreateEmbed {
    let (stake_label, stake_value) = stake_field(card);
    serenity::CreateEmbed::new()
        .author(serenity::CreateEmbedAuthor::new(&card.league).icon_url(&card.league_image))
        .title(&card.summary)
        .thumbnail(&card.entity_image)
        .field("Units", format!("{}u", card.units), true)
        .field(stake_label, stake_value, true)
        .colour(PENDING_COLOUR)
        .footer(serenity::CreateEmbedFooter::new(pending_footer(card.serial)))
}

fn stake_field(card: &WagerCard) -> (&'static str, String) {
    (
        card.stake.framing.label(),
        format_units(card.stake.amount).trim_start_matches('+').to_string(),
    )
}

fn pending_footer(serial: i64) -> String {
    format!("Serial {serial} · Pending")
}

/// Discord-backed surfaces.
pub struct DiscordSurface {
    http: Arc<serenity::Http>,
    markers: MarkerConfig,
    webhook_name: String,
    bot_user: OnceCell<serenity::UserId>,
}

impl DiscordSurface {
    #[must_use]
    pub fn new(http: Arc<serenity::Http>, markers: MarkerConfig, webhook_name: String) -> Self {
        Self {
            http,
            markers,
            webhook_name,
            bot_user: OnceCell::new(),
        }
    }

    async fn bot_user_id(&self) -> SurfaceResult<serenity::UserId> {
        self.bot_user
            .get_or_try_init(|| async {
                self.http
                    .get_current_user()
                    .await
                    .map(|user| user.id)
                    .map_err(|e| classify(&e, "current user"))
            })
            .await
            .copied()
    }

    fn reaction(&self, marker: OutcomeMarker) -> serenity::ReactionType {
        serenity::ReactionType::Unicode(marker.emoji(&self.markers).to_string())
    }

    /// The bot's webhook in `channel`, created on first use.
    async fn webhook(&self, channel: serenity::ChannelId) -> SurfaceResult<serenity::Webhook> {
        let existing = channel
            .webhooks(&*self.http)
            .await
            .map_err(|e| classify(&e, "Manage Webhooks"))?;

        if let Some(webhook) = existing.into_iter().find(|webhook| {
            webhook.token.is_some() && webhook.name.as_deref() == Some(self.webhook_name.as_str())
        }) {
            return Ok(webhook);
        }

        channel
            .create_webhook(&*self.http, serenity::CreateWebhook::new(&self.webhook_name))
            .await
            .map_err(|e| classify(&e, "Manage Webhooks"))
    }
}

#[async_trait]
impl NotificationSurface for DiscordSurface {
    async fn post_notification(
        &self,
        channel_id_raw: &str,
        card: &WagerCard,
        poster: &PosterIdentity,
    ) -> SurfaceResult<MessageRef> {
        let channel = channel_id(channel_id_raw)?;
        let webhook = self.webhook(channel).await?;

        let mut builder = serenity::ExecuteWebhook::new()
            .username(&poster.display_name)
            .embed(card_embed(card));
        if let Some(avatar_url) = &poster.avatar_url {
            builder = builder.avatar_url(avatar_url);
        }
        if let Some(role) = card.notify_role_id.as_deref().and_then(|id| parse_id(id).ok()) {
            let role = serenity::RoleId::new(role);
            builder = builder
                .content(role.mention().to_string())
                .allowed_mentions(serenity::CreateAllowedMentions::new().roles(vec![role]));
        }

        let message = webhook
            .execute(&*self.http, true, builder)
            .await
            .map_err(|e| classify(&e, "webhook post"))?
            .ok_or_else(|| SurfaceError::Unavailable("webhook returned no message".to_string()))?;

        for marker in [OutcomeMarker::Positive, OutcomeMarker::Negative] {
            if let Err(e) = channel
                .create_reaction(&*self.http, message.id, self.reaction(marker))
                .await
            {
                warn!(message_id = %message.id, error = %e, "Failed to add outcome reaction");
            }
        }

        Ok(MessageRef {
            channel_id: channel.to_string(),
            message_id: message.id.to_string(),
        })
    }

    async fn update_notification(
        &self,
        message: &MessageRef,
        resolution: &CardResolution,
    ) -> SurfaceResult<()> {
        let channel = channel_id(&message.channel_id)?;
        let id = message_id(&message.message_id)?;

        let posted = channel
            .message(&*self.http, id)
            .await
            .map_err(|e| classify(&e, "card"))?;
        let base = posted
            .embeds
            .into_iter()
            .next()
            .map(serenity::CreateEmbed::from)
            .unwrap_or_default();

        let (colour, verb) = match resolution.outcome {
            Outcome::Won => (WON_COLOUR, "Won"),
            Outcome::Lost => (LOST_COLOUR, "Lost"),
        };
        let resolver = parse_id(&resolution.resolved_by).map_or_else(
            |_| resolution.resolved_by.clone(),
            |id| serenity::UserId::new(id).mention().to_string(),
        );
        let embed = base
            .colour(colour)
            .field("Result", format!("{verb} {}", format_units(resolution.delta)), true)
            .footer(serenity::CreateEmbedFooter::new(format!(
                "{verb} · resolved by {}",
                resolution.resolved_by
            )))
            .description(format!("Resolved by {resolver}"));

        let webhook = self.webhook(channel).await?;
        webhook
            .edit_message(
                &*self.http,
                id,
                serenity::EditWebhookMessage::new().embeds(vec![embed]),
            )
            .await
            .map_err(|e| classify(&e, "card edit"))?;
        Ok(())
    }

    async fn delete_notification(&self, message: &MessageRef) -> SurfaceResult<()> {
        let channel = channel_id(&message.channel_id)?;
        let id = message_id(&message.message_id)?;
        let webhook = self.webhook(channel).await?;
        webhook
            .delete_message(&*self.http, None, id)
            .await
            .map_err(|e| classify(&e, "card delete"))
    }

    async fn strip_reactions(&self, message: &MessageRef) -> SurfaceResult<()> {
        let channel = channel_id(&message.channel_id)?;
        channel
            .delete_reactions(&*self.http, message_id(&message.message_id)?)
            .await
            .map_err(|e| classify(&e, "Manage Messages"))
    }

    async fn remove_reaction(
        &self,
        message: &MessageRef,
        user_id: &str,
        marker: OutcomeMarker,
    ) -> SurfaceResult<()> {
        let channel = channel_id(&message.channel_id)?;
        let user = serenity::UserId::new(parse_id(user_id)?);
        channel
            .delete_reaction(
                &*self.http,
                message_id(&message.message_id)?,
                Some(user),
                self.reaction(marker),
            )
            .await
            .map_err(|e| classify(&e, "Manage Messages"))
    }

    async fn outcome_reactions(&self, message: &MessageRef) -> SurfaceResult<Vec<MarkerReaction>> {
        let channel = channel_id(&message.channel_id)?;
        let id = message_id(&message.message_id)?;
        let bot_user = self.bot_user_id().await?;

        let mut found = Vec::new();
        for marker in [OutcomeMarker::Positive, OutcomeMarker::Negative] {
            let users = channel
                .reaction_users(&*self.http, id, self.reaction(marker), Some(100), None)
                .await
                .map_err(|e| classify(&e, "card reactions"))?;
            found.extend(
                users
                    .into_iter()
                    .filter(|user| user.id != bot_user)
                    .map(|user| MarkerReaction {
                        marker,
                        user_id: user.id.to_string(),
                    }),
            );
        }
        Ok(found)
    }

    async fn channel_capability(&self, channel_id_raw: &str) -> SurfaceResult<ChannelCapability> {
        let channel = channel_id(channel_id_raw)?
            .to_channel(&*self.http)
            .await
            .map_err(|e| classify(&e, "channel"))?
            .guild()
            .ok_or_else(|| SurfaceError::NotFound("guild channel".to_string()))?;

        let guild = channel
            .guild_id
            .to_partial_guild(&*self.http)
            .await
            .map_err(|e| classify(&e, "guild"))?;
        let member = guild
            .member(&*self.http, self.bot_user_id().await?)
            .await
            .map_err(|e| classify(&e, "bot member"))?;

        let permissions = guild.user_permissions_in(&channel, &member);
        Ok(ChannelCapability {
            embed_links: permissions.embed_links(),
            manage_webhooks: permissions.manage_webhooks(),
        })
    }
}

#[async_trait]
impl VoiceLabelSurface for DiscordSurface {
    async fn channel_label(&self, channel_id_raw: &str) -> SurfaceResult<String> {
        channel_id(channel_id_raw)?
            .to_channel(&*self.http)
            .await
            .map_err(|e| classify(&e, "voice channel"))?
            .guild()
            .map(|channel| channel.name)
            .ok_or_else(|| SurfaceError::NotFound("voice channel".to_string()))
    }

    async fn rename_channel(&self, channel_id_raw: &str, label: &str) -> SurfaceResult<()> {
        channel_id(channel_id_raw)?
            .edit(&*self.http, serenity::EditChannel::new().name(label))
            .await
            .map_err(|e| classify(&e, "Manage Channels"))?;
        Ok(())
    }
}
