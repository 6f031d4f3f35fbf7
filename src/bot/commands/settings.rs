//! Guild settings commands - bet channels, notify role and voice labels.
//!
//! Every subcommand requires the Administrator permission.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        core::{guild, odds::format_units, surface::NotificationSurface},
        errors::{Error, Result},
    };
    use poise::serenity_prelude::{self as serenity, Mentionable};
    use tracing::warn;

    fn guild_key(ctx: poise::Context<'_, BotData, Error>) -> Option<String> {
        ctx.guild_id().map(|id| id.to_string())
    }

    fn mention_channel(id: &str) -> String {
        id.parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .map_or_else(|| format!("`{id}`"), |id| serenity::ChannelId::new(id).mention().to_string())
    }

    /// Configure where bets go and how the server is notified.
    #[poise::command(
        slash_command,
        guild_only,
        required_permissions = "ADMINISTRATOR",
        subcommands("channel_add", "channel_remove", "role", "voice_labels", "show")
    )]
    pub async fn settings(_ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        Ok(())
    }

    /// Allows bets to be posted in a channel.
    #[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
    pub async fn channel_add(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Channel bets may be posted in"]
        #[channel_types("Text")]
        channel: serenity::GuildChannel,
    ) -> Result<()> {
        let Some(guild_id) = guild_key(ctx) else {
            return Ok(());
        };
        let data = ctx.data();
        let channel_id = channel.id.to_string();

        guild::add_bet_channel(&data.database, &guild_id, &channel_id).await?;

        // Warn early rather than at the first confirm
        let mut reply = format!("✅ Bets can now be posted in {}.", channel.mention());
        match data.surface.channel_capability(&channel_id).await {
            Ok(capability) => {
                if let Some(permission) = capability.missing() {
                    reply.push_str(&format!(
                        "\n⚠️ I'm missing **{permission}** there, so posting will fail until it's granted."
                    ));
                }
            }
            Err(e) => warn!(channel_id, error = %e, "Could not check channel permissions"),
        }

        ctx.say(reply).await?;
        Ok(())
    }

    /// Stops bets from being posted in a channel.
    #[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
    pub async fn channel_remove(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Channel to remove"]
        #[channel_types("Text")]
        channel: serenity::GuildChannel,
    ) -> Result<()> {
        let Some(guild_id) = guild_key(ctx) else {
            return Ok(());
        };

        let (_, removed) =
            guild::remove_bet_channel(&ctx.data().database, &guild_id, &channel.id.to_string())
                .await?;

        if removed {
            ctx.say(format!("✅ {} is no longer a bet channel.", channel.mention()))
                .await?;
        } else {
            ctx.say(format!("❌ {} wasn't a bet channel.", channel.mention()))
                .await?;
        }
        Ok(())
    }

    /// Sets (or clears) the role mentioned on every new bet card.
    #[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
    pub async fn role(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Role to ping; leave empty to stop pinging"] role: Option<serenity::Role>,
    ) -> Result<()> {
        let Some(guild_id) = guild_key(ctx) else {
            return Ok(());
        };

        guild::set_notify_role(
            &ctx.data().database,
            &guild_id,
            role.as_ref().map(|role| role.id.to_string()),
        )
        .await?;

        match role {
            Some(role) => ctx.say(format!("✅ New bets will ping {}.", role.mention())).await?,
            None => ctx.say("✅ New bets will no longer ping a role.").await?,
        };
        Ok(())
    }

    /// Sets the voice channels that show the month and year unit totals.
    ///
    /// Labels are refreshed for premium servers only.
    #[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
    pub async fn voice_labels(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Voice channel for the month-to-date total"]
        #[channel_types("Voice")]
        monthly: Option<serenity::GuildChannel>,
        #[description = "Voice channel for the year-to-date total"]
        #[channel_types("Voice")]
        yearly: Option<serenity::GuildChannel>,
    ) -> Result<()> {
        let Some(guild_id) = guild_key(ctx) else {
            return Ok(());
        };
        let db = &ctx.data().database;

        guild::set_voice_channels(
            db,
            &guild_id,
            monthly.as_ref().map(|channel| channel.id.to_string()),
            yearly.as_ref().map(|channel| channel.id.to_string()),
        )
        .await?;

        let mut reply = "✅ Voice labels updated.".to_string();
        if !guild::subscription_tier(db, &guild_id).await?.is_premium() {
            reply.push_str("\nℹ️ Labels are refreshed for premium servers only.");
        }
        ctx.say(reply).await?;
        Ok(())
    }

    /// Shows this server's bot configuration.
    #[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
    pub async fn show(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let Some(guild_id) = guild_key(ctx) else {
            return Ok(());
        };
        let db = &ctx.data().database;

        let settings = guild::get_or_create_settings(db, &guild_id).await?;
        let tier = guild::subscription_tier(db, &guild_id).await?;

        let channels = settings.bet_channels();
        let channels = if channels.is_empty() {
            "None - add one with `/settings channel_add`".to_string()
        } else {
            channels.iter().map(|id| mention_channel(id)).collect::<Vec<_>>().join(", ")
        };
        let role = settings.notify_role_id.as_deref().map_or_else(
            || "None".to_string(),
            |id| {
                id.parse::<u64>()
                    .ok()
                    .filter(|id| *id != 0)
                    .map_or_else(|| format!("`{id}`"), |id| serenity::RoleId::new(id).mention().to_string())
            },
        );
        let voice = |id: Option<&str>| id.map_or_else(|| "None".to_string(), mention_channel);

        let embed = serenity::CreateEmbed::default()
            .title("⚙️ Server settings")
            .color(0x0034_98DB)
            .fields(vec![
                ("Bet channels", channels, false),
                ("Notify role", role, true),
                ("Tier", tier.as_str().to_string(), true),
                ("Monthly label", voice(settings.monthly_voice_channel_id.as_deref()), true),
                ("Yearly label", voice(settings.yearly_voice_channel_id.as_deref()), true),
                ("Running total", format_units(settings.running_total), true),
                ("Lifetime total", format_units(settings.lifetime_total), true),
            ]);
        ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
            .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
