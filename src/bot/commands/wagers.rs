//! Wager commands - `/pending` and `/cancel`.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, handlers::autocomplete},
        core::{capper, odds::format_units, placement},
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;

    async fn is_admin(ctx: poise::Context<'_, BotData, Error>) -> bool {
        ctx.author_member()
            .await
            .and_then(|member| member.permissions)
            .is_some_and(|permissions| permissions.administrator())
    }

    /// Lists your pending bets in this server.
    #[poise::command(slash_command, guild_only)]
    pub async fn pending(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let Some(guild_id) = ctx.guild_id() else {
            return Ok(());
        };
        let db = &ctx.data().database;
        let user_id = ctx.author().id.to_string();

        let wagers = capper::pending_wagers(db, &guild_id.to_string(), &user_id).await?;
        if wagers.is_empty() {
            ctx.send(
                poise::CreateReply::default()
                    .content("You have no pending bets.")
                    .ephemeral(true),
            )
            .await?;
            return Ok(());
        }

        let mut description = String::new();
        for wager in wagers.iter().take(20) {
            description.push_str(&format!(
                "`{}` **{}** {} · {}u ({})\n",
                wager.serial,
                wager.league,
                wager.summary,
                wager.units,
                format_units(wager.stake).trim_start_matches('+')
            ));
        }
        if wagers.len() > 20 {
            description.push_str(&format!("…and {} more", wagers.len() - 20));
        }

        let embed = serenity::CreateEmbed::default()
            .title(format!("⏳ Pending bets ({})", wagers.len()))
            .description(description)
            .color(0x00F1_C40F);
        ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
            .await?;
        Ok(())
    }

    /// Cancels one of your pending bets and removes its card.
    ///
    /// Administrators may cancel anyone's pending bet. Settled bets can't be
    /// cancelled.
    #[poise::command(slash_command, guild_only)]
    pub async fn cancel(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Serial of the bet to cancel"]
        #[autocomplete = "autocomplete::autocomplete_pending_serial"]
        serial: i64,
    ) -> Result<()> {
        let Some(guild_id) = ctx.guild_id() else {
            return Ok(());
        };
        let data = ctx.data();
        let admin = is_admin(ctx).await;

        let reply = match placement::withdraw_wager(
            &data.database,
            data.surface.as_ref(),
            &data.pending,
            &guild_id.to_string(),
            serial,
            &ctx.author().id.to_string(),
            admin,
        )
        .await
        {
            Ok(wager) => format!("✅ Cancelled bet `{}`: {}", wager.serial, wager.summary),
            Err(e) => format!("❌ {}", e.user_message()),
        };

        ctx.send(poise::CreateReply::default().content(reply).ephemeral(true))
            .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
