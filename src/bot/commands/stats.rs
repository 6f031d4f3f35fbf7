//! Capper statistics commands - `/stats` and `/leaderboard`.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        core::{
            capper::{self, CapperStats},
            odds::format_units,
        },
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;

    const LEADERBOARD_SIZE: usize = 10;

    fn record_line(stats: &CapperStats) -> String {
        let rate = stats
            .win_rate()
            .map_or_else(|| "-".to_string(), |rate| format!("{rate}%"));
        format!(
            "{}-{} ({rate}) · {}",
            stats.wins,
            stats.losses,
            format_units(stats.net_units)
        )
    }

    /// Shows a capper's record in this server.
    #[poise::command(slash_command, guild_only)]
    pub async fn stats(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Capper to look up (defaults to you)"] user: Option<serenity::User>,
    ) -> Result<()> {
        let Some(guild_id) = ctx.guild_id() else {
            return Ok(());
        };
        let user = user.as_ref().unwrap_or_else(|| ctx.author());
        let db = &ctx.data().database;

        let Some(stats) = capper::get_stats(db, &guild_id.to_string(), &user.id.to_string()).await?
        else {
            ctx.say(format!("❌ {} hasn't placed any bets here yet.", user.name))
                .await?;
            return Ok(());
        };

        let win_rate = stats
            .win_rate()
            .map_or_else(|| "-".to_string(), |rate| format!("{rate}%"));
        let yearly = stats
            .yearly_total
            .map_or_else(|| "-".to_string(), format_units);

        let color = if stats.net_units >= 0.0 { 0x002E_CC71 } else { 0x00E7_4C3C };
        let embed = serenity::CreateEmbed::default()
            .title(format!("📊 {}", stats.display_name))
            .thumbnail(user.face())
            .color(color)
            .fields(vec![
                ("Record", format!("{}-{}", stats.wins, stats.losses), true),
                ("Win rate", win_rate, true),
                ("Net units", format_units(stats.net_units), true),
                ("Pending", stats.pending.to_string(), true),
                ("Last year", yearly, true),
            ]);

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }

    /// Shows the top cappers in this server by net units.
    #[poise::command(slash_command, guild_only)]
    pub async fn leaderboard(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let Some(guild_id) = ctx.guild_id() else {
            return Ok(());
        };
        let db = &ctx.data().database;

        let board = capper::leaderboard(db, &guild_id.to_string(), LEADERBOARD_SIZE).await?;
        if board.is_empty() {
            ctx.say("No settled bets yet. Be the first with `/bet`!").await?;
            return Ok(());
        }

        let description = board
            .iter()
            .enumerate()
            .map(|(i, stats)| {
                let medal = match i {
                    0 => "🥇".to_string(),
                    1 => "🥈".to_string(),
                    2 => "🥉".to_string(),
                    _ => format!("**{}.**", i + 1),
                };
                format!("{medal} {} · {}", stats.display_name, record_line(stats))
            })
            .collect::<Vec<_>>()
            .join("\n");

        let embed = serenity::CreateEmbed::default()
            .title("🏆 Leaderboard")
            .description(description)
            .color(0x00F1_C40F)
            .footer(serenity::CreateEmbedFooter::new("Net units over all settled bets"));
        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
