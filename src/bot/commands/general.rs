//! General Discord commands - ping and help.
//! This module contains simple commands that don't require database operations.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command)]
    pub async fn help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let markers = &ctx.data().config.markers;
        let help_text = format!(
            "**Capper Bot Help**\n\
            Post your picks, settle them with a reaction and track your units.\n\n\
            **Betting**\n\
            • `/bet [league]` - Opens a bet slip: league, bet, odds, channel and units.\n\
            • React {} (won) or {} (lost) on your own card to settle it.\n\
            • `/pending` - Lists your open bets.\n\
            • `/cancel <serial>` - Withdraws an open bet.\n\n\
            **Stats**\n\
            • `/stats [user]` - Record, win rate and net units.\n\
            • `/leaderboard` - Top cappers in this server.\n\n\
            **Admin**\n\
            • `/settings <subcommand>` - Bet channels, notify role, voice labels.\n\n\
            **Utility**\n\
            • `/ping` - Checks if the bot is responsive.\n\
            • `/help` - Shows this help message.",
            markers.positive, markers.negative
        );

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
