//! Bot layer - Discord-specific interface and command handlers
//!
//! This module provides the Discord interface for the capper bot: the slash
//! commands, the interactive bet slip, the reaction listener that feeds the
//! settlement engine and the Discord implementation of the core surfaces.

/// Discord command implementations (bet slip, wagers, stats, settings, general)
pub mod commands;
/// Discord-backed notification and voice label surfaces
pub mod discord_surface;
/// Discord interaction handlers (autocomplete, reactions)
pub mod handlers;

use crate::config::AppConfig;
use crate::core::{
    resolver::EntityResolver, serial::SerialGenerator, session::SessionRegistry,
    settlement::{PendingRegistry, ResolutionSignal},
};
use crate::errors::{Error, ErrorKind, Result};
use discord_surface::DiscordSurface;
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// Shared data available to all bot commands.
/// This structure holds the database connection, the live bet slips and the
/// queue into the settlement engine.
pub struct BotData {
    /// Database connection for all database operations
    pub database: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub sessions: SessionRegistry,
    /// Cards awaiting an outcome reaction
    pub pending: PendingRegistry,
    pub resolver: EntityResolver,
    pub surface: Arc<DiscordSurface>,
    /// Resolution signals for the settlement engine
    pub signals: mpsc::Sender<ResolutionSignal>,
    pub serials: SerialGenerator,
}

impl BotData {
    /// Creates a new `BotData` instance.
    /// The session registry and resolver are built from `config`; the pending
    /// registry must be the one the settlement engine was given.
    #[must_use]
    pub fn new(
        database: DatabaseConnection,
        config: Arc<AppConfig>,
        pending: PendingRegistry,
        surface: Arc<DiscordSurface>,
        signals: mpsc::Sender<ResolutionSignal>,
        sessions: SessionRegistry,
    ) -> Self {
        let resolver = EntityResolver::new(config.display.placeholder_image_url.clone());
        Self {
            database,
            config,
            sessions,
            pending,
            resolver,
            surface,
            signals,
            serials: SerialGenerator::new(),
        }
    }
}

/// Poise context used by every command.
pub type Context<'a> = poise::Context<'a, BotData, Error>;

/// Logs a failed command or slip step at a level that matches its kind.
///
/// User mistakes log at debug; configuration defects log at error with
/// `kind = "configuration"`.
pub fn log_failure(source: &str, error: &Error) {
    match error.kind() {
        ErrorKind::Input | ErrorKind::Authorization => {
            debug!(source, error = %error, "Request rejected");
        }
        ErrorKind::Resource => {
            warn!(source, error = %error, "Request blocked by guild setup");
        }
        ErrorKind::Configuration => {
            error!(source, kind = "configuration", error = %error, "Bot is misconfigured");
        }
        ErrorKind::Persistence => {
            error!(source, error = %error, "Request failed");
        }
    }
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!(error = %error, "Failed to start bot");
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            log_failure(&ctx.command().name, &error);
            let reply = poise::CreateReply::default()
                .content(format!("❌ {}", error.user_message()))
                .ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                error!(error = %e, "Failed to send error message");
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!(error = %e, "Error while handling error");
            }
        }
    }
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, BotData, Error>,
    data: &BotData,
) -> Result<()> {
    if let serenity::FullEvent::ReactionAdd { add_reaction } = event {
        handlers::reactions::on_reaction_add(ctx, add_reaction, data).await;
    }
    Ok(())
}

/// Every command the bot registers.
#[must_use]
pub fn all_commands() -> Vec<poise::Command<BotData, Error>> {
    vec![
        commands::ping(),
        commands::help(),
        commands::bet(),
        commands::cancel(),
        commands::pending(),
        commands::stats(),
        commands::leaderboard(),
        commands::settings(),
    ]
}

/// Connects to the gateway and serves commands until the client stops.
#[instrument(skip_all)]
pub async fn run_bot(token: &str, data: BotData) -> Result<()> {
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: all_commands(),
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!(user = %ready.user.name, "Logged in");
                info!("Registering commands globally...");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(data)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS;

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::Client::builder(token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| error!(error = %e, "Error creating client"))?;

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| error!(error = %e, "Client error"))?;
    Ok(())
}

pub use commands::*;
pub use handlers::*;
