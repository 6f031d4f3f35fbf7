use capper_bot::bot::{self, BotData, discord_surface::DiscordSurface};
use capper_bot::config::{self, database};
use capper_bot::core::{
    reconcile::reconcile,
    schedule::{self, JobContext},
    session::SessionRegistry,
    settlement::{PendingRegistry, SettlementEngine},
};
use capper_bot::errors::{Error, Result};
use chrono::Utc;
use dotenvy::dotenv;
use poise::serenity_prelude as serenity;
use std::{env, sync::Arc};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Bound on resolution signals waiting for the settlement engine
const SIGNAL_QUEUE: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();

    // 3. Load the bot settings
    let app_config = Arc::new(config::load_app_configuration()?);

    // 4. Open the database and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!(error = %e, "Failed to connect to database"))?;
    database::create_tables(&db).await?;

    let token = env::var("DISCORD_BOT_TOKEN")
        .inspect_err(|e| error!(error = %e, "DISCORD_BOT_TOKEN not found"))
        .map_err(Error::EnvVar)?;

    let http = Arc::new(serenity::Http::new(&token));
    let surface = Arc::new(DiscordSurface::new(
        Arc::clone(&http),
        app_config.markers.clone(),
        app_config.display.webhook_name.clone(),
    ));

    // 5. Rebuild pending state and catch up on offline resolutions before
    //    any live reaction is accepted
    let pending = PendingRegistry::new();
    let report = reconcile(&db, surface.as_ref(), &pending, Utc::now()).await?;
    info!(
        settled_offline = report.settled_offline,
        registered_pending = report.registered_pending,
        placeholders_created = report.placeholders_created,
        ledger_repaired = report.ledger_repaired,
        skipped = report.skipped,
        "Reconciliation complete"
    );

    // 6. Periods missed while offline
    if let Err(e) = schedule::catch_up_monthly(&db, Utc::now()).await {
        error!(error = %e, "Monthly catch-up failed");
    }
    if let Err(e) = schedule::catch_up_yearly(&db, Utc::now()).await {
        error!(error = %e, "Yearly catch-up failed");
    }

    // 7. Settlement engine and background jobs
    let (signals, receiver) = mpsc::channel(SIGNAL_QUEUE);
    let engine = Arc::new(SettlementEngine::new(
        db.clone(),
        pending.clone(),
        surface.clone(),
    ));
    let engine_task = tokio::spawn(engine.run(receiver));

    let sessions = SessionRegistry::new(app_config.betting.session_timeout());
    let mut jobs = schedule::spawn_background_jobs(JobContext {
        db: db.clone(),
        voice: surface.clone(),
        sessions: sessions.clone(),
        config: app_config.rollup.clone(),
    });

    // 8. Run the bot
    let data = BotData::new(
        db.clone(),
        Arc::clone(&app_config),
        pending,
        surface,
        signals,
        sessions,
    );
    let result = bot::run_bot(&token, data).await;

    jobs.abort_all();
    engine_task.abort();
    database::close_connection(db).await?;
    result
}
