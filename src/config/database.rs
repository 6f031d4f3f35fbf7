//! Database configuration module.
//!
//! Handles the `SQLite` connection and table creation using `SeaORM`. Tables are
//! generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs; the composite and partial
//! unique indexes the ledger relies on are added with plain DDL afterwards.
//! Everything here is idempotent and runs on every startup.

use crate::entities::{Capper, GuildSettings, GuildSubscription, SystemState, UnitRecord, Wager};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/capper_bot.sqlite?mode=rwc";

/// Indexes `create_table_from_entity` can't express.
const EXTRA_INDEXES: [&str; 3] = [
    // One ledger row per (guild, wager, user)
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_unit_records_wager \
     ON unit_records (guild_id, serial, user_id)",
    // One period summary row per (guild, period start)
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_unit_records_period \
     ON unit_records (guild_id, timestamp) WHERE serial IS NULL",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_cappers_guild_user \
     ON cappers (guild_id, user_id)",
];

/// Gets the database URL from the environment or returns the default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Opens the store handle used by every component.
///
/// The returned connection is a pool; dropping it (or calling
/// [`close_connection`]) releases it.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!(%database_url, "Connecting to database");
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Closes the store handle at shutdown.
pub async fn close_connection(db: DatabaseConnection) -> Result<()> {
    db.close().await.map_err(Into::into)
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables and indexes if they don't exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    // Wagers first: unit_records references them
    create_table(db, &schema, Wager).await?;
    create_table(db, &schema, UnitRecord).await?;
    create_table(db, &schema, Capper).await?;
    create_table(db, &schema, GuildSettings).await?;
    create_table(db, &schema, GuildSubscription).await?;
    create_table(db, &schema, SystemState).await?;

    for ddl in EXTRA_INDEXES {
        db.execute_unprepared(ddl).await?;
    }

    info!("Database tables ensured.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{unit_record, wager};
    use chrono::Utc;
    use sea_orm::{ActiveModelTrait, QuerySelect, Set};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let _: Vec<wager::Model> = Wager::find().limit(1).all(&db).await?;
        let _: Vec<unit_record::Model> = UnitRecord::find().limit(1).all(&db).await?;
        let _ = Capper::find().limit(1).all(&db).await?;
        let _ = GuildSettings::find().limit(1).all(&db).await?;
        let _ = GuildSubscription::find().limit(1).all(&db).await?;
        let _ = SystemState::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_period_rows_are_unique_per_guild_and_start() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let start = Utc::now();
        let row = || unit_record::ActiveModel {
            guild_id: Set("g1".to_string()),
            serial: Set(None),
            user_id: Set(None),
            units: Set(0.0),
            total: Set(Some(4.0)),
            timestamp: Set(start),
            ..Default::default()
        };

        row().insert(&db).await?;
        assert!(row().insert(&db).await.is_err());
        Ok(())
    }
}
