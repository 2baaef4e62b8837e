//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust structs
//! without hand-written SQL. Creation is idempotent and runs on every startup.

use crate::entities::{
    Appointment, AppointmentEvent, BlockedRange, Inventory, InventoryAdjustment, Payment,
    Service, ServiceRequirement, Settings, SlotLimit, User,
};
use crate::errors::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info, instrument};

/// Default location of the salon database when neither config nor env name one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/salon_buddy.sqlite?mode=rwc";

/// Establishes a connection to the database at `database_url`.
///
/// Creates the parent directory of a file-backed `SQLite` database if it is missing.
#[instrument]
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    ensure_sqlite_dir(database_url)?;

    let mut options = ConnectOptions::new(database_url.to_string());
    options.sqlx_logging(false);

    let db = Database::connect(options).await?;
    info!("Connected to database");
    Ok(db)
}

/// Creates the directory holding a file-backed `SQLite` database.
fn ensure_sqlite_dir(database_url: &str) -> Result<()> {
    let Some(path) = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
    else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path == ":memory:" {
        return Ok(());
    }

    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Creates all tables that do not exist yet.
///
/// Parents are created before children so foreign keys always point at an existing table.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    create_table(db, Settings).await?;
    create_table(db, BlockedRange).await?;
    create_table(db, SlotLimit).await?;
    create_table(db, Inventory).await?;
    create_table(db, Service).await?;
    create_table(db, ServiceRequirement).await?;
    create_table(db, User).await?;
    create_table(db, Appointment).await?;
    create_table(db, AppointmentEvent).await?;
    create_table(db, InventoryAdjustment).await?;
    create_table(db, Payment).await?;
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();

    db.execute(builder.build(&statement)).await?;
    debug!(table = entity.table_name(), "Ensured table exists");
    Ok(())
}
