use diesel::Connection;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::info;

use crate::repositories::SharedConnection;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

#[derive(Error, Debug)]
pub enum DbSetupError {
    #[error("Failed to connect to {url}: {source}")]
    Connect {
        url: String,
        source: diesel::ConnectionError,
    },
    #[error("Failed to run migrations: {0}")]
    Migrations(String),
}

pub fn run_migrations(conn: &mut SqliteConnection) -> Result<(), DbSetupError> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|err| DbSetupError::Migrations(err.to_string()))?;
    info!(applied = applied.len(), "Database migrations applied");
    Ok(())
}

/// Opens `url` and brings its schema up to date.
pub fn connect(url: &str) -> Result<SharedConnection, DbSetupError> {
    let mut conn = SqliteConnection::establish(url).map_err(|source| DbSetupError::Connect {
        url: url.to_string(),
        source,
    })?;
    run_migrations(&mut conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}
