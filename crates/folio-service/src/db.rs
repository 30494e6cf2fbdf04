//! # SQLite Connection Pool
//!
//! One pool per process. File databases run in WAL mode with
//! `synchronous = NORMAL` and a 3 s busy timeout so a CLI invocation and a
//! running `serve` can share the file. Embedded migrations run on open.
//!
//! The in-memory pool is capped at a single connection: every connection to
//! `sqlite::memory:` is a separate database.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};

use crate::error::ServiceError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(3);
const MAX_CONNECTIONS: u32 = 5;

/// Open (creating if needed) the database at `path` and apply migrations.
pub async fn open_pool(path: &Path) -> Result<SqlitePool, ServiceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    tracing::info!(path = %path.display(), "opened SQLite database");
    migrate(&pool).await?;
    Ok(pool)
}

/// Fresh migrated in-memory database.
pub async fn memory_pool() -> Result<SqlitePool, ServiceError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), ServiceError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::debug!("database migrations applied");
    Ok(())
}
