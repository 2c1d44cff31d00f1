mod migrations;
mod models;
mod queries;

pub use models::*;
pub use queries::*;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{debug, info};

/// Connections shared by the worker and the read surface.
const MAX_CONNECTIONS: u32 = 5;

/// How long a writer waits for the write lock before the store reports an error.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle to the archive cache.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the cache at `path`, creating the file and its directory if needed,
    /// and bring the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or written, or a
    /// migration fails.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create database directory: {}", dir.display()))?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(connect_options(path))
            .await
            .with_context(|| format!("Failed to open archive cache at {}", path.display()))?;

        let db = Self { pool };
        migrations::run(&db.pool).await?;
        info!(path = %path.display(), "Archive cache ready");

        db.check_write_lock(path).await?;
        Ok(db)
    }

    /// Take and release the write lock once.
    ///
    /// A cache that cannot be written would otherwise only fail at the first
    /// `record_outcome`, after the archive service was already called.
    async fn check_write_lock(&self, path: &Path) -> Result<()> {
        let tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .with_context(|| {
                format!(
                    "Archive cache is not writable (path: {}). Check permissions/ownership",
                    path.display()
                )
            })?;
        tx.rollback()
            .await
            .context("Failed to release write lock")?;
        debug!("Archive cache write lock acquired");
        Ok(())
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for in-flight queries and close every connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn connect_options(path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        // Writers open with BEGIN IMMEDIATE, so contention waits here instead
        // of failing a lock upgrade.
        .busy_timeout(BUSY_TIMEOUT)
}
