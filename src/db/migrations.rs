use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

use super::models::Dimension;

/// Run all pending migrations.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    create_migration_table(pool).await?;
    let current_version = get_schema_version(pool).await?;

    if current_version < 1 {
        debug!("Running migration v1");
        run_migration_v1(pool).await?;
        set_schema_version(pool, 1).await?;
    }

    Ok(())
}

async fn create_migration_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS _schema_version (
            version INTEGER PRIMARY KEY
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create schema version table")?;

    Ok(())
}

async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT version FROM _schema_version LIMIT 1")
        .fetch_optional(pool)
        .await
        .context("Failed to get schema version")?;

    Ok(row.map_or(0, |(v,)| v))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("DELETE FROM _schema_version")
        .execute(pool)
        .await?;
    sqlx::query("INSERT INTO _schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

async fn run_migration_v1(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v1: creating initial schema");

    let mut tx = pool.begin().await?;

    // Identifier dimensions: external id -> surrogate key
    for dimension in Dimension::ALL {
        let table = dimension.table();
        sqlx::query(&format!(
            r"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                external_id TEXT NOT NULL
            )
            "
        ))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to create {table} table"))?;

        sqlx::query(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_external_id ON {table}(external_id)"
        ))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to create {table} index"))?;
    }

    // Archive records
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS urls (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL,
            author_id INTEGER NOT NULL REFERENCES authors(id),
            community_id INTEGER NOT NULL REFERENCES communities(id),
            channel_id INTEGER NOT NULL REFERENCES channels(id),
            status_code INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        ",
    )
    .execute(&mut *tx)
    .await
    .context("Failed to create urls table")?;

    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_urls_url ON urls(url)")
        .execute(&mut *tx)
        .await
        .context("Failed to create urls index")?;

    tx.commit().await.context("Failed to commit migration v1")?;

    Ok(())
}
