use anyhow::{Context, Result};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use super::models::{CacheStats, Dimension, Entry, EntryFilter, Origin};

// ========== Archive Records ==========

/// Look up the recorded status for a normalized URL.
///
/// Returns `None` when the URL has never been recorded.
pub async fn lookup_url(pool: &SqlitePool, url: &str) -> Result<Option<i64>> {
    sqlx::query_scalar("SELECT status_code FROM urls WHERE url = ?")
        .bind(url)
        .fetch_optional(pool)
        .await
        .context("Failed to look up cached url")
}

/// Record the archival outcome for a URL.
///
/// The identifier upserts and the record insert share one write transaction. The
/// first writer for a URL wins: if a record already exists nothing is
/// written, including the dimension rows for the new origin.
///
/// Returns `true` if a new record was inserted.
pub async fn record_outcome(
    pool: &SqlitePool,
    url: &str,
    origin: &Origin,
    status_code: i64,
) -> Result<bool> {
    // Take the write lock up front so concurrent writers queue on the busy
    // timeout instead of failing a read-to-write lock upgrade.
    let mut tx = pool
        .begin_with("BEGIN IMMEDIATE")
        .await
        .context("Failed to begin record transaction")?;

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM urls WHERE url = ?")
        .bind(url)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to check for existing record")?;

    if existing.is_some() {
        tx.rollback()
            .await
            .context("Failed to roll back record transaction")?;
        return Ok(false);
    }

    let mut ids = [0_i64; 3];
    for (slot, dimension) in ids.iter_mut().zip(Dimension::ALL) {
        *slot = upsert_identifier(&mut *tx, dimension, origin.id_for(dimension)).await?;
    }
    let [author_id, community_id, channel_id] = ids;

    let result = sqlx::query(
        r"
        INSERT INTO urls (url, author_id, community_id, channel_id, status_code)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(url) DO NOTHING
        ",
    )
    .bind(url)
    .bind(author_id)
    .bind(community_id)
    .bind(channel_id)
    .bind(status_code)
    .execute(&mut *tx)
    .await
    .context("Failed to insert archive record")?;

    tx.commit()
        .await
        .context("Failed to commit archive record")?;

    Ok(result.rows_affected() == 1)
}

// ========== Identifier Dimensions ==========

/// Return the surrogate key for an external identifier, creating it if needed.
async fn upsert_identifier(
    conn: &mut SqliteConnection,
    dimension: Dimension,
    external_id: &str,
) -> Result<i64> {
    let table = dimension.table();

    sqlx::query(&format!(
        "INSERT INTO {table} (external_id) VALUES (?) ON CONFLICT(external_id) DO NOTHING"
    ))
    .bind(external_id)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Failed to upsert into {table}"))?;

    sqlx::query_scalar(&format!("SELECT id FROM {table} WHERE external_id = ?"))
        .bind(external_id)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("Failed to fetch id from {table}"))
}

// ========== Read Surface ==========

/// Count rows in each table.
pub async fn get_stats(pool: &SqlitePool) -> Result<CacheStats> {
    let (url_count, author_count, community_count, channel_count): (i64, i64, i64, i64) =
        sqlx::query_as(
            r"
            SELECT
                (SELECT COUNT(*) FROM urls),
                (SELECT COUNT(*) FROM authors),
                (SELECT COUNT(*) FROM communities),
                (SELECT COUNT(*) FROM channels)
            ",
        )
        .fetch_one(pool)
        .await
        .context("Failed to fetch cache stats")?;

    Ok(CacheStats {
        url_count,
        author_count,
        community_count,
        channel_count,
    })
}

const ENTRY_SELECT: &str = r"
    SELECT
        u.id, u.url,
        a.external_id AS author,
        g.external_id AS community,
        c.external_id AS channel,
        u.status_code, u.created_at
    FROM urls u
    JOIN authors a ON a.id = u.author_id
    JOIN communities g ON g.id = u.community_id
    JOIN channels c ON c.id = u.channel_id
";

/// List archive records newest first, with conjunctive filters.
///
/// A page shorter than `limit` is the last one.
pub async fn list_entries(
    pool: &SqlitePool,
    filter: &EntryFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Entry>> {
    let mut query = QueryBuilder::<Sqlite>::new(ENTRY_SELECT);
    push_entry_filters(&mut query, filter);
    query
        .push(" ORDER BY u.id DESC LIMIT ")
        .push_bind(limit.max(0))
        .push(" OFFSET ")
        .push_bind(offset.max(0));

    query
        .build_query_as::<Entry>()
        .fetch_all(pool)
        .await
        .context("Failed to list entries")
}

/// Count archive records matching the filters.
pub async fn count_entries(pool: &SqlitePool, filter: &EntryFilter) -> Result<i64> {
    let mut query = QueryBuilder::<Sqlite>::new(
        r"
        SELECT COUNT(*)
        FROM urls u
        JOIN authors a ON a.id = u.author_id
        JOIN communities g ON g.id = u.community_id
        JOIN channels c ON c.id = u.channel_id
        ",
    );
    push_entry_filters(&mut query, filter);

    query
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await
        .context("Failed to count entries")
}

/// Append a WHERE clause with one predicate per non-empty filter.
fn push_entry_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &EntryFilter) {
    let mut separator = " WHERE ";

    let exact = [
        ("a.external_id", &filter.author),
        ("g.external_id", &filter.community),
        ("c.external_id", &filter.channel),
    ];
    for (column, value) in exact {
        if let Some(value) = non_empty(value) {
            query
                .push(separator)
                .push(column)
                .push(" = ")
                .push_bind(value.to_string());
            separator = " AND ";
        }
    }

    // instr() is case-sensitive, unlike LIKE
    if let Some(needle) = non_empty(&filter.url_contains) {
        query
            .push(separator)
            .push("instr(u.url, ")
            .push_bind(needle.to_string())
            .push(") > 0");
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
