use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::db::{count_entries, get_stats, list_entries, Entry, EntryFilter};

pub const DEFAULT_PAGE_SIZE: i64 = 100;
pub const MAX_PAGE_SIZE: i64 = 500;

/// Create the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health))
        .route("/api/stats", get(stats))
        .route("/api/entries", get(entries))
}

async fn health() -> &'static str {
    "OK"
}

async fn stats(State(state): State<AppState>) -> Response {
    match get_stats(state.db.pool()).await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            tracing::error!("Failed to fetch stats: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EntriesParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub author: Option<String>,
    pub community: Option<String>,
    pub channel: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntriesPage {
    pub entries: Vec<Entry>,
    pub limit: i64,
    pub offset: i64,
    /// Number of entries matching the filters across all pages.
    pub total: i64,
    /// A full page means there may be another one.
    pub has_more: bool,
}

async fn entries(State(state): State<AppState>, Query(params): Query<EntriesParams>) -> Response {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0).max(0);
    let filter = EntryFilter {
        author: params.author,
        community: params.community,
        channel: params.channel,
        url_contains: params.search,
    };

    let result = tokio::try_join!(
        list_entries(state.db.pool(), &filter, limit, offset),
        count_entries(state.db.pool(), &filter),
    );

    match result {
        Ok((entries, total)) => {
            let has_more = entries.len() as i64 == limit;
            Json(EntriesPage {
                entries,
                limit,
                offset,
                total,
                has_more,
            })
            .into_response()
        }
        Err(e) => {
            tracing::error!("Failed to list entries: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response()
        }
    }
}
