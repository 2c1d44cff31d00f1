mod routes;

pub use routes::{EntriesPage, EntriesParams, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::db::Database;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

/// Build the read-only JSON API.
pub fn create_app(state: AppState) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the JSON API until shutdown.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr, db: Database, shutdown: CancellationToken) -> Result<()> {
    let app = create_app(AppState { db });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind web server")?;

    info!(addr = %addr, "Starting HTTP web server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Web server error")?;

    Ok(())
}
