use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chat_link_keeper::admission::UrlFilter;
use chat_link_keeper::archiver::{candidate_queue, ArchiveWorker};
use chat_link_keeper::config::Config;
use chat_link_keeper::db::Database;
use chat_link_keeper::ingress::Ingress;
use chat_link_keeper::wayback::WaybackClient;
use chat_link_keeper::web;

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            error!("Fatal error: {e:#}");
            1
        }
    };
    // A pending stdin read holds a blocking thread that would stall runtime teardown
    std::process::exit(code);
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    info!("Starting chat-link-keeper");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        database = %config.database_path.display(),
        queue_capacity = config.queue_capacity,
        save_interval_secs = config.save_interval.as_secs(),
        "Configuration loaded"
    );

    let db = Database::new(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let filter = UrlFilter::new(&config)?;
    let wayback = WaybackClient::new(&config)?;
    let shutdown = CancellationToken::new();
    let (sender, receiver) = candidate_queue(config.queue_capacity);

    let worker = ArchiveWorker::new(&config, db.clone(), wayback);
    let worker_shutdown = shutdown.clone();
    let mut worker_handle =
        tokio::spawn(async move { worker.run(receiver, worker_shutdown).await });

    let web_handle = match config.web_addr() {
        Some(addr) if config.web_enabled => {
            let web_db = db.clone();
            let web_shutdown = shutdown.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = web::serve(addr, web_db, web_shutdown).await {
                    error!("Web server error: {e:#}");
                }
            }))
        }
        _ => None,
    };

    // Without an ingress the sender is held here, so the worker waits for
    // shutdown instead of seeing a closed queue.
    let (ingress_handle, _idle_sender) = if config.ingress_stdin {
        let ingress = Ingress::new(&config, filter, sender);
        let ingress_shutdown = shutdown.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = ingress.run_stdin(&ingress_shutdown).await {
                error!("Ingress error: {e:#}");
            }
        });
        (Some(handle), None)
    } else {
        info!("Stdin ingress disabled");
        (None, Some(sender))
    };

    // A worker failure means the cache can no longer be trusted; stop everything.
    let finished = tokio::select! {
        () = shutdown_signal() => None,
        result = &mut worker_handle => Some(result),
    };
    let worker_result = if let Some(result) = finished {
        result
    } else {
        info!("Shutting down...");
        shutdown.cancel();
        worker_handle.await
    };
    shutdown.cancel();

    if let Some(handle) = ingress_handle {
        handle.abort();
    }
    if let Some(handle) = web_handle {
        let _ = handle.await;
    }
    db.close().await;

    worker_result.context("Archive worker panicked")??;

    info!("Shutdown complete");

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,chat_link_keeper=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
