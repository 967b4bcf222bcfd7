//! CRM Sync REST API Server
//!
//! This binary starts the REST API that drives the TalkBI client import and
//! single-client sync.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crm_core::{DbConfig, ProgressStore, load_settings};
use crm_db::ProgressBackend;
use crm_talkbi::TalkbiClient;

use crm_server::{AppState, ServerConfig, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parse command line arguments
    let config = ServerConfig::parse();

    let settings = load_settings(config.config.clone())
        .context("Failed to load crm-sync.toml")?
        .unwrap_or_default();

    // Connect to database
    info!("Connecting to database...");
    let db_config = DbConfig::default();
    let pool = PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    info!("Database connection established");

    // Initialize TalkBI client
    let base_url = config
        .talkbi_base_url
        .clone()
        .or_else(|| settings.talkbi.base_url.clone())
        .context("TalkBI base URL not set: use TALKBI_BASE_URL or [talkbi] base_url")?;
    let talkbi = TalkbiClient::new(&base_url, &config.talkbi_token)
        .context("Failed to initialize TalkBI client")?;

    // Progress backend
    let backend_kind = config.progress_backend.unwrap_or(settings.progress.backend);
    let progress_file = config
        .progress_file
        .clone()
        .or_else(|| settings.progress.path.clone());
    let progress = ProgressBackend::open(backend_kind, &pool, progress_file)
        .context("Failed to open progress store")?;
    info!(backend = progress.name(), "Progress store ready");

    let previous = progress.read().await;
    if previous.is_running {
        warn!(
            phase = %previous.phase,
            processed = previous.processed_totally,
            "Progress record says an import is running; reset it if that run is gone"
        );
    }

    // Create shutdown token for graceful shutdown
    let shutdown_token = CancellationToken::new();

    // Create application state
    let app_state = AppState::new(
        pool,
        talkbi,
        progress,
        settings.import_config(),
        shutdown_token.clone(),
    );

    // Build router
    let app = create_router(app_state, &config.cors_origins);

    // Bind to address
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid address")?;

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Starting CRM sync API on http://{}", addr);
    info!("Swagger UI available at http://{}/swagger-ui", addr);

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");

    // A running import records itself as cancelled at its next check point
    shutdown_token.cancel();

    tokio::time::sleep(Duration::from_secs(2)).await;
}
