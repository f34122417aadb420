//! Shelfplay Player - Main entry point
//!
//! Boots the coordinator with SQLite-backed session log and state blob,
//! the simulated native engine and (when configured) the HTTP progress
//! server, then serves the control API until shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use shelfplay_common::events::PlayerEvent;
use shelfplay_player::api;
use shelfplay_player::config::{self, ConfigOverrides, CoordinatorSettings};
use shelfplay_player::coordinator::{bus, Collaborators, Coordinator, EventSource};
use shelfplay_player::db::{self, SqliteSessionLog, SqliteStateStore};
use shelfplay_player::services::{
    HttpProgressSync, OfflineProgressSync, PlayerStateStore, ProgressSync, SimulatedNativeEngine,
};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for shelfplay-player
#[derive(Parser, Debug)]
#[command(name = "shelfplay-player")]
#[command(about = "Audiobook player state coordinator")]
#[command(version)]
struct Args {
    /// Bootstrap TOML file
    #[arg(short, long, env = "SHELFPLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "SHELFPLAY_PORT")]
    port: Option<u16>,

    /// SQLite database path (overrides config file)
    #[arg(short, long, env = "SHELFPLAY_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let bootstrap = config::load_bootstrap(
        args.config.as_deref(),
        ConfigOverrides {
            database_path: args.database,
            port: args.port,
        },
    )
    .context("Failed to load configuration")?;

    // Initialize tracing; RUST_LOG wins over the config file level
    let default_filter = format!(
        "shelfplay_player={},tower_http=debug",
        bootstrap.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting shelfplay-player v{} ({}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Database: {}", bootstrap.database_path.display());

    // Database and runtime settings
    let pool = db::connect(&bootstrap.database_path)
        .await
        .context("Failed to open database")?;
    db::init_schema(&pool)
        .await
        .context("Failed to initialize database schema")?;
    let settings = CoordinatorSettings::load(&pool, &bootstrap.user_id)
        .await
        .context("Failed to load coordinator settings")?;

    // Collaborators
    let (sender, inbox) = bus::channel();
    let sync: Arc<dyn ProgressSync> = match &bootstrap.server_url {
        Some(url) => {
            info!("Progress server: {}", url);
            Arc::new(
                HttpProgressSync::new(url.clone(), bootstrap.api_token.clone())
                    .context("Failed to build progress sync client")?,
            )
        }
        None => {
            info!("No progress server configured, running offline");
            Arc::new(OfflineProgressSync)
        }
    };
    let store = Arc::new(SqliteStateStore::new(pool.clone()));
    let collaborators = Collaborators {
        native: Arc::new(SimulatedNativeEngine::new(sender.clone())),
        sessions: Arc::new(SqliteSessionLog::new(pool.clone())),
        sync,
        store: store.clone(),
    };

    let coordinator = Coordinator::new(inbox, sender, collaborators, settings).spawn();
    info!("Player coordinator initialized");

    // Cold start: seed from the persisted blob
    let snapshot = match store.load().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Ignoring unreadable player state: {}", e);
            None
        }
    };
    coordinator.dispatch_from(EventSource::Lifecycle, PlayerEvent::RestoreState { snapshot });

    // Build the application router
    let app = api::create_router(api::AppState {
        coordinator: coordinator.clone(),
        port: bootstrap.port,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], bootstrap.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Flush session and state blob the same way the OS backgrounding would
    coordinator.dispatch_from(EventSource::Lifecycle, PlayerEvent::AppBackgrounded);
    coordinator.settled().await;
    pool.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
