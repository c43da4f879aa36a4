use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ingestor_core::{load_config, validate_config, SimulatedItemProcessor};
use ingestor_server::{api::create_router, state::AppState};

/// Environment variable naming the configuration file
const CONFIG_ENV: &str = "INGESTOR_CONFIG";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let scheduler = &config.scheduler;
    info!("Configuration loaded successfully");
    info!(
        "Batch size: {}, max concurrent items: {}, min dispatch interval: {}ms",
        scheduler.batch_size, scheduler.max_concurrent_items, scheduler.min_dispatch_interval_ms
    );

    // Create item processor
    let processor = Arc::new(SimulatedItemProcessor::new(scheduler.item_latency()));
    info!(
        "Using simulated item processor ({}ms per item)",
        scheduler.item_latency_ms
    );

    // Create app state (registry, queue, rate gate, limiter, dispatcher)
    let autostart = scheduler.autostart;
    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::build(config, processor));

    // Start dispatcher
    if autostart {
        state.dispatcher().start().await;
    } else {
        info!("Dispatcher autostart disabled; start it via POST /api/v1/scheduler/start");
    }

    // Create router
    let app = create_router(Arc::clone(&state));

    // Start server
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop dispatcher if running
    info!("Server shutting down...");
    if state.dispatcher().is_running() {
        info!("Stopping dispatcher...");
        state.dispatcher().stop().await;
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
}
