//! Voltstream Server — EV Charging Session Platform
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;

use tokio::sync::watch;
use tracing;
use tracing_subscriber::{fmt, EnvFilter};

use voltstream_core::config::AppConfig;
use voltstream_core::error::AppError;
use voltstream_core::types::id::StationId;
use voltstream_gateway::transport::WebSocketConnector;
use voltstream_gateway::ProtocolGateway;
use voltstream_realtime::Broadcaster;
use voltstream_session::{
    spawn_bridge, spawn_sweeper, ConnectorOracle, SessionRegistry, SessionService,
};
use voltstream_store::{
    InMemoryConnectorStore, InMemorySessionStore, LoggingNotifier, LoggingPaymentProvider,
};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("VOLTSTREAM_ENV").unwrap_or_else(|_| "default".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Voltstream v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Protocol gateway + station connections ───────────
    tracing::info!(
        "Initializing protocol gateway (endpoint: {})...",
        config.gateway.station_endpoint
    );
    let connector = Arc::new(WebSocketConnector::new(&config.gateway.station_endpoint));
    let (gateway, inbound_rx) = ProtocolGateway::new(config.gateway.clone(), connector);
    let gateway = Arc::new(gateway);

    for station in &config.gateway.stations {
        gateway.register_station(StationId::new(station));
    }
    tracing::info!(
        "Protocol gateway initialized ({} stations registered)",
        config.gateway.stations.len()
    );

    // ── Step 2: Stores and collaborators ─────────────────────────
    let session_store = Arc::new(InMemorySessionStore::new());
    let connector_store = Arc::new(InMemoryConnectorStore::new());
    let payment = Arc::new(LoggingPaymentProvider);
    let notifier = Arc::new(LoggingNotifier);

    // ── Step 3: Session registry + connector oracle ──────────────
    let registry = Arc::new(SessionRegistry::new(config.session.clone()));
    let oracle = Arc::new(ConnectorOracle::new(connector_store));

    // ── Step 4: Real-time broadcaster ────────────────────────────
    let broadcaster = Arc::new(Broadcaster::new(config.realtime.clone()));
    broadcaster.set_snapshot_source(Arc::clone(&registry) as _);
    tracing::info!("Broadcaster initialized");

    // ── Step 5: Session service ──────────────────────────────────
    let sessions = Arc::new(SessionService::new(
        config.session.clone(),
        Arc::clone(&registry),
        Arc::clone(&oracle),
        Arc::clone(&gateway),
        session_store,
        Arc::clone(&broadcaster),
        payment,
        notifier,
    ));

    // ── Step 6: Shutdown channel ─────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Step 7: Background tasks ─────────────────────────────────
    let bridge_handle = spawn_bridge(
        Arc::clone(&sessions),
        Arc::clone(&broadcaster),
        inbound_rx,
        shutdown_rx.clone(),
    );
    let sweeper_handle = spawn_sweeper(Arc::clone(&sessions), shutdown_rx.clone());
    tracing::info!("Station event bridge and session sweeper started");

    // ── Step 8: Build and start HTTP server ──────────────────────
    tracing::info!(
        "Starting HTTP server on {}:{}...",
        config.server.host,
        config.server.port
    );

    let app_state = voltstream_api::state::AppState {
        config: Arc::new(config.clone()),
        sessions: Arc::clone(&sessions),
        broadcaster: Arc::clone(&broadcaster),
        gateway: Arc::clone(&gateway),
    };

    let app = voltstream_api::router::build_router(app_state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("Voltstream server listening on {}", addr);

    // ── Step 9: Graceful shutdown ────────────────────────────────
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
    });

    server
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    // ── Step 10: Wait for background tasks ───────────────────────
    tracing::info!("Waiting for background tasks to complete...");
    gateway.shutdown();

    let grace = std::time::Duration::from_secs(config.server.shutdown_grace_seconds);
    let _ = tokio::time::timeout(grace, bridge_handle).await;
    let _ = tokio::time::timeout(grace, sweeper_handle).await;

    tracing::info!("Voltstream server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
