// Main entry point - Wiring and server setup
use std::{net::SocketAddr, sync::Arc, time::Instant};

use telemetry_ingest::infrastructure::config::{LoggingSettings, load_app_config};
use telemetry_ingest::infrastructure::sqlite_repository::SqliteRepository;
use telemetry_ingest::presentation::app_state::AppState;
use telemetry_ingest::presentation::router::build_router;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = load_app_config()?;

    // Initialize tracing
    init_tracing(&config.logging);

    // Create repository (infrastructure layer)
    let repository = Arc::new(SqliteRepository::connect(&config.storage).await?);

    // Create services and application state
    let state = Arc::new(AppState::new(repository.clone(), &config));

    // Forget rate-limit partitions whose window has passed
    let limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(limiter.window());
        loop {
            ticker.tick().await;
            let purged = limiter.purge_expired(Instant::now());
            if purged > 0 {
                tracing::debug!(
                    purged,
                    tracked = limiter.tracked_partitions(),
                    "Purged idle rate-limit partitions"
                );
            }
        }
    });

    let router = build_router(state);

    // Start server
    let addr = config.server.socket_addr()?;
    tracing::info!(%addr, "Starting telemetry-ingest service");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    repository.close().await;
    tracing::info!("Telemetry-ingest service stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if logging.json {
        builder.json().with_current_span(true).init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received");
}
