use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

use request_lifecycle::api::handlers::AppStateInner;
use request_lifecycle::api::routes::{create_router, LifecycleLayers};
use request_lifecycle::config::Config;
use request_lifecycle::logging;

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Starting graceful shutdown...");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize logging
    logging::init_tracing(&config.logging.filter);

    info!(
        "Starting Request Lifecycle Service v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!(
        max_requests = config.rate_limit.max_requests,
        window_seconds = config.rate_limit.window_seconds,
        "Configuration loaded successfully"
    );

    let state = Arc::new(AppStateInner::new(
        config.server.instance_id.clone(),
        config.request_timeout(),
    ));
    let layers =
        LifecycleLayers::new(config.rate_limit).context("Failed to build request layers")?;
    let app = create_router(state, layers);

    // Start server
    let addr = config.server_address();
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind server")?;

    info!("Server listening on {}", addr);

    // Serve with graceful shutdown; connect info feeds the client IP
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shutdown complete");

    Ok(())
}
