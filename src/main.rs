//! notify-hub server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints and drains
//! live connections on shutdown.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use notify_hub::api;
use notify_hub::app_state::AppState;
use notify_hub::config::{HubConfig, LogFormat};
use notify_hub::service;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = HubConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting notify-hub");

    // Build the hub and start its heartbeat monitor
    let hub = service::init(config.clone());

    // Build router
    let app = api::build_app(
        AppState {
            hub: Arc::clone(&hub),
        },
        config.http_request_timeout,
    );

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    // Drain the hub as soon as the signal arrives so upgraded sockets do not
    // hold the server open.
    let draining_hub = Arc::clone(&hub);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            draining_hub.shutdown().await;
        })
        .await
        .context("http server")?;

    hub.shutdown().await;
    tracing::info!("notify-hub stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
