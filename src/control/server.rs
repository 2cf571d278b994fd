use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;

use super::api;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;

/// Configuration for the control server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            dev_mode: false,
        }
    }
}

impl ServerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            dev_mode: false,
        }
    }
}

/// Build the full application router.
pub fn build_router(orchestrator: Arc<Orchestrator>) -> Router {
    api::api_router().with_state(orchestrator)
}

/// Start the control server and run until Ctrl+C.
pub async fn start_server(config: ServerConfig, orchestrator: Arc<Orchestrator>) -> Result<()> {
    if !orchestrator.has_password() {
        tracing::warn!("no administrator password configured; administrative calls will be rejected");
    }

    let mut app = build_router(orchestrator);

    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, dev_mode = config.dev_mode, "dockhand listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
