//! Control API server command: `dockhand serve`.

use std::sync::Arc;

use anyhow::{Context, Result};
use dockhand::config::Settings;
use dockhand::control::{ServerConfig, start_server};

pub async fn cmd_serve(settings: &Settings, dev: bool) -> Result<()> {
    let deployments = settings.storage.deployments_dir();
    std::fs::create_dir_all(&deployments)
        .with_context(|| format!("Failed to create {}", deployments.display()))?;

    let orchestrator = super::orchestrator(settings)?;
    tracing::info!(data_dir = %settings.storage.data_dir.display(), "loaded settings");

    let config = ServerConfig {
        dev_mode: dev,
        ..ServerConfig::from_settings(settings)
    };
    start_server(config, Arc::new(orchestrator)).await
}
