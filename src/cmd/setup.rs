//! Data directory setup: `dockhand init`.

use anyhow::{Context, Result};
use dockhand::authority::Secret;
use dockhand::config::Settings;

pub fn cmd_init(settings: &Settings) -> Result<()> {
    let storage = &settings.storage;
    let deployments = storage.deployments_dir();
    std::fs::create_dir_all(&deployments)
        .with_context(|| format!("Failed to create {}", deployments.display()))?;

    if settings.auth.secret.is_some() {
        println!("Signing secret is configured explicitly; nothing written.");
    } else {
        Secret::load_or_generate(&storage.secret_path())?;
        println!("Signing secret stored in {}", storage.secret_path().display());
    }

    println!(
        "Initialized dockhand data directory at {}",
        storage.data_dir.display()
    );
    if settings.auth.password.as_deref().is_none_or(str::is_empty) {
        println!("Set DOCKHAND_PASSWORD before serving; administrative calls are rejected without it.");
    }
    Ok(())
}
