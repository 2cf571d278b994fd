//! Offline deployment management: `dockhand token` and `dockhand list`.
//!
//! Both act directly on the data directory, so they need no password.

use std::time::Duration;

use anyhow::Result;
use dockhand::authority::Scope;
use dockhand::config::Settings;

pub async fn cmd_token(
    settings: &Settings,
    id: &str,
    scopes: &[String],
    validity: Option<u64>,
) -> Result<()> {
    let scopes = Scope::parse_list(scopes)?;
    let orchestrator = super::orchestrator(settings)?;
    let session = orchestrator.local_session();
    let token = orchestrator
        .issue_token(&session, id, &scopes, validity.map(Duration::from_secs))
        .await?;
    println!("{}", token);
    Ok(())
}

pub async fn cmd_list(settings: &Settings) -> Result<()> {
    let orchestrator = super::orchestrator(settings)?;
    let session = orchestrator.local_session();
    let deployments = orchestrator.list(&session).await?;

    if deployments.is_empty() {
        println!("No deployments.");
        return Ok(());
    }

    println!(
        "{:<10} {:<12} {:<20} {:<16} REPOSITORY",
        "ID", "STATE", "NAME", "DIRECTORY"
    );
    for (id, record) in &deployments {
        let state = match orchestrator.layout().clone_state(id) {
            dockhand::orchestrator::CloneState::Cloned => "cloned",
            dockhand::orchestrator::CloneState::NotCloned => "not cloned",
        };
        println!(
            "{:<10} {:<12} {:<20} {:<16} {}",
            id,
            state,
            record.name.as_deref().unwrap_or("-"),
            record.directory.as_deref().unwrap_or("-"),
            record.repository.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}
