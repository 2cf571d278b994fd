//! CLI command implementations.
//!
//! | Module        | Commands handled  |
//! |---------------|-------------------|
//! | `serve`       | `Serve`           |
//! | `setup`       | `Init`            |
//! | `deployments` | `Token`, `List`   |

pub mod deployments;
pub mod serve;
pub mod setup;

pub use deployments::{cmd_list, cmd_token};
pub use serve::cmd_serve;
pub use setup::cmd_init;

use std::sync::Arc;

use anyhow::Result;
use dockhand::command::ProcessExecutor;
use dockhand::config::Settings;
use dockhand::orchestrator::Orchestrator;

/// Build the orchestrator against real processes.
pub fn orchestrator(settings: &Settings) -> Result<Orchestrator> {
    Orchestrator::from_settings(settings, Arc::new(ProcessExecutor))
}
