use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{CloneState, Grant, Orchestrator};
use crate::authority::Scope;
use crate::command::{Template, Variables, recipes};
use crate::errors::{ComposerError, ComposerResult};
use crate::registry::DeploymentRecord;

/// Per-call knobs for token-gated actions. Unset values fall back to
/// `[defaults]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOptions {
    /// Lines of log to return (`log`).
    pub tail: Option<u32>,
    /// Seconds compose waits for containers to stop.
    pub timeout: Option<u32>,
    /// Hard-reset the working tree before pulling (`pull`).
    pub reset: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentInfo {
    pub id: String,
    pub name: Option<String>,
    pub directory: Option<String>,
    pub repository: Option<String>,
    pub state: CloneState,
    /// Checked-out commit of the working tree, when it is a git repository.
    pub commit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ActionOutput {
    Info(DeploymentInfo),
    Output(String),
}

impl ActionOutput {
    pub fn text(&self) -> Option<&str> {
        match self {
            ActionOutput::Output(text) => Some(text),
            ActionOutput::Info(_) => None,
        }
    }
}

/// The recipe for a command-backed scope. `None` for `info`, which runs
/// nothing.
fn recipe(scope: Scope, options: &ActionOptions) -> Option<&'static [Template]> {
    let recipe = match scope {
        Scope::Info => return None,
        Scope::Clone => recipes::CLONE,
        Scope::Pull if options.reset => recipes::PULL_WITH_RESET,
        Scope::Pull => recipes::PULL,
        Scope::Update => recipes::UPDATE,
        Scope::Start => recipes::START,
        Scope::Stop => recipes::STOP,
        Scope::Restart => recipes::RESTART,
        Scope::Reset => recipes::RESET,
        Scope::Destroy => recipes::DESTROY,
        Scope::Status => recipes::STATUS,
        Scope::Log => recipes::LOG,
    };
    Some(recipe)
}

fn required_state(scope: Scope) -> CloneState {
    match scope {
        Scope::Clone => CloneState::NotCloned,
        _ => CloneState::Cloned,
    }
}

fn non_empty(
    id: &str,
    field: &'static str,
    value: Option<&str>,
) -> Result<String, ComposerError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(ComposerError::MissingField {
            id: id.to_string(),
            field,
        }),
    }
}

fn head_commit(worktree: &Path) -> Option<String> {
    let repo = git2::Repository::open(worktree).ok()?;
    let commit = repo.head().ok()?.peel_to_commit().ok()?;
    Some(commit.id().to_string())
}

impl Orchestrator {
    /// Run the action `grant` authorizes.
    ///
    /// The record is reloaded from the registry rather than trusted from
    /// token-issue time, then checked for the fields and clone state the
    /// action needs before any command runs.
    pub async fn perform(&self, grant: &Grant, options: ActionOptions) -> ComposerResult<ActionOutput> {
        let id = grant.id();
        let scope = grant.scope();
        let record = self.record(id).await?;

        let Some(recipe) = recipe(scope, &options) else {
            return Ok(ActionOutput::Info(self.info(id, record).await));
        };

        let vars = self.action_variables(id, &record, &options)?;
        self.layout.clone_state(id).require(required_state(scope))?;

        tracing::info!(deployment = %id, action = %scope, "running action");
        let output = self.run_recipe(id, recipe, &vars).await?;
        tracing::info!(deployment = %id, action = %scope, "action complete");
        Ok(ActionOutput::Output(output))
    }

    /// Authorize `token` for `scope` and run it.
    pub async fn run(
        &self,
        token: &str,
        scope: Scope,
        options: ActionOptions,
    ) -> ComposerResult<ActionOutput> {
        let grant = self.authorize(token, scope)?;
        self.perform(&grant, options).await
    }

    /// Variables for recipes that touch the repository or compose project.
    /// Fails before anything runs if the record is incomplete or its
    /// directory escapes the working tree.
    pub(super) fn action_variables(
        &self,
        id: &str,
        record: &DeploymentRecord,
        options: &ActionOptions,
    ) -> ComposerResult<Variables> {
        let repository = non_empty(id, "repository", record.repository.as_deref())?;
        let directory = non_empty(id, "directory", record.directory.as_deref())?;
        let compose_dir = self.layout.compose_dir(id, &directory)?;

        let tail = options.tail.unwrap_or(self.defaults.log_tail);
        let timeout = options.timeout.unwrap_or(self.defaults.stop_timeout);

        Ok(self
            .variables(id)
            .set("repository", repository)
            .set("directory", directory)
            .set("compose_dir", compose_dir.display().to_string())
            .set("tail", tail.to_string())
            .set("timeout", timeout.to_string()))
    }

    async fn info(&self, id: &str, record: DeploymentRecord) -> DeploymentInfo {
        let state = self.layout.clone_state(id);
        let commit = match state {
            CloneState::Cloned => {
                let worktree: PathBuf = self.layout.worktree(id);
                tokio::task::spawn_blocking(move || head_commit(&worktree))
                    .await
                    .ok()
                    .flatten()
            }
            CloneState::NotCloned => None,
        };
        DeploymentInfo {
            id: id.to_string(),
            name: record.name,
            directory: record.directory,
            repository: record.repository,
            state,
            commit,
        }
    }
}
