//! Deployment lifecycle orchestrator.
//!
//! The `Orchestrator` is the application context: it owns the registry
//! handle, the token authority, the password guard, the on-disk layout
//! and the executor, and every API handler goes through it.
//!
//! Callers prove who they are before anything runs:
//! - [`Orchestrator::authenticate`] checks the administrator password and
//!   yields an [`AdminSession`], required by every registry-management call.
//! - [`Orchestrator::authorize`] validates a token for one scope and yields
//!   a [`Grant`] naming the deployment, required by [`Orchestrator::perform`].

mod actions;
pub mod layout;

#[cfg(test)]
pub(crate) mod testing;

pub use actions::{ActionOptions, ActionOutput, DeploymentInfo};
pub use layout::{CloneState, Layout};

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::authority::{self, Authority, Expiry, PasswordGuard, Scope, Secret};
use crate::command::{Executor, Toolchain, Variables, recipes, render_all, run_all};
use crate::config::{DefaultsSection, Settings};
use crate::errors::{AuthError, ComposerError, ComposerResult};
use crate::registry::{DeploymentRecord, Deployments, Registry, RegistryHandle, generate_id};

/// Proof that the caller supplied the administrator password.
#[derive(Debug)]
pub struct AdminSession {
    _private: (),
}

/// Proof that the caller holds a valid token for `scope` on deployment `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    id: String,
    scope: Scope,
}

impl Grant {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }
}

pub struct Orchestrator {
    registry: RegistryHandle,
    authority: Authority,
    password: PasswordGuard,
    layout: Layout,
    toolchain: Toolchain,
    executor: Arc<dyn Executor>,
    access_validity: Duration,
    permanent_validity: Option<Duration>,
    defaults: DefaultsSection,
}

impl Orchestrator {
    /// Build the context from settings. Loads the signing secret from
    /// `property.json`, generating it on first start, unless one is
    /// configured explicitly.
    pub fn from_settings(settings: &Settings, executor: Arc<dyn Executor>) -> anyhow::Result<Self> {
        let secret = match settings.auth.secret.as_deref() {
            Some(hex) => Secret::from_hex(hex).context("Invalid configured secret")?,
            None => Secret::load_or_generate(&settings.storage.secret_path())?,
        };
        let toolchain = Toolchain::new(&settings.tools)?;

        Ok(Self {
            registry: RegistryHandle::new(Registry::new(settings.storage.registry_path())),
            authority: Authority::new(secret),
            password: PasswordGuard::new(
                settings.auth.password.clone(),
                settings.auth.password_delay(),
            ),
            layout: Layout::new(settings.storage.deployments_dir()),
            toolchain,
            executor,
            access_validity: settings.auth.access_validity(),
            permanent_validity: settings.auth.permanent_validity(),
            defaults: settings.defaults.clone(),
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn has_password(&self) -> bool {
        self.password.is_configured()
    }

    // ── Authentication ────────────────────────────────────────────────

    pub async fn authenticate(&self, password: &str) -> Result<AdminSession, AuthError> {
        self.password.check(password).await?;
        Ok(AdminSession { _private: () })
    }

    /// A session for operators with direct access to the data directory,
    /// who could read the signing secret anyway. Used by the CLI.
    pub fn local_session(&self) -> AdminSession {
        AdminSession { _private: () }
    }

    pub fn authorize(&self, token: &str, scope: Scope) -> Result<Grant, AuthError> {
        let contents = self.authority.validate(token, &[scope])?;
        let id = authority::subject(&contents)?;
        Ok(Grant { id, scope })
    }

    // ── Registry management ───────────────────────────────────────────

    pub async fn list(&self, _session: &AdminSession) -> ComposerResult<Deployments> {
        self.registry.read().await.map_err(ComposerError::Registry)
    }

    /// Create an empty deployment with a fresh key pair and return its id.
    pub async fn create(&self, _session: &AdminSession) -> ComposerResult<String> {
        let existing = self.registry.read().await.map_err(ComposerError::Registry)?;
        let id = generate_id(&existing);

        let dir = self.layout.deployment_dir(&id);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let commands = render_all(recipes::KEYGEN, &self.toolchain, &self.variables(&id))?
            .into_iter()
            .map(|command| command.with_cwd(&dir))
            .collect::<Vec<_>>();
        run_all(self.executor.as_ref(), &commands).await?;

        let key = id.clone();
        self.registry
            .update(move |deployments| {
                deployments.entry(key).or_default();
                Ok(())
            })
            .await
            .map_err(ComposerError::Registry)?;

        tracing::info!(deployment = %id, "created deployment");
        Ok(id)
    }

    pub async fn fetch(&self, _session: &AdminSession, id: &str) -> ComposerResult<DeploymentRecord> {
        self.record(id).await
    }

    /// The deployment's public key, to be installed as a read-only deploy
    /// key on the git host.
    pub async fn public_key(&self, _session: &AdminSession, id: &str) -> ComposerResult<String> {
        self.record(id).await?;
        let path = self.layout.public_key(id);
        let key = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(key)
    }

    /// Issue a token for `scopes` on `id`. Without an explicit `validity`
    /// the configured permanent validity applies, and with none configured
    /// the token never expires.
    pub async fn issue_token(
        &self,
        _session: &AdminSession,
        id: &str,
        scopes: &[Scope],
        validity: Option<Duration>,
    ) -> ComposerResult<String> {
        self.record(id).await?;
        let expiry = Expiry::from_validity(validity.or(self.permanent_validity));
        tracing::info!(deployment = %id, scopes = ?scopes, "issued token");
        Ok(self.authority.issue(
            format!("Access token for {}", id),
            authority::deployment_payload(id),
            scopes.iter().map(Scope::as_str),
            expiry,
        ))
    }

    /// Issue a short-lived token carrying every scope.
    pub async fn access(&self, _session: &AdminSession, id: &str) -> ComposerResult<String> {
        self.record(id).await?;
        Ok(self.authority.issue(
            format!("Temporary access token for {}", id),
            authority::deployment_payload(id),
            Scope::ALL.iter().map(Scope::as_str),
            Expiry::after(self.access_validity),
        ))
    }

    /// Replace the record's fields wholesale.
    pub async fn modify(
        &self,
        _session: &AdminSession,
        id: &str,
        record: DeploymentRecord,
    ) -> ComposerResult<()> {
        let key = id.to_string();
        let found = self
            .registry
            .update(move |deployments| match deployments.get_mut(&key) {
                Some(slot) => {
                    *slot = record;
                    Ok(true)
                }
                None => Ok(false),
            })
            .await
            .map_err(ComposerError::Registry)?;

        if !found {
            return Err(ComposerError::NotFound { id: id.to_string() });
        }
        tracing::info!(deployment = %id, "modified deployment");
        Ok(())
    }

    /// Remove a deployment. Teardown and directory removal are best effort;
    /// the registry entry is removed whatever happens to them.
    pub async fn delete(&self, _session: &AdminSession, id: &str) -> ComposerResult<()> {
        let record = self.record(id).await?;

        if self.layout.clone_state(id) == CloneState::Cloned {
            if let Err(e) = self.teardown(id, &record).await {
                tracing::warn!(deployment = %id, error = %e, "teardown failed, continuing delete");
            }
        }

        let dir = self.layout.deployment_dir(id);
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            tracing::warn!(
                deployment = %id,
                path = %dir.display(),
                error = %e,
                "failed to remove deployment directory"
            );
        }

        let key = id.to_string();
        self.registry
            .update(move |deployments| {
                deployments.remove(&key);
                Ok(())
            })
            .await
            .map_err(ComposerError::Registry)?;

        tracing::info!(deployment = %id, "deleted deployment");
        Ok(())
    }

    async fn teardown(&self, id: &str, record: &DeploymentRecord) -> ComposerResult<String> {
        let vars = self.action_variables(id, record, &ActionOptions::default())?;
        self.run_recipe(id, recipes::DESTROY, &vars).await
    }

    // ── Shared helpers ────────────────────────────────────────────────

    async fn record(&self, id: &str) -> ComposerResult<DeploymentRecord> {
        self.registry
            .get(id)
            .await
            .map_err(ComposerError::Registry)?
            .ok_or_else(|| ComposerError::NotFound { id: id.to_string() })
    }

    /// Variables every recipe can reference.
    fn variables(&self, id: &str) -> Variables {
        Variables::new()
            .set("id", id)
            .set("path", self.layout.deployment_dir(id).display().to_string())
            .set("private_key", self.layout.private_key(id).display().to_string())
            .set("worktree", self.layout.worktree(id).display().to_string())
    }

    async fn run_recipe(
        &self,
        id: &str,
        recipe: &[crate::command::Template],
        vars: &Variables,
    ) -> ComposerResult<String> {
        let cwd = self.layout.deployment_dir(id);
        let commands = render_all(recipe, &self.toolchain, vars)?
            .into_iter()
            .map(|command| command.with_cwd(&cwd))
            .collect::<Vec<_>>();
        Ok(run_all(self.executor.as_ref(), &commands).await?)
    }
}
