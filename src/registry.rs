//! Deployment registry: one JSON document mapping id → record.
//!
//! Every read loads the whole document (empty if none has been written yet)
//! and every write replaces it. Writes go to a sibling temp file that is
//! then renamed over the document, so readers never observe a partial
//! write.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of generated deployment ids.
pub const ID_LENGTH: usize = 8;
const ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A deployment descriptor. Fields are replaced wholesale on edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub name: Option<String>,
    /// Sub-path inside the cloned repository used as the compose project root.
    pub directory: Option<String>,
    /// Remote git URL cloned with the deployment's key.
    pub repository: Option<String>,
}

pub type Deployments = BTreeMap<String, DeploymentRecord>;

/// Synchronous access to the registry document.
#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
}

impl Registry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Deployments> {
        if !self.path.exists() {
            return Ok(Deployments::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Deployments::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    pub fn write(&self, deployments: &Deployments) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(deployments)?;
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, content)
            .with_context(|| format!("Failed to write {}", staging.display()))?;
        std::fs::rename(&staging, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    /// Read, apply `f`, and write the result back.
    pub fn update<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Deployments) -> Result<R>,
    {
        let mut deployments = self.read()?;
        let result = f(&mut deployments)?;
        self.write(&deployments)?;
        Ok(result)
    }
}

/// Async handle to the registry.
///
/// Runs all file access on tokio's blocking pool. Cloning the handle is
/// cheap; clones share the same document.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    inner: Arc<Registry>,
}

impl RegistryHandle {
    pub fn new(registry: Registry) -> Self {
        Self {
            inner: Arc::new(registry),
        }
    }

    /// Run a closure against the registry on a blocking thread.
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Registry) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let registry = self.inner.clone();
        tokio::task::spawn_blocking(move || f(&registry))
            .await
            .context("Registry task panicked")?
    }

    pub async fn read(&self) -> Result<Deployments> {
        self.call(|registry| registry.read()).await
    }

    pub async fn write(&self, deployments: Deployments) -> Result<()> {
        self.call(move |registry| registry.write(&deployments)).await
    }

    pub async fn update<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Deployments) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.call(move |registry| registry.update(f)).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<DeploymentRecord>> {
        let id = id.to_string();
        self.call(move |registry| Ok(registry.read()?.remove(&id))).await
    }
}

/// Draw a random deployment id that is not already a key of `existing`.
pub fn generate_id(existing: &Deployments) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let id: String = (0..ID_LENGTH)
            .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
            .collect();
        if !existing.contains_key(&id) {
            return id;
        }
    }
}
