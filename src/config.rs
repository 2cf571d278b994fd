//! Layered configuration for dockhand.
//!
//! Values are resolved in order: built-in defaults, then `dockhand.toml`,
//! then environment variables, then CLI flags (applied by the binary).
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8000
//!
//! [storage]
//! data_dir = "/opt/dockhand"
//!
//! [auth]
//! password_delay_ms = 1000
//! access_token_validity = 600
//! permanent_token_validity = 315360000  # or "never"
//!
//! [tools]
//! git = ["git"]
//! compose = ["docker", "compose"]
//! keygen = ["ssh-keygen"]
//!
//! [defaults]
//! log_tail = 100
//! stop_timeout = 3
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "dockhand.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub defaults: DefaultsSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    /// Holds `database.json`, `property.json` and `deployments/`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("dockhand"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StorageSection {
    pub fn registry_path(&self) -> PathBuf {
        self.data_dir.join("database.json")
    }

    pub fn secret_path(&self) -> PathBuf {
        self.data_dir.join("property.json")
    }

    pub fn deployments_dir(&self) -> PathBuf {
        self.data_dir.join("deployments")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSection {
    /// Administrator password. Usually supplied through the environment.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Hex-encoded signing secret. When unset, one is loaded from or
    /// generated into `property.json`.
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,
    /// Fixed delay before every password comparison.
    #[serde(default = "default_password_delay_ms")]
    pub password_delay_ms: u64,
    /// Lifetime of the all-scope tokens handed out by `access`/`fetch`.
    #[serde(
        default = "default_access_token_validity",
        deserialize_with = "deserialize_seconds"
    )]
    pub access_token_validity: u64,
    /// Lifetime of tokens handed out by `token` when the caller gives
    /// none. `None` (or `"never"`) issues never-expiring tokens.
    #[serde(default, deserialize_with = "deserialize_validity")]
    pub permanent_token_validity: Option<u64>,
}

fn default_password_delay_ms() -> u64 {
    1000
}

fn default_access_token_validity() -> u64 {
    600
}

/// A validity as written in `dockhand.toml`: seconds, or a word.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawValidity {
    Seconds(i64),
    Word(String),
}

impl RawValidity {
    fn into_text(self) -> String {
        match self {
            RawValidity::Seconds(secs) => secs.to_string(),
            RawValidity::Word(word) => word,
        }
    }
}

fn deserialize_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let text = RawValidity::deserialize(deserializer)?.into_text();
    parse_seconds(&text).map_err(|e| serde::de::Error::custom(format!("{:#}", e)))
}

fn deserialize_validity<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = RawValidity::deserialize(deserializer)?.into_text();
    parse_validity(&text).map_err(|e| serde::de::Error::custom(format!("{:#}", e)))
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            password: None,
            secret: None,
            password_delay_ms: default_password_delay_ms(),
            access_token_validity: default_access_token_validity(),
            permanent_token_validity: None,
        }
    }
}

impl AuthSection {
    pub fn password_delay(&self) -> Duration {
        Duration::from_millis(self.password_delay_ms)
    }

    pub fn access_validity(&self) -> Duration {
        Duration::from_secs(self.access_token_validity)
    }

    pub fn permanent_validity(&self) -> Option<Duration> {
        self.permanent_token_validity.map(Duration::from_secs)
    }
}

/// Program plus leading arguments for each external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsSection {
    #[serde(default = "default_git")]
    pub git: Vec<String>,
    #[serde(default = "default_compose")]
    pub compose: Vec<String>,
    #[serde(default = "default_keygen")]
    pub keygen: Vec<String>,
}

fn default_git() -> Vec<String> {
    vec!["git".to_string()]
}

fn default_compose() -> Vec<String> {
    vec!["docker".to_string(), "compose".to_string()]
}

fn default_keygen() -> Vec<String> {
    vec!["ssh-keygen".to_string()]
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            git: default_git(),
            compose: default_compose(),
            keygen: default_keygen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsSection {
    #[serde(default = "default_log_tail")]
    pub log_tail: u32,
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: u32,
}

fn default_log_tail() -> u32 {
    100
}

fn default_stop_timeout() -> u32 {
    3
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            log_tail: default_log_tail(),
            stop_timeout: default_stop_timeout(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from `./dockhand.toml` when `path` is
    /// `None`. An explicit path must exist; the default one may be absent.
    /// Environment overrides are applied afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Parse a config file without applying environment overrides.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|key| lookup(*key));

        if let Some(password) = first(&["DOCKHAND_PASSWORD", "PASSWORD"]) {
            self.auth.password = Some(password);
        }
        if let Some(secret) = first(&["DOCKHAND_SECRET", "SECRET"]) {
            self.auth.secret = Some(secret);
        }
        if let Some(dir) = lookup("DOCKHAND_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(port) = lookup("DOCKHAND_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid DOCKHAND_PORT '{}'", port))?;
        }
        if let Some(validity) = lookup("ACCESS_TOKEN_VALIDITY") {
            self.auth.access_token_validity = parse_seconds(&validity)
                .with_context(|| format!("Invalid ACCESS_TOKEN_VALIDITY '{}'", validity))?;
        }
        if let Some(validity) = lookup("PERMANENT_TOKEN_VALIDITY") {
            self.auth.permanent_token_validity = parse_validity(&validity)
                .with_context(|| format!("Invalid PERMANENT_TOKEN_VALIDITY '{}'", validity))?;
        }
        Ok(())
    }
}

/// Parse a positive number of seconds.
pub fn parse_seconds(value: &str) -> Result<u64> {
    let secs: u64 = value.trim().parse().context("expected a number of seconds")?;
    if secs == 0 {
        anyhow::bail!("validity must be positive");
    }
    Ok(secs)
}

/// Parse a token lifetime in seconds; `never` means no expiry. Zero is
/// rejected so it cannot be mistaken for either meaning.
pub fn parse_validity(value: &str) -> Result<Option<u64>> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("never") {
        return Ok(None);
    }
    parse_seconds(value)
        .map(Some)
        .context("use 'never' for tokens that do not expire")
}
