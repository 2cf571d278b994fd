use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use rand::RngCore;
use serde_json::{Map, Value};

const SECRET_LEN: usize = 32;
const SECRET_KEY: &str = "secret";

/// Process-wide token signing key.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl Secret {
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn from_hex(value: &str) -> Result<Self> {
        let bytes = hex::decode(value.trim()).context("Secret is not valid hex")?;
        if bytes.is_empty() {
            anyhow::bail!("Secret is empty");
        }
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Read the secret from the property document at `path`, generating and
    /// persisting a new one if the document or its `secret` key is absent.
    /// Other keys in the document are preserved.
    pub fn load_or_generate(path: &Path) -> Result<Self> {
        let mut properties: Map<String, Value> = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            Map::new()
        };

        if let Some(existing) = properties.get(SECRET_KEY).and_then(Value::as_str) {
            return Self::from_hex(existing)
                .with_context(|| format!("Invalid secret in {}", path.display()));
        }

        let secret = Self::generate();
        properties.insert(SECRET_KEY.to_string(), Value::String(secret.to_hex()));

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(&properties)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "generated new signing secret");

        Ok(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_random() {
        let a = Secret::generate();
        let b = Secret::generate();
        assert_eq!(a.as_bytes().len(), SECRET_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hex_round_trip() {
        let secret = Secret::generate();
        assert_eq!(Secret::from_hex(&secret.to_hex()).unwrap(), secret);
    }

    #[test]
    fn test_from_hex_rejects_garbage() {
        assert!(Secret::from_hex("not-hex").is_err());
        assert!(Secret::from_hex("").is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        let secret = Secret::from_bytes(b"top secret".to_vec());
        assert_eq!(format!("{:?}", secret), "Secret(<redacted>)");
    }

    #[test]
    fn test_load_or_generate_persists_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("property.json");

        let first = Secret::load_or_generate(&path).unwrap();
        assert!(path.exists());
        let second = Secret::load_or_generate(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_load_or_generate_keeps_other_properties() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("property.json");
        std::fs::write(&path, r#"{"theme": "dark"}"#).unwrap();

        let secret = Secret::load_or_generate(&path).unwrap();

        let stored: Map<String, Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored["theme"], "dark");
        assert_eq!(stored["secret"], secret.to_hex());
    }

    #[test]
    fn test_load_existing_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("property.json");
        std::fs::write(&path, r#"{"secret": "00ff10"}"#).unwrap();

        let secret = Secret::load_or_generate(&path).unwrap();
        assert_eq!(secret.as_bytes(), &[0x00, 0xff, 0x10]);
    }
}
