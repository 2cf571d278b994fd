use std::collections::BTreeSet;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::AuthError;

/// When a token stops being valid. `Never` is serialized as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Option<i64>", into = "Option<i64>")]
pub enum Expiry {
    Never,
    At(DateTime<Utc>),
}

impl Expiry {
    /// An expiry `validity` from now, clamped to the latest representable
    /// second. A finite validity never yields `Never`.
    pub fn after(validity: Duration) -> Self {
        let at = chrono::Duration::from_std(validity)
            .ok()
            .and_then(|validity| Utc::now().checked_add_signed(validity))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Expiry::At(at)
    }

    /// `Some(validity)` expires after `validity`; `None` never expires.
    pub fn from_validity(validity: Option<Duration>) -> Self {
        validity.map_or(Expiry::Never, Expiry::after)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(at) => now > *at,
        }
    }
}

impl TryFrom<Option<i64>> for Expiry {
    type Error = String;

    fn try_from(value: Option<i64>) -> Result<Self, Self::Error> {
        match value {
            None => Ok(Expiry::Never),
            Some(secs) => DateTime::from_timestamp(secs, 0)
                .map(Expiry::At)
                .ok_or_else(|| format!("expiry {} is out of range", secs)),
        }
    }
}

impl From<Expiry> for Option<i64> {
    fn from(expiry: Expiry) -> Self {
        match expiry {
            Expiry::Never => None,
            Expiry::At(at) => Some(at.timestamp()),
        }
    }
}

/// The signed part of a capability token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub title: String,
    pub contents: Map<String, Value>,
    pub scopes: BTreeSet<String>,
    pub expiry: Expiry,
}

/// A decoded token: the exact claim bytes that were signed and the
/// signature over them.
#[derive(Debug, Clone)]
pub(crate) struct RawToken {
    pub signed: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Encode `signed` claim bytes and their signature as
/// `base64url(claims).base64url(signature)`.
pub(crate) fn encode(signed: &[u8], signature: &[u8]) -> String {
    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(signed),
        URL_SAFE_NO_PAD.encode(signature)
    )
}

pub(crate) fn decode(token: &str) -> Result<RawToken, AuthError> {
    let (claims, signature) = token.trim().split_once('.').ok_or(AuthError::Malformed)?;
    let signed = URL_SAFE_NO_PAD
        .decode(claims)
        .map_err(|_| AuthError::Malformed)?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| AuthError::Malformed)?;
    Ok(RawToken { signed, signature })
}

impl RawToken {
    pub fn claims(&self) -> Result<Claims, AuthError> {
        serde_json::from_slice(&self.signed).map_err(|_| AuthError::Malformed)
    }
}
