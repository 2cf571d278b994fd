//! Access token authority.
//!
//! Issues and verifies self-contained capability tokens. A token carries a
//! title, an opaque JSON payload (for dockhand, `{"id": <deployment id>}`),
//! the set of scopes it grants and an expiry, all signed with HMAC-SHA256
//! under the process secret. Nothing about issued tokens is stored, so a
//! token stays valid until it expires.
//!
//! Verification order is fixed: decoding, signature, expiry, scope.
//!
//! The password guard for administrative calls lives here too, since both
//! are the gate in front of every orchestrator action.

mod password;
mod scope;
mod secret;
mod token;

pub use password::PasswordGuard;
pub use scope::Scope;
pub use secret::Secret;
pub use token::{Claims, Expiry};

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::{Map, Value, json};
use sha2::Sha256;

use crate::errors::AuthError;

type HmacSha256 = Hmac<Sha256>;

pub struct Authority {
    secret: Secret,
}

impl Authority {
    pub fn new(secret: Secret) -> Self {
        Self { secret }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC accepts keys of any length")
    }

    /// Issue a signed token granting `scopes` over `contents` until `expiry`.
    pub fn issue<I, S>(
        &self,
        title: impl Into<String>,
        contents: Map<String, Value>,
        scopes: I,
        expiry: Expiry,
    ) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let scopes: std::collections::BTreeSet<String> =
            scopes.into_iter().map(|s| s.as_ref().to_string()).collect();
        let claims = json!({
            "title": title.into(),
            "contents": contents,
            "scopes": scopes,
            "expiry": Option::<i64>::from(expiry),
        });
        let signed = claims.to_string().into_bytes();

        let mut mac = self.mac();
        mac.update(&signed);
        let signature = mac.finalize().into_bytes();

        token::encode(&signed, &signature)
    }

    /// Verify `token` against the current time and return its payload.
    pub fn validate(&self, token: &str, required: &[Scope]) -> Result<Map<String, Value>, AuthError> {
        self.validate_at(token, required, Utc::now())
    }

    /// Verify `token` as of `now` and return its payload.
    pub fn validate_at(
        &self,
        token: &str,
        required: &[Scope],
        now: DateTime<Utc>,
    ) -> Result<Map<String, Value>, AuthError> {
        let claims = self.verify(token)?;

        if claims.expiry.is_expired_at(now) {
            return Err(AuthError::Expired);
        }

        if let Some(missing) = required
            .iter()
            .find(|scope| !claims.scopes.contains(scope.as_str()))
        {
            return Err(AuthError::InsufficientScope {
                scope: missing.to_string(),
            });
        }

        Ok(claims.contents)
    }

    /// Check the signature and return the claims, ignoring expiry and scope.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let raw = token::decode(token)?;

        let mut mac = self.mac();
        mac.update(&raw.signed);
        mac.verify_slice(&raw.signature)
            .map_err(|_| AuthError::InvalidSignature)?;

        raw.claims()
    }
}

/// Extract the deployment id a token payload refers to.
pub fn subject(contents: &Map<String, Value>) -> Result<String, AuthError> {
    contents
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(AuthError::MissingSubject)
}

/// Payload identifying a deployment.
pub fn deployment_payload(id: &str) -> Map<String, Value> {
    let mut contents = Map::new();
    contents.insert("id".to_string(), Value::String(id.to_string()));
    contents
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn authority() -> Authority {
        Authority::new(Secret::from_bytes(b"test-secret-key".to_vec()))
    }

    fn issue(auth: &Authority, scopes: &[Scope], expiry: Expiry) -> String {
        auth.issue(
            "Test token",
            deployment_payload("AB12CD34"),
            scopes.iter().map(Scope::as_str),
            expiry,
        )
    }

    #[test]
    fn test_validate_returns_payload() {
        let auth = authority();
        let token = issue(&auth, &[Scope::Pull], Expiry::after(Duration::from_secs(60)));
        let contents = auth.validate(&token, &[Scope::Pull]).unwrap();
        assert_eq!(subject(&contents).unwrap(), "AB12CD34");
    }

    #[test]
    fn test_every_granted_scope_validates_and_no_other() {
        let auth = authority();
        let granted = [Scope::Pull, Scope::Start, Scope::Status];
        let token = issue(&auth, &granted, Expiry::after(Duration::from_secs(60)));

        for scope in Scope::ALL {
            let result = auth.validate(&token, &[scope]);
            if granted.contains(&scope) {
                assert!(result.is_ok(), "{} should validate", scope);
            } else {
                assert_eq!(
                    result.unwrap_err(),
                    AuthError::InsufficientScope {
                        scope: scope.to_string()
                    }
                );
            }
        }
    }

    #[test]
    fn test_all_required_scopes_must_be_present() {
        let auth = authority();
        let token = issue(&auth, &[Scope::Stop], Expiry::Never);
        assert!(auth.validate(&token, &[Scope::Stop]).is_ok());
        assert!(auth.validate(&token, &[Scope::Stop, Scope::Start]).is_err());
        assert!(auth.validate(&token, &[]).is_ok());
    }

    #[test]
    fn test_expired_token_fails_regardless_of_scope() {
        let auth = authority();
        let token = issue(&auth, &Scope::ALL, Expiry::after(Duration::from_secs(60)));
        let later = Utc::now() + chrono::Duration::seconds(3600);

        for scope in Scope::ALL {
            assert_eq!(
                auth.validate_at(&token, &[scope], later).unwrap_err(),
                AuthError::Expired
            );
        }
        assert_eq!(
            auth.validate_at(&token, &[], later).unwrap_err(),
            AuthError::Expired
        );
    }

    #[test]
    fn test_expiry_checked_before_scope() {
        let auth = authority();
        let token = issue(&auth, &[Scope::Pull], Expiry::after(Duration::from_secs(1)));
        let later = Utc::now() + chrono::Duration::seconds(60);
        assert_eq!(
            auth.validate_at(&token, &[Scope::Stop], later).unwrap_err(),
            AuthError::Expired
        );
    }

    #[test]
    fn test_never_expiring_token_survives_far_future() {
        let auth = authority();
        let token = issue(&auth, &[Scope::Pull], Expiry::Never);
        let far_future = Utc::now() + chrono::Duration::days(365 * 100);
        assert!(auth.validate_at(&token, &[Scope::Pull], far_future).is_ok());
    }

    #[test]
    fn test_mutating_any_byte_invalidates() {
        let auth = authority();
        let token = issue(&auth, &[Scope::Pull], Expiry::Never);
        let bytes = token.as_bytes();

        for i in 0..bytes.len() {
            let mut mutated = bytes.to_vec();
            // Swap between two characters that are both in the base64url alphabet.
            mutated[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let mutated = String::from_utf8(mutated).unwrap();
            let result = auth.validate(&mutated, &[Scope::Pull]);
            assert!(
                matches!(
                    result,
                    Err(AuthError::InvalidSignature) | Err(AuthError::Malformed)
                ),
                "mutation at byte {} was accepted",
                i
            );
        }
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let issuer = Authority::new(Secret::generate());
        let verifier = Authority::new(Secret::generate());
        let token = issue(&issuer, &[Scope::Pull], Expiry::Never);
        assert_eq!(
            verifier.validate(&token, &[Scope::Pull]).unwrap_err(),
            AuthError::InvalidSignature
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        let auth = authority();
        assert_eq!(auth.validate("", &[]).unwrap_err(), AuthError::Malformed);
        assert_eq!(
            auth.validate("not a token", &[]).unwrap_err(),
            AuthError::Malformed
        );
    }

    #[test]
    fn test_verify_exposes_claims() {
        let auth = authority();
        let token = issue(&auth, &[Scope::Log, Scope::Info], Expiry::Never);
        let claims = auth.verify(&token).unwrap();
        assert_eq!(claims.title, "Test token");
        assert_eq!(claims.expiry, Expiry::Never);
        assert!(claims.scopes.contains("log"));
        assert!(claims.scopes.contains("info"));
    }

    #[test]
    fn test_subject_requires_string_id() {
        let mut contents = Map::new();
        assert_eq!(subject(&contents).unwrap_err(), AuthError::MissingSubject);
        contents.insert("id".into(), Value::from(7));
        assert_eq!(subject(&contents).unwrap_err(), AuthError::MissingSubject);
    }
}
