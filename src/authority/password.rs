use std::time::Duration;

use subtle::ConstantTimeEq;

use crate::errors::AuthError;

/// Gate for administrative calls.
///
/// Every check sleeps for a fixed delay before comparing, which slows
/// guessing without tracking callers. With no password configured every
/// check fails.
#[derive(Debug, Clone)]
pub struct PasswordGuard {
    expected: Option<String>,
    delay: Duration,
}

impl PasswordGuard {
    pub fn new(expected: Option<String>, delay: Duration) -> Self {
        Self {
            expected: expected.filter(|p| !p.is_empty()),
            delay,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.expected.is_some()
    }

    pub async fn check(&self, candidate: &str) -> Result<(), AuthError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.expected {
            Some(expected) if bool::from(expected.as_bytes().ct_eq(candidate.as_bytes())) => Ok(()),
            _ => Err(AuthError::InvalidPassword),
        }
    }
}
