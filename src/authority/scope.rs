use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ComposerError;

/// A delegable per-deployment action. Its string form is both the scope a
/// token must carry and the action name on the control API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Info,
    Status,
    Log,
    Pull,
    Clone,
    Update,
    Start,
    Stop,
    Restart,
    Reset,
    Destroy,
}

impl Scope {
    /// The full vocabulary, in the order it is presented to administrators.
    pub const ALL: [Scope; 11] = [
        Scope::Info,
        Scope::Status,
        Scope::Log,
        Scope::Pull,
        Scope::Clone,
        Scope::Update,
        Scope::Start,
        Scope::Stop,
        Scope::Restart,
        Scope::Reset,
        Scope::Destroy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Status => "status",
            Self::Log => "log",
            Self::Pull => "pull",
            Self::Clone => "clone",
            Self::Update => "update",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Reset => "reset",
            Self::Destroy => "destroy",
        }
    }

    /// Parse a list of scope names, rejecting anything outside the vocabulary.
    pub fn parse_list<I, S>(names: I) -> Result<Vec<Scope>, ComposerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| name.as_ref().trim().parse())
            .collect()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ComposerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::ALL
            .iter()
            .copied()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| ComposerError::UnknownScope(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_round_trips_through_str() {
        for scope in Scope::ALL {
            assert_eq!(scope.as_str().parse::<Scope>().unwrap(), scope);
        }
    }

    #[test]
    fn test_unknown_scope_rejected() {
        let err = "deploy".parse::<Scope>().unwrap_err();
        assert!(matches!(err, ComposerError::UnknownScope(ref s) if s == "deploy"));
    }

    #[test]
    fn test_parse_list() {
        let scopes = Scope::parse_list(["pull", " start "]).unwrap();
        assert_eq!(scopes, vec![Scope::Pull, Scope::Start]);
        assert!(Scope::parse_list(["pull", "webhook"]).is_err());
    }

    #[test]
    fn test_scope_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Scope::Restart).unwrap(), "\"restart\"");
        let scope: Scope = serde_json::from_str("\"log\"").unwrap();
        assert_eq!(scope, Scope::Log);
    }
}
