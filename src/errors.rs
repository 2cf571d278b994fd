//! Typed error hierarchy for dockhand.
//!
//! Four enums cover the subsystems:
//! - `AuthError`: password and capability-token rejections
//! - `TemplateError`: command rendering failures
//! - `CommandError`: process spawn and non-zero exit failures
//! - `ComposerError`: everything an orchestrator action can fail with

use thiserror::Error;

/// Rejections from the token authority and the password guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Password is incorrect")]
    InvalidPassword,

    #[error("Token is malformed")]
    Malformed,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Token is missing scope '{scope}'")]
    InsufficientScope { scope: String },

    #[error("Token payload has no deployment id")]
    MissingSubject,
}

/// Errors from rendering a command template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Template references unbound variable '{name}'")]
    Unbound { name: String },

    #[error("Template argument has an unterminated placeholder: {arg}")]
    Unterminated { arg: String },
}

/// Errors from running an external command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {}: {}", exit_code.map_or("?".to_string(), |c| c.to_string()), output.trim())]
    Failed {
        command: String,
        exit_code: Option<i32>,
        output: String,
    },
}

impl CommandError {
    /// Captured output of a failed command, if it ran at all.
    pub fn output(&self) -> Option<&str> {
        match self {
            CommandError::Failed { output, .. } => Some(output),
            CommandError::Spawn { .. } => None,
        }
    }
}

/// The clone state an action expected but did not find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("not initialized")]
    NotInitialized,

    #[error("already initialized")]
    AlreadyInitialized,
}

/// Errors from orchestrator actions.
#[derive(Debug, Error)]
pub enum ComposerError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Deployment {id} does not exist")]
    NotFound { id: String },

    #[error("Deployment repository is {0}")]
    Precondition(#[from] PreconditionError),

    #[error("Deployment {id} does not have a {field}")]
    MissingField { id: String, field: &'static str },

    #[error("Directory '{directory}' is not inside the deployment repository")]
    InvalidDirectory { directory: String },

    #[error("Scope '{0}' does not exist")]
    UnknownScope(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Registry error: {0}")]
    Registry(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ComposerResult<T> = Result<T, ComposerError>;
