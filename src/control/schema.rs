//! Declarative request schemas.
//!
//! Every route declares its body fields up front. A field is either a
//! literal of some [`Kind`] or a [`Capability`] the caller must prove.
//! [`Schema::check`] validates the literals first, so malformed requests
//! are rejected without paying the password delay, then verifies the
//! capabilities and hands back the resulting proofs.

use serde_json::{Map, Value};

use super::api::ApiError;
use crate::authority::Scope;
use crate::orchestrator::{AdminSession, Grant, Orchestrator};

/// Shape of a literal field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    String,
    Uint,
    Bool,
    StringList,
}

impl Kind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Kind::String => value.is_string(),
            Kind::Uint => value.is_u64(),
            Kind::Bool => value.is_boolean(),
            Kind::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Kind::String => "a string",
            Kind::Uint => "a non-negative integer",
            Kind::Bool => "a boolean",
            Kind::StringList => "a list of strings",
        }
    }
}

/// Something the caller must prove by presenting a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// The administrator password.
    Password,
    /// A token carrying this scope.
    Token(Scope),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Literal(Kind),
    Capability(Capability),
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub param: Param,
    pub required: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Administrative routes: password plus the given fields.
    pub fn admin() -> Self {
        Self::new().capability("password", Capability::Password)
    }

    /// The token-gated action for `scope`.
    pub fn action(scope: Scope) -> Self {
        Self::new()
            .capability("token", Capability::Token(scope))
            .optional("tail", Kind::Uint)
            .optional("timeout", Kind::Uint)
            .optional("reset", Kind::Bool)
    }

    pub fn required(mut self, name: &'static str, kind: Kind) -> Self {
        self.fields.push(Field {
            name,
            param: Param::Literal(kind),
            required: true,
        });
        self
    }

    /// An optional field; `null` counts as absent.
    pub fn optional(mut self, name: &'static str, kind: Kind) -> Self {
        self.fields.push(Field {
            name,
            param: Param::Literal(kind),
            required: false,
        });
        self
    }

    pub fn capability(mut self, name: &'static str, capability: Capability) -> Self {
        self.fields.push(Field {
            name,
            param: Param::Capability(capability),
            required: true,
        });
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Validate shapes only. Capability fields must be strings.
    pub fn check_shape(&self, body: &Value) -> Result<(), ApiError> {
        let object = body
            .as_object()
            .ok_or_else(|| ApiError::BadRequest("Request body must be a JSON object".into()))?;

        for field in &self.fields {
            let value = object.get(field.name).filter(|v| !v.is_null());
            let kind = match field.param {
                Param::Literal(kind) => kind,
                Param::Capability(_) => Kind::String,
            };
            match value {
                None if field.required => {
                    return Err(ApiError::BadRequest(format!(
                        "Missing field '{}'",
                        field.name
                    )));
                }
                None => {}
                Some(value) if !kind.matches(value) => {
                    return Err(ApiError::BadRequest(format!(
                        "Field '{}' must be {}",
                        field.name,
                        kind.describe()
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Validate `body` and verify its capabilities against `orchestrator`.
    pub async fn check(&self, orchestrator: &Orchestrator, body: Value) -> Result<Verified, ApiError> {
        self.check_shape(&body)?;
        let Value::Object(body) = body else {
            return Err(ApiError::BadRequest("Request body must be a JSON object".into()));
        };

        let mut verified = Verified {
            admin: None,
            grant: None,
            body,
        };
        for field in &self.fields {
            let Param::Capability(capability) = field.param else {
                continue;
            };
            let presented = verified.str(field.name).unwrap_or_default().to_string();
            match capability {
                Capability::Password => {
                    verified.admin = Some(orchestrator.authenticate(&presented).await?);
                }
                Capability::Token(scope) => {
                    verified.grant = Some(orchestrator.authorize(&presented, scope)?);
                }
            }
        }
        Ok(verified)
    }
}

/// A request body that passed its schema, with the proofs it earned.
#[derive(Debug)]
pub struct Verified {
    admin: Option<AdminSession>,
    grant: Option<Grant>,
    body: Map<String, Value>,
}

impl Verified {
    pub fn admin(&self) -> Result<&AdminSession, ApiError> {
        self.admin
            .as_ref()
            .ok_or_else(|| ApiError::Internal("Route schema does not require a password".into()))
    }

    pub fn grant(&self) -> Result<&Grant, ApiError> {
        self.grant
            .as_ref()
            .ok_or_else(|| ApiError::Internal("Route schema does not require a token".into()))
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.body.get(name).and_then(Value::as_str)
    }

    pub fn string(&self, name: &str) -> Option<String> {
        self.str(name).map(str::to_string)
    }

    pub fn uint(&self, name: &str) -> Option<u64> {
        self.body.get(name).and_then(Value::as_u64)
    }

    pub fn flag(&self, name: &str) -> bool {
        self.body.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn strings(&self, name: &str) -> Vec<String> {
        self.body
            .get(name)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
