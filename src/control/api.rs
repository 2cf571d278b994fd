use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Value, json};

use super::schema::{Kind, Schema};
use crate::authority::Scope;
use crate::errors::{AuthError, ComposerError};
use crate::orchestrator::{ActionOptions, Orchestrator};
use crate::registry::DeploymentRecord;

// ── Shared application state ──────────────────────────────────────────

pub type SharedState = Arc<Orchestrator>;

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Unprocessable(String),
    /// An external command failed; carries its captured output.
    BadGateway { message: String, output: Option<String> },
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({"error": msg})),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({"error": msg})),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({"error": msg})),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({"error": msg})),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, json!({"error": msg})),
            ApiError::Unprocessable(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, json!({"error": msg}))
            }
            ApiError::BadGateway { message, output } => (
                StatusCode::BAD_GATEWAY,
                json!({"error": message, "output": output}),
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, json!({"error": msg})),
        };
        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InsufficientScope { .. } => ApiError::Forbidden(err.to_string()),
            _ => ApiError::Unauthorized(err.to_string()),
        }
    }
}

impl From<ComposerError> for ApiError {
    fn from(err: ComposerError) -> Self {
        match err {
            ComposerError::Auth(auth) => auth.into(),
            ComposerError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            ComposerError::Precondition(_) => ApiError::Conflict(err.to_string()),
            ComposerError::MissingField { .. } | ComposerError::InvalidDirectory { .. } => {
                ApiError::Unprocessable(err.to_string())
            }
            ComposerError::UnknownScope(_) => ApiError::BadRequest(err.to_string()),
            ComposerError::Command(ref command) => ApiError::BadGateway {
                output: command.output().map(str::to_string),
                message: err.to_string(),
            },
            ComposerError::Template(_) | ComposerError::Registry(_) | ComposerError::Other(_) => {
                tracing::error!(error = ?err, "internal error");
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

fn success<T: Serialize>(result: T) -> ApiResult {
    let result = serde_json::to_value(result)
        .map_err(|e| ApiError::Internal(format!("Failed to serialize result: {}", e)))?;
    Ok(Json(json!({ "result": result })))
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/list", post(list))
        .route("/api/create", post(create))
        .route("/api/fetch", post(fetch))
        .route("/api/key", post(key))
        .route("/api/token", post(token))
        .route("/api/access", post(access))
        .route("/api/modify", post(modify))
        .route("/api/delete", post(delete))
        .route("/api/action/{action}", post(action))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

fn with_id() -> Schema {
    Schema::admin().required("id", Kind::String)
}

/// The `id` field; the schema has already guaranteed it is a string.
fn id_of(verified: &super::schema::Verified) -> String {
    verified.string("id").unwrap_or_default()
}

async fn list(
    State(state): State<SharedState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let verified = Schema::admin().check(&state, body).await?;
    success(state.list(verified.admin()?).await?)
}

async fn create(
    State(state): State<SharedState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let verified = Schema::admin().check(&state, body).await?;
    success(state.create(verified.admin()?).await?)
}

#[derive(Serialize)]
struct FetchResult {
    id: String,
    #[serde(flatten)]
    record: DeploymentRecord,
    key: Option<String>,
    token: String,
}

/// The record together with its public key and a temporary access token,
/// everything a dashboard needs to manage one deployment.
async fn fetch(
    State(state): State<SharedState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let verified = with_id().check(&state, body).await?;
    let session = verified.admin()?;
    let id = id_of(&verified);

    let record = state.fetch(session, &id).await?;
    let key = match state.public_key(session, &id).await {
        Ok(key) => Some(key),
        Err(e) => {
            tracing::warn!(deployment = %id, error = %e, "public key unavailable");
            None
        }
    };
    let token = state.access(session, &id).await?;
    success(FetchResult {
        id,
        record,
        key,
        token,
    })
}

async fn key(
    State(state): State<SharedState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let verified = with_id().check(&state, body).await?;
    success(state.public_key(verified.admin()?, &id_of(&verified)).await?)
}

async fn token(
    State(state): State<SharedState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let verified = with_id()
        .required("scopes", Kind::StringList)
        .optional("validity", Kind::Uint)
        .check(&state, body)
        .await?;

    let scopes = Scope::parse_list(verified.strings("scopes"))?;
    let validity = match verified.uint("validity") {
        Some(0) => {
            return Err(ApiError::BadRequest(
                "Field 'validity' must be positive; omit it for the default".into(),
            ));
        }
        Some(secs) => Some(Duration::from_secs(secs)),
        None => None,
    };
    success(
        state
            .issue_token(verified.admin()?, &id_of(&verified), &scopes, validity)
            .await?,
    )
}

async fn access(
    State(state): State<SharedState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let verified = with_id().check(&state, body).await?;
    success(state.access(verified.admin()?, &id_of(&verified)).await?)
}

async fn modify(
    State(state): State<SharedState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let verified = with_id()
        .optional("name", Kind::String)
        .optional("directory", Kind::String)
        .optional("repository", Kind::String)
        .check(&state, body)
        .await?;

    let record = DeploymentRecord {
        name: verified.string("name"),
        directory: verified.string("directory"),
        repository: verified.string("repository"),
    };
    state
        .modify(verified.admin()?, &id_of(&verified), record)
        .await?;
    success(Value::Null)
}

async fn delete(
    State(state): State<SharedState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let verified = with_id().check(&state, body).await?;
    state.delete(verified.admin()?, &id_of(&verified)).await?;
    success(Value::Null)
}

async fn action(
    State(state): State<SharedState>,
    Path(action): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let scope: Scope = action.parse()?;
    let Json(body) = body?;
    let verified = Schema::action(scope).check(&state, body).await?;

    let options = ActionOptions {
        tail: verified.uint("tail").map(clamp),
        timeout: verified.uint("timeout").map(clamp),
        reset: verified.flag("reset"),
    };
    success(state.perform(verified.grant()?, options).await?)
}

fn clamp(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
