use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{ApiError, ErrorEnvelope, FieldError};

const MAX_MESSAGE_LENGTH: usize = 1000;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub instance_id: String,
    pub request_timeout: Duration,
    pub users: Vec<User>,
    pub started_at: Instant,
}

impl AppStateInner {
    pub fn new(instance_id: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            instance_id: instance_id.into(),
            request_timeout,
            users: vec![
                User {
                    id: "u1".to_string(),
                    name: "Ada Lovelace".to_string(),
                },
                User {
                    id: "u42".to_string(),
                    name: "Grace Hopper".to_string(),
                },
            ],
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: String,
    pub name: String,
}

/// New message payload
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMessage {
    /// Recipient user id
    pub recipient: String,
    /// Message text (1-1000 characters)
    pub body: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub recipient: String,
    pub body: String,
}

/// Report generation parameters
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportParams {
    /// Simulated work time in milliseconds
    pub delay_ms: Option<u64>,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = serde_json::Value)
    )
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "request-lifecycle",
        "version": env!("CARGO_PKG_VERSION"),
        "instance_id": state.instance_id,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

/// List users
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    responses(
        (status = 200, description = "All users", body = Vec<User>),
        (status = 429, description = "Rate limit exceeded", body = ErrorEnvelope)
    )
)]
pub async fn list_users(State(state): State<AppState>) -> Json<Vec<User>> {
    Json(state.users.clone())
}

/// Get a user by id
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = User),
        (status = 404, description = "User not found", body = ErrorEnvelope)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    state
        .users
        .iter()
        .find(|user| user.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("User not found: {}", id)))
}

/// Send a message
#[utoipa::path(
    post,
    path = "/api/messages",
    tag = "messages",
    request_body = CreateMessage,
    responses(
        (status = 201, description = "Message accepted", body = MessageResponse),
        (status = 400, description = "Malformed JSON", body = ErrorEnvelope),
        (status = 422, description = "Validation failed", body = ErrorEnvelope),
        (status = 429, description = "Rate limit exceeded", body = ErrorEnvelope)
    )
)]
pub async fn create_message(
    payload: Result<Json<CreateMessage>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(message) = payload.map_err(|rejection| {
        ApiError::http(rejection.status().as_u16(), rejection.body_text())
    })?;

    let mut errors = Vec::new();
    if message.recipient.trim().is_empty() {
        errors.push(FieldError::new("recipient", "must not be empty"));
    }
    if message.body.is_empty() {
        errors.push(FieldError::new("body", "must not be empty"));
    } else if message.body.chars().count() > MAX_MESSAGE_LENGTH {
        errors.push(
            FieldError::new("body", format!("must be at most {} characters", MAX_MESSAGE_LENGTH))
                .with_value(serde_json::json!(message.body.chars().count())),
        );
    }
    if !errors.is_empty() {
        return Err(ApiError::validation("Validation failed", errors));
    }

    let response = MessageResponse {
        id: Uuid::new_v4(),
        recipient: message.recipient,
        body: message.body,
    };
    info!(message_id = %response.id, "Message accepted");
    Ok((StatusCode::CREATED, Json(response)))
}

/// Build a report, failing when it exceeds the request timeout
#[utoipa::path(
    get,
    path = "/api/reports",
    tag = "reports",
    params(ReportParams),
    responses(
        (status = 200, description = "Report ready", body = serde_json::Value),
        (status = 400, description = "Malformed query string", body = ErrorEnvelope),
        (status = 408, description = "Report took too long", body = ErrorEnvelope)
    )
)]
pub async fn generate_report(
    State(state): State<AppState>,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(params) = params.map_err(|rejection| {
        ApiError::http(rejection.status().as_u16(), rejection.body_text())
    })?;
    let delay = Duration::from_millis(params.delay_ms.unwrap_or(0));

    tokio::time::timeout(state.request_timeout, tokio::time::sleep(delay))
        .await
        .map_err(|_| ApiError::Timeout)?;

    Ok(Json(serde_json::json!({
        "status": "ready",
        "elapsed_ms": u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
    })))
}
