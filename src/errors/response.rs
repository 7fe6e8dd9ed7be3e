use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::codes::ErrorCode;
use crate::context::RequestContext;

pub const RATE_LIMIT_MESSAGE: &str = "Too many requests, please try again later";
pub const DEFAULT_RETRY_AFTER_SECONDS: i64 = 60;
const UNKNOWN_REQUEST_ID: &str = "unknown";

/// Structured error body returned for every failed request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    /// Always false for errors
    pub success: bool,
    /// Error code for programmatic handling
    pub error: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Additional context (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// UTC time the envelope was built, millisecond precision
    pub timestamp: String,
    pub path: String,
    pub method: String,
    /// Request ID for tracing
    pub request_id: String,
    /// Seconds the client should wait before retrying
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<i64>,
}

/// One rejected input field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// Build an error envelope.
///
/// A `retry_after` of zero is dropped like a missing value; negative values
/// are kept as given.
pub fn build(
    code: ErrorCode,
    message: impl Into<String>,
    ctx: &RequestContext,
    details: Option<Value>,
    retry_after: Option<i64>,
) -> ErrorEnvelope {
    let request_id = if ctx.request_id.is_empty() {
        UNKNOWN_REQUEST_ID.to_string()
    } else {
        ctx.request_id.clone()
    };

    ErrorEnvelope {
        success: false,
        error: code,
        message: message.into(),
        details,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        path: ctx.path.clone(),
        method: ctx.method.clone(),
        request_id,
        retry_after: retry_after.filter(|seconds| *seconds != 0),
    }
}

pub fn build_validation_error(
    message: impl Into<String>,
    ctx: &RequestContext,
    field_errors: Vec<FieldError>,
) -> ErrorEnvelope {
    let details = serde_json::to_value(field_errors).unwrap_or(Value::Null);
    build(ErrorCode::ValidationError, message, ctx, Some(details), None)
}

/// Rate-limit envelope; `retry_after` defaults to 60 seconds
pub fn build_rate_limit_error(ctx: &RequestContext, retry_after: Option<i64>) -> ErrorEnvelope {
    build_rate_limit_error_with_details(ctx, retry_after, None)
}

pub fn build_rate_limit_error_with_details(
    ctx: &RequestContext,
    retry_after: Option<i64>,
    details: Option<Value>,
) -> ErrorEnvelope {
    build(
        ErrorCode::RateLimitExceeded,
        RATE_LIMIT_MESSAGE,
        ctx,
        details,
        Some(retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECONDS)),
    )
}

pub fn build_timeout_error(ctx: &RequestContext) -> ErrorEnvelope {
    build(ErrorCode::RequestTimeout, "Request timeout", ctx, None, None)
}

pub fn build_database_error(
    message: impl Into<String>,
    ctx: &RequestContext,
    details: Option<Value>,
) -> ErrorEnvelope {
    build(ErrorCode::DatabaseError, message, ctx, details, None)
}
