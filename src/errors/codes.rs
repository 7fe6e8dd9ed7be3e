use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Stable error codes sent to clients.
///
/// Clients branch on these tags, never on HTTP status codes, so the set only
/// ever grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed request
    BadRequest,

    /// Missing or invalid credentials
    Unauthorized,

    /// Authenticated but not allowed
    Forbidden,

    /// Resource does not exist
    NotFound,

    /// Resource state conflict
    Conflict,

    /// Input validation failed
    ValidationError,

    /// Too many requests / rate limit exceeded
    RateLimitExceeded,

    /// Request took too long
    RequestTimeout,

    /// Internal server error
    InternalError,

    /// Database connection or query error
    DatabaseError,

    /// Status with no dedicated code
    UnknownError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::RequestTimeout => "REQUEST_TIMEOUT",
            Self::InternalError => "INTERNAL_ERROR",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// HTTP status used when the raised error carries no status of its own
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::RequestTimeout => 408,
            Self::Conflict => 409,
            Self::ValidationError => 422,
            Self::RateLimitExceeded => 429,
            Self::InternalError | Self::DatabaseError | Self::UnknownError => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statuses with a dedicated code. Anything else is `UNKNOWN_ERROR`.
const STATUS_CODES: [(u16, ErrorCode); 9] = [
    (400, ErrorCode::BadRequest),
    (401, ErrorCode::Unauthorized),
    (403, ErrorCode::Forbidden),
    (404, ErrorCode::NotFound),
    (409, ErrorCode::Conflict),
    (422, ErrorCode::ValidationError),
    (429, ErrorCode::RateLimitExceeded),
    (408, ErrorCode::RequestTimeout),
    (500, ErrorCode::InternalError),
];

/// Map an HTTP status to its client-facing error code
pub fn code_for_status(status: u16) -> ErrorCode {
    STATUS_CODES
        .iter()
        .find(|(mapped, _)| *mapped == status)
        .map(|(_, code)| *code)
        .unwrap_or(ErrorCode::UnknownError)
}

/// Map an untyped status (e.g. read from an upstream JSON payload).
///
/// The value is looked up as-is: fractional, negative and out-of-range
/// numbers are unmapped keys, never rounded.
pub fn code_for_raw_status(status: f64) -> ErrorCode {
    if status.fract() != 0.0 || status < 0.0 || status > f64::from(u16::MAX) {
        return ErrorCode::UnknownError;
    }
    code_for_status(status as u16)
}
