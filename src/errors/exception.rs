use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use super::response::FieldError;

/// Message fragments upstream throttlers use when they reject a request
const THROTTLE_MARKERS: [&str; 2] = ["ThrottlerException", "Too Many Requests"];

/// Errors raised by handlers and middleware
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        details: Option<Value>,
    },

    #[error("{message}")]
    Throttled {
        message: String,
        payload: Option<Value>,
    },

    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("Request timeout")]
    Timeout,

    #[error("{message}")]
    Database {
        message: String,
        details: Option<Value>,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::http(404, message)
    }

    pub fn throttled(message: impl Into<String>) -> Self {
        Self::Throttled {
            message: message.into(),
            payload: None,
        }
    }

    pub fn validation(message: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self::Validation {
            message: message.into(),
            errors,
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            details: None,
        }
    }

    /// HTTP status carried by the error itself, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } if *status != 0 => Some(*status),
            Self::Http { .. } => None,
            Self::Throttled { .. } => Some(429),
            Self::Validation { .. } => Some(422),
            Self::Timeout => Some(408),
            Self::Database { .. } | Self::Internal(_) => None,
        }
    }

    /// Whether an upstream throttler raised this error
    pub fn is_throttled(&self) -> bool {
        if matches!(self, Self::Throttled { .. }) {
            return true;
        }
        let message = self.to_string();
        THROTTLE_MARKERS.iter().any(|marker| message.contains(marker))
    }
}

/// Shared handle to a raised error.
///
/// Filters hand back the same handle when they decline an error, so identity
/// is preserved through the whole chain.
#[derive(Debug, Clone)]
pub struct RaisedError(pub Arc<ApiError>);

impl RaisedError {
    pub fn new(error: ApiError) -> Self {
        Self(Arc::new(error))
    }

    pub fn error(&self) -> &ApiError {
        &self.0
    }

    pub fn ptr_eq(&self, other: &RaisedError) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Take the raised error out of a response produced by the inner stack
    pub fn from_response(response: &Response) -> Option<Self> {
        response.extensions().get::<RaisedError>().cloned()
    }
}

impl From<ApiError> for RaisedError {
    fn from(error: ApiError) -> Self {
        Self::new(error)
    }
}

impl IntoResponse for RaisedError {
    /// Placeholder response carrying the error outwards until the exception
    /// filter layer replaces it with the final envelope.
    fn into_response(self) -> Response {
        let status = self
            .0
            .status()
            .and_then(|s| StatusCode::from_u16(s).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = status.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        RaisedError::new(self).into_response()
    }
}
