use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use serde_json::Value;

use crate::logging::Logger;

/// Where a filter writes its terminal response
pub trait ResponseSink {
    fn set_status(&mut self, status: u16);
    fn set_header(&mut self, name: &str, value: &str);
    fn write_json(&mut self, body: &Value);
}

/// Accumulates a filter's writes into an axum [`Response`].
///
/// The body commits the response: headers set afterwards are dropped.
#[derive(Debug)]
pub struct HttpResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    logger: Logger,
}

impl Default for HttpResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpResponseWriter {
    pub fn new() -> Self {
        Self::with_logger(Logger::new("HttpResponseWriter"))
    }

    pub fn with_logger(logger: Logger) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            headers: HeaderMap::new(),
            body: None,
            logger,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.body.is_some()
    }

    pub fn into_response(self) -> Response {
        let body = self.body.map(Body::from).unwrap_or_else(Body::empty);
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseSink for HttpResponseWriter {
    fn set_status(&mut self, status: u16) {
        match StatusCode::from_u16(status) {
            Ok(code) => self.status = code,
            Err(_) => self
                .logger
                .warn(format!("Ignoring invalid response status: {status}")),
        }
    }

    fn set_header(&mut self, name: &str, value: &str) {
        if self.is_committed() {
            self.logger
                .warn(format!("Header set after response body was written: {name}"));
            return;
        }

        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => self
                .logger
                .warn(format!("Ignoring invalid response header: {name}")),
        }
    }

    fn write_json(&mut self, body: &Value) {
        match serde_json::to_vec(body) {
            Ok(bytes) => {
                self.headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                self.body = Some(bytes);
            }
            Err(e) => self
                .logger
                .warn(format!("Failed to serialize response body: {e}")),
        }
    }
}

/// Calls a filter made on its sink, in order
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SinkCall {
    Status(u16),
    Header(String, String),
    Json(Value),
}

#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub calls: Vec<SinkCall>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.calls.iter().find_map(|call| match call {
            SinkCall::Header(n, v) if n == name => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn status(&self) -> Option<u16> {
        self.calls.iter().find_map(|call| match call {
            SinkCall::Status(s) => Some(*s),
            _ => None,
        })
    }

    pub fn body(&self) -> Option<&Value> {
        self.calls.iter().find_map(|call| match call {
            SinkCall::Json(v) => Some(v),
            _ => None,
        })
    }
}

#[cfg(test)]
impl ResponseSink for RecordingSink {
    fn set_status(&mut self, status: u16) {
        self.calls.push(SinkCall::Status(status));
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.calls
            .push(SinkCall::Header(name.to_string(), value.to_string()));
    }

    fn write_json(&mut self, body: &Value) {
        self.calls.push(SinkCall::Json(body.clone()));
    }
}
