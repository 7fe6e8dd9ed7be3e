use serde_json::Value;

use super::sink::ResponseSink;
use crate::context::RequestContext;
use crate::errors::{codes, response, ErrorCode, ErrorEnvelope};
use crate::logging::Logger;

/// Behavior shared by the concrete exception filters
#[derive(Debug, Clone)]
pub struct BaseFilter {
    logger: Logger,
}

impl BaseFilter {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn code_for_status(&self, status: u16) -> ErrorCode {
        codes::code_for_status(status)
    }

    pub fn build_envelope(
        &self,
        code: ErrorCode,
        message: impl Into<String>,
        ctx: &RequestContext,
        details: Option<Value>,
        retry_after: Option<i64>,
    ) -> ErrorEnvelope {
        response::build(code, message, ctx, details, retry_after)
    }

    /// Write status and body. Headers must already be set.
    pub fn write_envelope(&self, sink: &mut dyn ResponseSink, status: u16, envelope: &ErrorEnvelope) {
        let body = match serde_json::to_value(envelope) {
            Ok(body) => body,
            Err(e) => {
                self.logger
                    .error(format!("Failed to serialize error envelope: {e}"));
                Value::Null
            }
        };
        sink.set_status(status);
        sink.write_json(&body);
    }
}
