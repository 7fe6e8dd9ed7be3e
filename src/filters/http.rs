use super::base::BaseFilter;
use super::sink::ResponseSink;
use super::{ExceptionFilter, FilterOutcome};
use crate::context::RequestContext;
use crate::errors::{response, ApiError, ErrorCode, RaisedError};
use crate::logging::Logger;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Handles every error that carries its own HTTP status
#[derive(Debug, Clone)]
pub struct HttpExceptionFilter {
    base: BaseFilter,
}

impl Default for HttpExceptionFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpExceptionFilter {
    pub fn new() -> Self {
        Self::with_logger(Logger::new("HttpExceptionFilter"))
    }

    pub fn with_logger(logger: Logger) -> Self {
        Self {
            base: BaseFilter::new(logger),
        }
    }
}

impl ExceptionFilter for HttpExceptionFilter {
    fn catch(
        &self,
        raised: RaisedError,
        ctx: &RequestContext,
        sink: &mut dyn ResponseSink,
    ) -> FilterOutcome {
        let Some(status) = raised.error().status() else {
            return FilterOutcome::NotHandled(raised);
        };

        let envelope = match raised.error() {
            ApiError::Validation { message, errors } => {
                response::build_validation_error(message.clone(), ctx, errors.clone())
            }
            ApiError::Timeout => response::build_timeout_error(ctx),
            ApiError::Http {
                message, details, ..
            } => self.base.build_envelope(
                self.base.code_for_status(status),
                message.clone(),
                ctx,
                details.clone(),
                None,
            ),
            other => self.base.build_envelope(
                self.base.code_for_status(status),
                other.to_string(),
                ctx,
                None,
                None,
            ),
        };

        let line = format!(
            "{} {} - {} - {}",
            ctx.method,
            ctx.path,
            status,
            raised.error()
        );
        if status >= 500 {
            self.base.logger().error(line);
        } else {
            self.base.logger().warn(line);
        }

        self.base.write_envelope(sink, status, &envelope);
        FilterOutcome::Handled
    }
}

/// Last-resort filter: answers with a 500 envelope without exposing internals
#[derive(Debug, Clone)]
pub struct CatchAllFilter {
    base: BaseFilter,
}

impl Default for CatchAllFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl CatchAllFilter {
    pub fn new() -> Self {
        Self::with_logger(Logger::new("CatchAllFilter"))
    }

    pub fn with_logger(logger: Logger) -> Self {
        Self {
            base: BaseFilter::new(logger),
        }
    }
}

impl ExceptionFilter for CatchAllFilter {
    fn catch(
        &self,
        raised: RaisedError,
        ctx: &RequestContext,
        sink: &mut dyn ResponseSink,
    ) -> FilterOutcome {
        self.base.logger().error(format!(
            "Unhandled error: {} {} - {:#}",
            ctx.method,
            ctx.path,
            raised.error()
        ));

        let envelope = match raised.error() {
            ApiError::Database { message, details } => {
                response::build_database_error(message.clone(), ctx, details.clone())
            }
            _ => self.base.build_envelope(
                ErrorCode::InternalError,
                INTERNAL_ERROR_MESSAGE,
                ctx,
                None,
                None,
            ),
        };

        self.base
            .write_envelope(sink, envelope.error.status_code(), &envelope);
        FilterOutcome::Handled
    }
}
