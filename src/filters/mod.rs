//! Exception filters turning raised errors into terminal HTTP responses.
//!
//! A filter either owns an error completely (writes headers, status and body)
//! or declines it by handing back the same [`RaisedError`] without touching
//! the sink. The pipeline tries filters in order until one handles the error.

pub mod base;
pub mod http;
pub mod rate_limit;
pub mod sink;

pub use base::BaseFilter;
pub use http::{CatchAllFilter, HttpExceptionFilter};
pub use rate_limit::{RateLimitDecision, RateLimitFilter, RateLimitPolicy};
pub use sink::{HttpResponseWriter, ResponseSink};

use crate::context::RequestContext;
use crate::errors::{response, ErrorCode, RaisedError};
use crate::logging::Logger;

#[derive(Debug)]
pub enum FilterOutcome {
    /// Response written; no further filter runs
    Handled,
    /// Not this filter's error; passed on unchanged
    NotHandled(RaisedError),
}

pub trait ExceptionFilter: Send + Sync {
    fn catch(
        &self,
        raised: RaisedError,
        ctx: &RequestContext,
        sink: &mut dyn ResponseSink,
    ) -> FilterOutcome;
}

/// Ordered chain of exception filters
pub struct ExceptionFilterPipeline {
    filters: Vec<Box<dyn ExceptionFilter>>,
    base: BaseFilter,
}

impl Default for ExceptionFilterPipeline {
    fn default() -> Self {
        Self::standard(RateLimitPolicy::default())
    }
}

impl ExceptionFilterPipeline {
    /// Pipeline with no filters; everything reaches the default handler
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            base: BaseFilter::new(Logger::new("ExceptionFilterPipeline")),
        }
    }

    /// Rate limit, then status-carrying errors, then everything else
    pub fn standard(policy: RateLimitPolicy) -> Self {
        Self::new()
            .with_filter(RateLimitFilter::new(policy))
            .with_filter(HttpExceptionFilter::new())
            .with_filter(CatchAllFilter::new())
    }

    pub fn with_filter(mut self, filter: impl ExceptionFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.base = BaseFilter::new(logger);
        self
    }

    /// Logger for the pipeline's own lines and the response writer
    pub fn logger(&self) -> &Logger {
        self.base.logger()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run the error through the filters. Always ends with a written response.
    pub fn dispatch(&self, raised: RaisedError, ctx: &RequestContext, sink: &mut dyn ResponseSink) {
        let mut pending = raised;
        for filter in &self.filters {
            match filter.catch(pending, ctx, sink) {
                FilterOutcome::Handled => return,
                FilterOutcome::NotHandled(declined) => pending = declined,
            }
        }

        self.base.logger().error(format!(
            "No filter handled error: {} {} - {}",
            ctx.method,
            ctx.path,
            pending.error()
        ));
        let envelope = response::build(
            ErrorCode::InternalError,
            http::INTERNAL_ERROR_MESSAGE,
            ctx,
            None,
            None,
        );
        self.base.write_envelope(sink, 500, &envelope);
    }
}

impl std::fmt::Debug for ExceptionFilterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionFilterPipeline")
            .field("filters", &self.filters.len())
            .finish()
    }
}
