use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::context::RequestContext;
use crate::errors::RaisedError;
use crate::filters::{ExceptionFilterPipeline, HttpResponseWriter};

/// Replace responses carrying a raised error with the pipeline's response
pub async fn exception_filter_middleware(
    State(pipeline): State<Arc<ExceptionFilterPipeline>>,
    request: Request,
    next: Next,
) -> Response {
    let ctx = RequestContext::from_request(&request);
    let response = next.run(request).await;

    let Some(raised) = RaisedError::from_response(&response) else {
        return response;
    };

    let mut writer = HttpResponseWriter::with_logger(pipeline.logger().clone());
    pipeline.dispatch(raised, &ctx, &mut writer);
    writer.into_response()
}
