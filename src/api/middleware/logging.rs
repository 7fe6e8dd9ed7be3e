use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::future::Future;
use tokio::time::Instant;

use crate::context::RequestContext;
use crate::errors::RaisedError;
use crate::logging::Logger;

/// Logs every request/response cycle with its duration.
///
/// Errors are logged and handed back untouched so the exception filters
/// still see them.
#[derive(Debug, Clone)]
pub struct LoggingInterceptor {
    logger: Logger,
}

impl Default for LoggingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingInterceptor {
    pub fn new() -> Self {
        Self::with_logger(Logger::new("HTTP"))
    }

    pub fn with_logger(logger: Logger) -> Self {
        Self { logger }
    }

    pub async fn intercept<F>(&self, ctx: &RequestContext, handler: F) -> Result<Response, RaisedError>
    where
        F: Future<Output = Result<Response, RaisedError>>,
    {
        let start = Instant::now();
        self.logger.info(format!(
            "Incoming Request: {} {} - {} - {}",
            ctx.method, ctx.path, ctx.client_ip, ctx.user_agent
        ));

        match handler.await {
            Ok(response) => {
                let duration = start.elapsed().as_millis();
                self.logger.info(format!(
                    "Outgoing Response: {} {} - {} - {}ms",
                    ctx.method,
                    ctx.path,
                    response.status().as_u16(),
                    duration
                ));
                Ok(response)
            }
            Err(raised) => {
                let duration = start.elapsed().as_millis();
                let status = raised.error().status().unwrap_or(500);
                self.logger.error(format!(
                    "Request Error: {} {} - {} - {}ms - {}",
                    ctx.method,
                    ctx.path,
                    status,
                    duration,
                    raised.error()
                ));
                Err(raised)
            }
        }
    }
}

/// axum adapter for [`LoggingInterceptor`]
pub async fn logging_middleware(
    State(interceptor): State<LoggingInterceptor>,
    request: Request,
    next: Next,
) -> Response {
    let ctx = RequestContext::from_request(&request);

    let outcome = interceptor
        .intercept(&ctx, async move {
            let response = next.run(request).await;
            match RaisedError::from_response(&response) {
                Some(raised) => Err(raised),
                None => Ok(response),
            }
        })
        .await;

    match outcome {
        Ok(response) => response,
        Err(raised) => raised.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_context;
    use crate::errors::ApiError;
    use crate::logging::MemorySink;
    use axum::http::StatusCode;
    use std::sync::Arc;
    use std::time::Duration;
    use tracing::Level;

    fn interceptor() -> (LoggingInterceptor, Arc<MemorySink>) {
        let logs = MemorySink::new();
        let interceptor = LoggingInterceptor::with_logger(Logger::with_sink("HTTP", logs.clone()));
        (interceptor, logs)
    }

    fn users_context() -> RequestContext {
        RequestContext {
            method: "GET".to_string(),
            path: "/api/users".to_string(),
            client_ip: "192.168.1.1".to_string(),
            user_agent: "curl/7.68".to_string(),
            user_id: None,
            request_id: "req-1".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_logs_incoming_then_outgoing() {
        let (interceptor, logs) = interceptor();

        let result = interceptor
            .intercept(&users_context(), async {
                tokio::time::sleep(Duration::from_millis(42)).await;
                Ok::<_, RaisedError>(StatusCode::OK.into_response())
            })
            .await;

        assert_eq!(result.unwrap().status(), StatusCode::OK);
        assert_eq!(
            logs.messages(),
            vec![
                "Incoming Request: GET /api/users - 192.168.1.1 - curl/7.68",
                "Outgoing Response: GET /api/users - 200 - 42ms",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_follows_clock() {
        let (interceptor, logs) = interceptor();
        let ctx = test_context("POST", "/api/messages");

        interceptor
            .intercept(&ctx, async {
                tokio::time::advance(Duration::from_millis(150)).await;
                Ok::<_, RaisedError>(StatusCode::CREATED.into_response())
            })
            .await
            .unwrap();

        let messages = logs.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].contains("201"));
        assert!(messages[1].contains("150ms"));
    }

    #[tokio::test]
    async fn test_response_passed_through_untouched() {
        let (interceptor, _) = interceptor();
        let mut response = (StatusCode::ACCEPTED, "queued").into_response();
        response
            .headers_mut()
            .insert("x-custom", "kept".parse().unwrap());

        let returned = interceptor
            .intercept(&test_context("GET", "/"), async { Ok::<_, RaisedError>(response) })
            .await
            .unwrap();

        assert_eq!(returned.status(), StatusCode::ACCEPTED);
        assert_eq!(returned.headers()["x-custom"], "kept");
        let body = axum::body::to_bytes(returned.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"queued");
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_logged_and_reraised() {
        let (interceptor, logs) = interceptor();
        let raised = RaisedError::new(ApiError::not_found("User not found"));

        let result = interceptor
            .intercept(&users_context(), {
                let raised = raised.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(7)).await;
                    Err::<Response, _>(raised)
                }
            })
            .await;

        let returned = result.unwrap_err();
        assert!(returned.ptr_eq(&raised));

        let records = logs.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].level, Level::ERROR);
        assert_eq!(
            records[1].message,
            "Request Error: GET /api/users - 404 - 7ms - User not found"
        );
    }

    #[tokio::test]
    async fn test_error_without_status_logs_500() {
        let (interceptor, logs) = interceptor();
        let raised = RaisedError::new(anyhow::anyhow!("disk full").into());

        let result = interceptor
            .intercept(&test_context("DELETE", "/api/files/1"), async { Err::<Response, _>(raised) })
            .await;

        assert!(result.is_err());
        let messages = logs.messages();
        assert!(messages[1].starts_with("Request Error: DELETE /api/files/1 - 500 - "));
        assert!(messages[1].ends_with("ms - disk full"));
    }

    #[tokio::test]
    async fn test_missing_user_agent_is_empty() {
        let (interceptor, logs) = interceptor();
        let mut ctx = users_context();
        ctx.user_agent = String::new();

        interceptor
            .intercept(&ctx, async { Ok::<_, RaisedError>(StatusCode::OK.into_response()) })
            .await
            .unwrap();

        assert_eq!(logs.messages()[0], "Incoming Request: GET /api/users - 192.168.1.1 - ");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_measure_independently() {
        let (interceptor, logs) = interceptor();

        let slow_ctx = test_context("GET", "/slow");
        let fast_ctx = test_context("GET", "/fast");
        let slow = interceptor.intercept(&slow_ctx, async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok::<_, RaisedError>(StatusCode::OK.into_response())
        });
        let fast = interceptor.intercept(&fast_ctx, async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, RaisedError>(StatusCode::OK.into_response())
        });
        let (a, b) = tokio::join!(slow, fast);
        assert!(a.is_ok() && b.is_ok());

        let messages = logs.messages();
        assert_eq!(messages.len(), 4);
        assert!(messages.contains(&"Outgoing Response: GET /slow - 200 - 300ms".to_string()));
        assert!(messages.contains(&"Outgoing Response: GET /fast - 200 - 20ms".to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_request_logs_no_outcome() {
        let (interceptor, logs) = interceptor();
        tokio::time::pause();
        let ctx = test_context("GET", "/hang");

        let pending = interceptor.intercept(&ctx, async {
            std::future::pending::<()>().await;
            Ok::<_, RaisedError>(StatusCode::OK.into_response())
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;

        assert!(timed_out.is_err());
        assert_eq!(logs.messages(), vec!["Incoming Request: GET /hang - 127.0.0.1 - test-agent"]);
    }
}
