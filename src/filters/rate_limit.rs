use anyhow::{bail, Result};
use chrono::Utc;
use serde_json::{json, Value};

use super::base::BaseFilter;
use super::sink::ResponseSink;
use super::{ExceptionFilter, FilterOutcome};
use crate::context::RequestContext;
use crate::errors::{response, ApiError, RaisedError};
use crate::logging::Logger;

/// Read-only throttling policy advertised to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Requests allowed per window
    pub max_requests: u32,
    pub window_seconds: u32,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_seconds: 60,
        }
    }
}

impl RateLimitPolicy {
    /// Limit and window must both be non-zero
    pub fn validate(&self) -> Result<()> {
        if self.max_requests == 0 {
            bail!("rate limit max_requests must be > 0");
        }
        if self.window_seconds == 0 {
            bail!("rate limit window_seconds must be > 0");
        }
        Ok(())
    }
}

/// Header values for one rejected request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at_epoch_ms: i64,
    pub retry_after_seconds: i64,
}

impl RateLimitDecision {
    /// The caller used the whole window; it resets one window from `now_ms`
    pub fn exhausted(policy: &RateLimitPolicy, now_ms: i64) -> Self {
        let window = i64::from(policy.window_seconds);
        Self {
            limit: policy.max_requests,
            remaining: 0,
            reset_at_epoch_ms: now_ms + window * 1000,
            retry_after_seconds: window,
        }
    }
}

/// Turns throttling errors into 429 responses with rate-limit headers
#[derive(Debug, Clone)]
pub struct RateLimitFilter {
    base: BaseFilter,
    policy: RateLimitPolicy,
}

impl RateLimitFilter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_logger(policy, Logger::new("RateLimitFilter"))
    }

    pub fn with_logger(policy: RateLimitPolicy, logger: Logger) -> Self {
        Self {
            base: BaseFilter::new(logger),
            policy,
        }
    }
}

impl ExceptionFilter for RateLimitFilter {
    fn catch(
        &self,
        raised: RaisedError,
        ctx: &RequestContext,
        sink: &mut dyn ResponseSink,
    ) -> FilterOutcome {
        if !raised.error().is_throttled() {
            return FilterOutcome::NotHandled(raised);
        }

        self.base.logger().warn(format!(
            "Rate Limit Exceeded: {} {} - IP: {} - User: {}",
            ctx.method,
            ctx.path,
            ctx.client_ip,
            ctx.identity()
        ));

        let decision = RateLimitDecision::exhausted(&self.policy, Utc::now().timestamp_millis());
        sink.set_header("Retry-After", &decision.retry_after_seconds.to_string());
        sink.set_header("X-RateLimit-Limit", &decision.limit.to_string());
        sink.set_header("X-RateLimit-Remaining", &decision.remaining.to_string());
        sink.set_header("X-RateLimit-Reset", &decision.reset_at_epoch_ms.to_string());

        let envelope = response::build_rate_limit_error_with_details(
            ctx,
            Some(decision.retry_after_seconds),
            throttle_details(raised.error()),
        );
        self.base.write_envelope(sink, 429, &envelope);

        FilterOutcome::Handled
    }
}

fn throttle_details(error: &ApiError) -> Option<Value> {
    match error {
        ApiError::Throttled {
            message,
            payload: Some(payload),
        } => Some(json!({ "originalMessage": message, "upstreamPayload": payload })),
        other => Some(json!({ "originalMessage": other.to_string() })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_context;
    use crate::filters::sink::{RecordingSink, SinkCall};
    use crate::logging::MemorySink;
    use tracing::Level;

    fn filter_with_sink() -> (RateLimitFilter, std::sync::Arc<MemorySink>) {
        let logs = MemorySink::new();
        let filter = RateLimitFilter::with_logger(
            RateLimitPolicy::default(),
            Logger::with_sink("RateLimitFilter", logs.clone()),
        );
        (filter, logs)
    }

    #[test]
    fn test_policy_validation() {
        assert!(RateLimitPolicy::default().validate().is_ok());

        let err = RateLimitPolicy { max_requests: 0, window_seconds: 60 }
            .validate()
            .unwrap_err();
        assert_eq!(err.to_string(), "rate limit max_requests must be > 0");

        let err = RateLimitPolicy { max_requests: 100, window_seconds: 0 }
            .validate()
            .unwrap_err();
        assert_eq!(err.to_string(), "rate limit window_seconds must be > 0");
    }

    #[test]
    fn test_throttled_request_gets_429() {
        let (filter, logs) = filter_with_sink();
        let mut ctx = test_context("POST", "/api/messages");
        ctx.client_ip = "10.0.0.5".to_string();
        ctx.user_id = Some("u42".to_string());

        let before = Utc::now().timestamp_millis();
        let mut sink = RecordingSink::default();
        let outcome = filter.catch(
            RaisedError::new(ApiError::throttled("ThrottlerException: Too Many Requests")),
            &ctx,
            &mut sink,
        );
        let after = Utc::now().timestamp_millis();

        assert!(matches!(outcome, FilterOutcome::Handled));
        assert_eq!(sink.status(), Some(429));
        assert_eq!(sink.header("Retry-After"), Some("60"));
        assert_eq!(sink.header("X-RateLimit-Limit"), Some("100"));
        assert_eq!(sink.header("X-RateLimit-Remaining"), Some("0"));

        let reset: i64 = sink.header("X-RateLimit-Reset").unwrap().parse().unwrap();
        assert!(reset >= before + 60_000 && reset <= after + 60_000);

        let body = sink.body().unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "RATE_LIMIT_EXCEEDED");
        assert_eq!(body["retryAfter"], 60);
        assert_eq!(body["path"], "/api/messages");
        assert_eq!(body["method"], "POST");

        let records = logs.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Level::WARN);
        assert_eq!(
            records[0].message,
            "Rate Limit Exceeded: POST /api/messages - IP: 10.0.0.5 - User: u42"
        );
    }

    #[test]
    fn test_headers_written_before_status_and_body() {
        let (filter, _) = filter_with_sink();
        let ctx = test_context("GET", "/");
        let mut sink = RecordingSink::default();
        filter.catch(RaisedError::new(ApiError::throttled("slow down")), &ctx, &mut sink);

        let names: Vec<&str> = sink
            .calls
            .iter()
            .filter_map(|call| match call {
                SinkCall::Header(name, _) => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            names,
            ["Retry-After", "X-RateLimit-Limit", "X-RateLimit-Remaining", "X-RateLimit-Reset"]
        );
        assert!(matches!(sink.calls[4], SinkCall::Status(429)));
        assert!(matches!(sink.calls[5], SinkCall::Json(_)));
        assert_eq!(sink.calls.len(), 6);
    }

    #[test]
    fn test_anonymous_caller() {
        let (filter, logs) = filter_with_sink();
        let ctx = test_context("GET", "/api/users");
        let mut sink = RecordingSink::default();
        filter.catch(RaisedError::new(ApiError::throttled("slow down")), &ctx, &mut sink);

        assert!(logs.messages()[0].ends_with("User: anonymous"));
    }

    #[test]
    fn test_upstream_payload_in_details() {
        let (filter, _) = filter_with_sink();
        let ctx = test_context("GET", "/");
        let mut sink = RecordingSink::default();
        let error = ApiError::Throttled {
            message: "Too Many Requests".to_string(),
            payload: Some(json!({"statusCode": 429})),
        };
        filter.catch(RaisedError::new(error), &ctx, &mut sink);

        let details = &sink.body().unwrap()["details"];
        assert_eq!(details["originalMessage"], "Too Many Requests");
        assert_eq!(details["upstreamPayload"]["statusCode"], 429);
    }

    #[test]
    fn test_marker_in_message_matches() {
        let (filter, _) = filter_with_sink();
        let ctx = test_context("GET", "/");
        let mut sink = RecordingSink::default();
        let outcome = filter.catch(
            RaisedError::new(ApiError::http(429, "ThrottlerException: Too Many Requests")),
            &ctx,
            &mut sink,
        );
        assert!(matches!(outcome, FilterOutcome::Handled));
        assert_eq!(sink.status(), Some(429));
    }

    #[test]
    fn test_other_errors_pass_through_untouched() {
        let (filter, logs) = filter_with_sink();
        let ctx = test_context("GET", "/");
        let raised = RaisedError::new(ApiError::not_found("User not found"));

        let mut sink = RecordingSink::default();
        match filter.catch(raised.clone(), &ctx, &mut sink) {
            FilterOutcome::NotHandled(returned) => assert!(returned.ptr_eq(&raised)),
            FilterOutcome::Handled => panic!("non-throttle error was handled"),
        }
        assert!(sink.calls.is_empty());
        assert!(logs.records().is_empty());
    }

    #[test]
    fn test_decision_follows_policy() {
        let policy = RateLimitPolicy {
            max_requests: 10,
            window_seconds: 30,
        };
        let decision = RateLimitDecision::exhausted(&policy, 1_000);
        assert_eq!(decision.limit, 10);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.reset_at_epoch_ms, 31_000);
        assert_eq!(decision.retry_after_seconds, 30);
    }
}
