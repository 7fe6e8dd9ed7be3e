use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use anyhow::{Context, Result};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::context::RequestContext;
use crate::errors::ApiError;
use crate::filters::RateLimitPolicy;

/// Per-caller request limiter.
///
/// Only decides when to reject; the response is built by the rate-limit
/// exception filter.
#[derive(Clone)]
pub struct Throttle {
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
}

impl Throttle {
    pub fn new(policy: &RateLimitPolicy) -> Result<Self> {
        policy.validate()?;
        let burst =
            NonZeroU32::new(policy.max_requests).context("rate limit max_requests must be > 0")?;
        let window = Duration::from_secs(u64::from(policy.window_seconds));
        let quota = Quota::with_period(window / burst.get())
            .context("invalid rate limit period")?
            .allow_burst(burst);

        Ok(Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        })
    }

    pub fn check(&self, key: &str) -> Result<(), ApiError> {
        self.limiter.check_key(&key.to_string()).map_err(|_| {
            debug!(key = %key, "Request throttled");
            ApiError::throttled("ThrottlerException: Too Many Requests")
        })
    }
}

/// Authenticated users are limited by id, everyone else by client IP
fn throttle_key(ctx: &RequestContext) -> String {
    match ctx.user_id.as_deref() {
        Some(id) if !id.is_empty() => format!("user:{id}"),
        _ => format!("ip:{}", ctx.client_ip),
    }
}

pub async fn throttle_middleware(
    State(throttle): State<Throttle>,
    request: Request,
    next: Next,
) -> Response {
    let ctx = RequestContext::from_request(&request);
    if let Err(e) = throttle.check(&throttle_key(&ctx)) {
        return e.into_response();
    }
    next.run(request).await
}
