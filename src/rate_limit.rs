/// Request rate limiting
use crate::{
    config::RateLimitConfig,
    context::AppContext,
    error::{AppError, AppResult},
};
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Process-wide limiter with separate quotas for signed-in and anonymous callers
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    authenticated_rps: u32,
    unauthenticated_rps: u32,
    authenticated: Arc<DirectLimiter>,
    unauthenticated: Arc<DirectLimiter>,
}

fn quota(rps: u32, burst: u32, fallback: NonZeroU32) -> Quota {
    let rate = NonZeroU32::new(rps).unwrap_or(fallback);
    let burst = NonZeroU32::new(burst).unwrap_or(rate);
    Quota::per_second(rate).allow_burst(burst)
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let auth_quota = quota(config.authenticated_rps, config.burst_size, NonZeroU32::MIN);
        // Anonymous traffic gets a fifth of the burst
        let unauth_quota = quota(config.unauthenticated_rps, config.burst_size / 5, NonZeroU32::MIN);

        Self {
            enabled: config.enabled,
            authenticated_rps: config.authenticated_rps,
            unauthenticated_rps: config.unauthenticated_rps,
            authenticated: Arc::new(GovernorLimiter::direct(auth_quota)),
            unauthenticated: Arc::new(GovernorLimiter::direct(unauth_quota)),
        }
    }

    fn check(&self, limiter: &DirectLimiter) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }
        limiter.check().map_err(|_| AppError::RateLimitExceeded {
            retry_after: Duration::from_secs(1),
        })
    }

    pub fn check_authenticated(&self) -> AppResult<()> {
        self.check(&self.authenticated)
    }

    pub fn check_unauthenticated(&self) -> AppResult<()> {
        self.check(&self.unauthenticated)
    }

    fn limit_for(&self, authenticated: bool) -> u32 {
        if authenticated {
            self.authenticated_rps
        } else {
            self.unauthenticated_rps
        }
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let has_auth_header = request.headers().contains_key("authorization");

    if has_auth_header {
        ctx.rate_limiter.check_authenticated()?;
    } else {
        ctx.rate_limiter.check_unauthenticated()?;
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(
        "X-RateLimit-Limit",
        HeaderValue::from(ctx.rate_limiter.limit_for(has_auth_header)),
    );

    Ok(response)
}
