//! # Middleware Module
//!
//! Global rate limiting for the HTTP API.
//!
//! ## Configuration
//!
//! The quota comes from `limits.rate_per_second` (default: 100). Zero
//! turns the limiter off entirely; the router then skips this layer.

use crate::error::ErrorBody;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Default rate limit: 100 requests per second.
const DEFAULT_RPS: NonZeroU32 = NonZeroU32::MIN.saturating_add(99);

// =============================================================================
// RATE LIMITER
// =============================================================================

/// One limiter shared by every route, not keyed by client.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create the global rate limiter.
///
/// # Arguments
/// * `requests_per_second` - Sustained quota; zero falls back to 100
///
/// # Returns
/// A thread-safe limiter wrapped in Arc, cloned into the middleware state.
pub fn create_rate_limiter(requests_per_second: u32) -> GlobalRateLimiter {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(DEFAULT_RPS);
    Arc::new(RateLimiter::direct(Quota::per_second(rps)))
}

/// Rate limiting middleware.
///
/// Checks the global limiter before a request reaches authentication.
/// Once the quota is spent the request is answered 429 with a
/// `resource-exhausted` error body and never runs.
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if limiter.check().is_ok() {
        return next.run(request).await;
    }
    tracing::warn!("Rate limit exceeded");
    let body = ErrorBody {
        code: "resource-exhausted".to_string(),
        message: "too many requests".to_string(),
    };
    (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
}

// =============================================================================
// TESTS
// =============================================================================
