use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

use crate::error::GatewayError;
use crate::metrics::{RATE_LIMITED_TOTAL, RATE_LIMIT_TRACKED, REQUEST_TOTAL};
use crate::rate_limit::RateLimitDecision;
use crate::state::AppState;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

const ANONYMOUS: &str = "anonymous";

// Caller identity for rate limiting: first forwarded hop, then x-real-ip, then the socket peer
pub fn client_identifier(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| ANONYMOUS.to_string())
}

fn seconds_until_reset(decision: &RateLimitDecision) -> u64 {
    let wait = decision.retry_after();
    // round up so clients never retry a hair too early
    wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(seconds_until_reset(decision)));
}

pub async fn rate_limit_layer(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    REQUEST_TOTAL.inc();

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identifier = client_identifier(req.headers(), peer);

    let decision = state.rate_limiter.check(&identifier);
    RATE_LIMIT_TRACKED.set(state.rate_limiter.len() as f64);

    if !decision.allowed {
        RATE_LIMITED_TOTAL.inc();
        warn!(
            identifier = %identifier,
            reset_at = %decision.reset_at().to_rfc3339(),
            "Rate limit exceeded"
        );

        let mut response = GatewayError::RateLimited {
            retry_after_secs: seconds_until_reset(&decision),
        }
        .into_response();
        apply_headers(response.headers_mut(), &decision);
        return response;
    }

    let mut response = next.run(req).await;
    apply_headers(response.headers_mut(), &decision);
    response
}
