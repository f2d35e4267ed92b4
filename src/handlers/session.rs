use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
};
use std::sync::Arc;
use tracing::debug;

use crate::cache::make_cache_key;
use crate::error::GatewayError;
use crate::metrics::{CACHE_HITS, CACHE_MISSES, CACHE_SIZE};
use crate::models::Session;
use crate::state::AppState;

const SESSION_NAMESPACE: &str = "session";

fn bearer_token(headers: &HeaderMap) -> Result<&str, GatewayError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(GatewayError::MissingCredentials)
}

// Expired sessions are dropped first so the gauge only counts live ones
fn record_cache_size(state: &AppState) {
    state.session_cache.purge_expired();
    CACHE_SIZE.set(state.session_cache.len() as f64);
}

// Session lookup: cache first, auth backend on a miss
pub async fn session_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Session>, GatewayError> {
    let token = bearer_token(&headers)?;
    let cache_key = make_cache_key(SESSION_NAMESPACE, &[token]);

    if let Some(session) = state.session_cache.get(&cache_key) {
        CACHE_HITS.inc();
        debug!(user = %session.id, "Session cache hit");
        return Ok(Json(session));
    }
    CACHE_MISSES.inc();
    debug!("Session cache miss - calling auth backend");

    let session = state.auth.fetch_session(token).await?;

    state.session_cache.set(cache_key, session.clone());
    record_cache_size(&state);

    Ok(Json(session))
}

// Logout path: forget the cached session so the next lookup goes upstream
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, GatewayError> {
    let token = bearer_token(&headers)?;
    state
        .session_cache
        .delete(&make_cache_key(SESSION_NAMESPACE, &[token]));
    record_cache_size(&state);

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(GatewayError::MissingCredentials)));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def");
    }
}
