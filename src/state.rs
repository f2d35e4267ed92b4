use std::sync::Arc;

use crate::cache::{CacheConfig, ResponseCache};
use crate::config::Args;
use crate::error::GatewayError;
use crate::models::Session;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::upstream::AuthBackend;

// app's shared state, one per server instance
pub struct AppState {
    pub auth: AuthBackend,
    pub rate_limiter: RateLimiter,
    pub session_cache: ResponseCache<Session>,
}

impl AppState {
    pub fn new(
        auth: AuthBackend,
        rate_limit: RateLimitConfig,
        cache: CacheConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            auth,
            rate_limiter: RateLimiter::new(rate_limit),
            session_cache: ResponseCache::new(cache),
        })
    }

    pub fn from_args(args: &Args) -> Result<Arc<Self>, GatewayError> {
        Ok(Self::new(
            AuthBackend::new(&args.upstream_url, args.upstream_timeout())?,
            args.rate_limit_config(),
            args.cache_config(),
        ))
    }
}
