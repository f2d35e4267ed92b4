use clap::Parser;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::rate_limit::RateLimitConfig;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "classifieds-gateway")]
#[command(about = "Rate limiting, session caching gateway in front of the marketplace auth backend")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "GATEWAY_PORT", default_value_t = 8080)]
    pub port: u16,

    // Base URL of the hosted auth/storage backend
    #[arg(short, long, env = "GATEWAY_UPSTREAM_URL", default_value = "http://localhost:54321")]
    pub upstream_url: String,

    // Rate limit max requests per window
    #[arg(long, env = "GATEWAY_RATE_LIMIT", default_value_t = 60)]
    pub rate_limit: u32,

    // Rate limit window in milliseconds
    #[arg(long, env = "GATEWAY_RATE_WINDOW_MS", default_value_t = 60_000)]
    pub rate_window_ms: u64,

    // Cache TTL in milliseconds
    #[arg(short, long, env = "GATEWAY_CACHE_TTL_MS", default_value_t = 30_000)]
    pub cache_ttl_ms: u64,

    // Max cached entries
    #[arg(
        long,
        env = "GATEWAY_CACHE_MAX_SIZE",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub cache_max_size: u64,

    // Timeout for a single upstream call
    #[arg(long, env = "GATEWAY_UPSTREAM_TIMEOUT_MS", default_value_t = 5_000)]
    pub upstream_timeout_ms: u64,
}

impl Args {
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            window: Duration::from_millis(self.rate_window_ms),
            max_requests: self.rate_limit,
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_millis(self.cache_ttl_ms),
            max_size: usize::try_from(self.cache_max_size).unwrap_or(usize::MAX),
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }
}
