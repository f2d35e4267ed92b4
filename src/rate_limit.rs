use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::{Duration, Instant};

// Rate limit settings, fixed at construction
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 60,
        }
    }
}

// Rate limit entry - tracks requests per IP/key
#[derive(Debug, Clone, Copy)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_time: Instant,
}

impl RateLimitEntry {
    fn fresh(now: Instant, window: Duration) -> Self {
        Self {
            count: 1,
            reset_time: now + window,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.reset_time
    }
}

/// Outcome of a single [`RateLimiter::check`].
///
/// Gate on `allowed`; `remaining` bottoms out at zero and stays there while
/// the caller keeps hammering the same window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub limit: u32,
    pub reset_time: Instant,
}

impl RateLimitDecision {
    pub fn retry_after(&self) -> Duration {
        self.reset_time.saturating_duration_since(Instant::now())
    }

    // Wall clock view of reset_time for headers and JSON bodies
    pub fn reset_at(&self) -> DateTime<Utc> {
        let delta = chrono::Duration::from_std(self.retry_after())
            .unwrap_or_else(|_| chrono::Duration::zero());
        Utc::now() + delta
    }
}

/// Fixed-window request counter keyed by caller identifier.
///
/// One entry per identifier. Every check first sweeps entries whose window
/// has closed, so the map only holds identifiers seen in their current window.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    entries: DashMap<String, RateLimitEntry>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    pub fn check(&self, identifier: &str) -> RateLimitDecision {
        self.check_at(identifier, Instant::now())
    }

    pub fn is_rate_limited(&self, identifier: &str) -> bool {
        !self.check(identifier).allowed
    }

    pub(crate) fn check_at(&self, identifier: &str, now: Instant) -> RateLimitDecision {
        self.sweep(now);

        let window = self.config.window;
        let limit = self.config.max_requests;

        // entry() holds the shard lock for the whole check-then-update
        let mut entry = self
            .entries
            .entry(identifier.to_string())
            .or_insert_with(|| RateLimitEntry {
                count: 0,
                reset_time: now + window,
            });

        // new identifier or window rolled over: start again at 1
        let allowed = if entry.count == 0 || entry.is_expired(now) {
            *entry = RateLimitEntry::fresh(now, window);
            true
        } else {
            // clamp so abusive callers can't grow the counter without bound
            entry.count = entry.count.saturating_add(1).min(limit.saturating_add(1));
            entry.count <= limit
        };

        RateLimitDecision {
            allowed,
            remaining: limit.saturating_sub(entry.count),
            limit,
            reset_time: entry.reset_time,
        }
    }

    fn sweep(&self, now: Instant) {
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }

    pub fn reset(&self, identifier: &str) {
        self.entries.remove(identifier);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
