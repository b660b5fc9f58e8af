//! Fixed-window rate limiter
//!
//! One counter per identifier. The first request of a window sets `count = 1`
//! and the window expiry; later requests increment until `limit`, after which
//! requests are refused until the window rolls over.

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Time until the current window rolls over
    pub retry_after: Duration,
    /// Requests left in the current window
    pub remaining: u32,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    expires_at: Instant,
}

/// Per-identifier fixed-window counters
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    /// Create an empty limiter
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a request for `identifier` against `limit` per `window`
    pub fn check(&self, identifier: &str, limit: u32, window: Duration) -> RateLimitDecision {
        self.check_at(identifier, limit, window, Instant::now())
    }

    fn check_at(
        &self,
        identifier: &str,
        limit: u32,
        window: Duration,
        now: Instant,
    ) -> RateLimitDecision {
        let mut entry = self
            .windows
            .entry(identifier.to_string())
            .or_insert(Window {
                count: 0,
                expires_at: now,
            });

        if entry.count == 0 || entry.expires_at <= now {
            *entry = Window {
                count: 1,
                expires_at: now + window,
            };
            return RateLimitDecision {
                allowed: limit > 0,
                retry_after: window,
                remaining: limit.saturating_sub(1),
            };
        }

        let retry_after = entry.expires_at.saturating_duration_since(now);

        if entry.count >= limit {
            return RateLimitDecision {
                allowed: false,
                retry_after,
                remaining: 0,
            };
        }

        entry.count += 1;
        RateLimitDecision {
            allowed: true,
            retry_after,
            remaining: limit - entry.count,
        }
    }

    /// Drop windows that have rolled over
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut purged = 0;
        self.windows.retain(|_, window| {
            let live = window.expires_at > now;
            if !live {
                purged += 1;
            }
            live
        });
        purged
    }

    /// Number of tracked identifiers
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}
