//! Sliding-window rate limiting for the gated completion routes
//!
//! The limiter estimates the request count over the trailing window as the
//! current fixed window's count plus the previous window's count weighted by
//! how much of it still overlaps the trailing window.

use crate::error::ConfigError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Entries are pruned once the map grows past this many identifiers
const PRUNE_THRESHOLD: usize = 1024;

/// Parse a window like `10 s`, `1m`, `500 ms`, `2 h` or `1 d`
pub fn parse_window(raw: &str) -> Result<Duration, ConfigError> {
    let trimmed = raw.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let amount: u64 = number
        .parse()
        .map_err(|_| ConfigError::invalid("RATE_LIMIT_WINDOW", raw))?;
    if amount == 0 {
        return Err(ConfigError::invalid("RATE_LIMIT_WINDOW", raw));
    }

    let scale: u64 = match unit.trim() {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        _ => return Err(ConfigError::invalid("RATE_LIMIT_WINDOW", raw)),
    };

    amount
        .checked_mul(scale)
        .map(Duration::from_millis)
        .ok_or_else(|| ConfigError::invalid("RATE_LIMIT_WINDOW", raw))
}

/// Result of one rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitOutcome {
    pub success: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix time in milliseconds at which the current window ends
    pub reset_ms: u64,
}

/// A counter store that decides whether an identifier may proceed
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn limit(&self, identifier: &str) -> RateLimitOutcome;
}

pub type SharedRateLimiter = Arc<dyn RateLimiter>;

#[derive(Debug, Clone, Copy)]
struct WindowCounts {
    window: u64,
    current: u32,
    previous: u32,
}

/// In-process sliding-window counter
pub struct SlidingWindowLimiter {
    requests: u32,
    window_ms: u64,
    counters: Mutex<HashMap<String, WindowCounts>>,
}

impl SlidingWindowLimiter {
    pub fn new(requests: u32, window: Duration) -> Self {
        Self {
            requests: requests.max(1),
            window_ms: (window.as_millis() as u64).max(1),
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Check `identifier` at an explicit point in time (unix milliseconds)
    pub fn check_at(&self, identifier: &str, now_ms: u64) -> RateLimitOutcome {
        let window = now_ms / self.window_ms;
        let reset_ms = (window + 1).saturating_mul(self.window_ms);

        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());

        if counters.len() > PRUNE_THRESHOLD {
            counters.retain(|_, c| c.window + 1 >= window);
        }

        let entry = counters
            .entry(identifier.to_string())
            .or_insert(WindowCounts {
                window,
                current: 0,
                previous: 0,
            });

        if entry.window != window {
            entry.previous = if entry.window + 1 == window { entry.current } else { 0 };
            entry.current = 0;
            entry.window = window;
        }

        let elapsed = (now_ms % self.window_ms) as f64 / self.window_ms as f64;
        let weighted_previous = (entry.previous as f64 * (1.0 - elapsed)).floor() as u32;
        let used = weighted_previous.saturating_add(entry.current);

        if used >= self.requests {
            return RateLimitOutcome {
                success: false,
                limit: self.requests,
                remaining: 0,
                reset_ms,
            };
        }

        entry.current += 1;
        RateLimitOutcome {
            success: true,
            limit: self.requests,
            remaining: self.requests - used - 1,
            reset_ms,
        }
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn limit(&self, identifier: &str) -> RateLimitOutcome {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        self.check_at(identifier, now_ms)
    }
}
