// Per-identity fixed-window rate limiting.
//
// A check is also the increment: there is no separate commit step. The counter
// store is injected so the same limiter runs against process memory or Redis.

pub mod clock;
pub mod redis_store;
pub mod store;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::ratelimit::clock::Clock;
use crate::ratelimit::store::{CounterStore, Window};

/// Identity used when the caller cannot be identified. Every anonymous caller
/// shares this one quota.
pub const ANONYMOUS_IDENTITY: &str = "anonymous";

/// What to do when the counter store cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Deny the request.
    Closed,
    /// Let the request through uncounted.
    Open,
}

impl FromStr for FailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "closed" => Ok(FailureMode::Closed),
            "open" => Ok(FailureMode::Open),
            other => Err(format!("unknown rate limit failure mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Maximum requests per identity per window.
    pub limit: u64,
    pub window: Duration,
    pub failure_mode: FailureMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// `reset_at` as ISO-8601 with millisecond precision, e.g. `2025-01-01T01:00:00.000Z`.
    pub fn reset_iso(&self) -> String {
        self.reset_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Writes `X-RateLimit-Limit`, `X-RateLimit-Remaining` and `X-RateLimit-Reset`.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert("x-ratelimit-limit", HeaderValue::from(self.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(self.remaining));
        if let Ok(reset) = HeaderValue::from_str(&self.reset_iso()) {
            headers.insert("x-ratelimit-reset", reset);
        }
    }
}

pub struct RateLimiter {
    name: &'static str,
    config: RateLimitConfig,
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(
        name: &'static str,
        config: RateLimitConfig,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name,
            config,
            store,
            clock,
        }
    }

    /// Counts one request against `identity` and decides whether it may proceed.
    pub async fn check(&self, identity: &str) -> RateLimitDecision {
        let identity = if identity.trim().is_empty() {
            ANONYMOUS_IDENTITY
        } else {
            identity
        };
        let limit = self.config.limit;
        let window = Window::containing(self.clock.now(), self.config.window);
        let reset_at = window.reset_at();

        match self.store.increment(identity, &window).await {
            Ok(count) => {
                let allowed = count <= limit;
                let remaining = limit - count.min(limit);
                if !allowed {
                    debug!(limiter = self.name, count, limit, "rate limit exceeded");
                }
                RateLimitDecision {
                    allowed,
                    limit,
                    remaining,
                    reset_at,
                }
            }
            Err(e) => {
                warn!(
                    limiter = self.name,
                    mode = ?self.config.failure_mode,
                    "Rate limit store failed: {e}"
                );
                match self.config.failure_mode {
                    FailureMode::Closed => RateLimitDecision {
                        allowed: false,
                        limit,
                        remaining: 0,
                        reset_at,
                    },
                    FailureMode::Open => RateLimitDecision {
                        allowed: true,
                        limit,
                        remaining: limit,
                        reset_at,
                    },
                }
            }
        }
    }
}

#[cfg(test)]
pub mod test_support {
    use async_trait::async_trait;

    use super::store::{CounterStore, StoreError, Window};

    /// A store that is always down.
    pub struct UnreachableStore;

    #[async_trait]
    impl CounterStore for UnreachableStore {
        async fn increment(&self, _identity: &str, _window: &Window) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }
}
