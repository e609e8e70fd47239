//! Rate limiter for the public `/api` surface

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// Entries kept before stale windows are pruned
const PRUNE_THRESHOLD: usize = 1024;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of requests allowed per window
    pub max_requests: u32,
    /// Time window in seconds
    pub window_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_seconds: 900, // 15 minutes
        }
    }
}

/// Rate limiter entry
#[derive(Debug)]
struct RateLimiterEntry {
    /// Requests seen in the current window
    requests: u32,
    /// Start of the current window
    window_start: Instant,
}

/// Fixed-window rate limiter keyed by client address
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, RateLimiterEntry>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record a request from `key` and report whether it is within the limit
    pub async fn is_allowed(&self, key: &str) -> bool {
        self.is_allowed_at(key, Instant::now()).await
    }

    pub async fn is_allowed_at(&self, key: &str, now: Instant) -> bool {
        let window = self.window();
        let mut entries = self.entries.lock().await;

        if entries.len() >= PRUNE_THRESHOLD {
            entries.retain(|_, entry| now.duration_since(entry.window_start) < window);
        }

        let entry = entries.entry(key.to_string()).or_insert(RateLimiterEntry {
            requests: 0,
            window_start: now,
        });

        // Window expired, start a new one
        if now.duration_since(entry.window_start) >= window {
            entry.requests = 0;
            entry.window_start = now;
        }

        if entry.requests >= self.config.max_requests {
            warn!(
                "Rate limit exceeded for {} ({} requests in {}s)",
                key, entry.requests, self.config.window_seconds
            );
            return false;
        }

        entry.requests += 1;
        true
    }

    /// Get the rate limiter configuration
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.window_seconds)
    }
}
