//! In-memory sliding-window rate limiter, keyed by credential string.
//!
//! Grounded on the source's `RateLimiter` class: a per-key ordered
//! timestamp sequence, pruned from the front on each call. The Rust port
//! trades the source's global singleton for an explicitly-owned,
//! constructor-injected component (§9).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::{Decision, RateLimitBackend, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECONDS};

/// A mutex-guarded map from credential key to its request timestamp deque.
/// Entries are pruned lazily: only the key being checked is pruned, never
/// the whole map, so steady-state cost is O(active keys), not O(all keys
/// ever seen).
pub struct MemoryRateLimiter {
    max_requests: u32,
    window: Duration,
    state: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl MemoryRateLimiter {
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_seconds),
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Drop all tracked state. Test-only; the source exposes an equivalent
    /// `clear()` for the same reason.
    #[cfg(test)]
    fn clear(&self) {
        self.state.lock().unwrap().clear();
    }
}

impl Default for MemoryRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECONDS)
    }
}

#[async_trait]
impl RateLimitBackend for MemoryRateLimiter {
    async fn check(&self, key: &str) -> Decision {
        let now = Instant::now();
        let window_start = now.checked_sub(self.window).unwrap_or(now);

        let mut state = self.state.lock().unwrap();
        let timestamps = state.entry(key.to_string()).or_default();

        while let Some(&oldest) = timestamps.front() {
            if oldest < window_start {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() as u32 >= self.max_requests {
            let oldest = *timestamps.front().expect("len >= max_requests > 0 implies non-empty");
            let retry_after = oldest.saturating_duration_since(window_start).as_secs() + 1;
            return Decision {
                allowed: false,
                retry_after_secs: retry_after.max(1),
                remaining: 0,
                limit: self.max_requests,
            };
        }

        timestamps.push_back(now);
        Decision {
            allowed: true,
            retry_after_secs: 0,
            remaining: self.max_requests - timestamps.len() as u32,
            limit: self.max_requests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_the_limit_then_rejects() {
        let limiter = MemoryRateLimiter::new(3, 60);
        for _ in 0..3 {
            let d = limiter.check("key-a").await;
            assert!(d.allowed);
        }
        let d = limiter.check("key-a").await;
        assert!(!d.allowed);
        assert!(d.retry_after_secs >= 1);
        assert_eq!(d.remaining, 0);
    }

    #[tokio::test]
    async fn keys_are_isolated() {
        let limiter = MemoryRateLimiter::new(1, 60);
        assert!(limiter.check("a").await.allowed);
        assert!(!limiter.check("a").await.allowed);
        assert!(limiter.check("b").await.allowed);
    }

    #[tokio::test]
    async fn remaining_counts_down() {
        let limiter = MemoryRateLimiter::new(5, 60);
        assert_eq!(limiter.check("k").await.remaining, 4);
        assert_eq!(limiter.check("k").await.remaining, 3);
    }

    #[tokio::test]
    async fn clear_resets_all_state() {
        let limiter = MemoryRateLimiter::new(1, 60);
        assert!(limiter.check("a").await.allowed);
        assert!(!limiter.check("a").await.allowed);
        limiter.clear();
        assert!(limiter.check("a").await.allowed);
    }

    #[tokio::test]
    async fn requests_outside_the_window_are_pruned() {
        let limiter = MemoryRateLimiter::new(1, 0);
        assert!(limiter.check("a").await.allowed);
        // A zero-second window means the prior timestamp is immediately
        // outside `now - window`, so the next call is admitted too.
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(limiter.check("a").await.allowed);
    }
}
