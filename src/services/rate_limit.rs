//! In-memory sliding-window request limiter keyed by client identifier.
//!
//! Each identifier maps to the millisecond timestamps of its admitted
//! requests. Identifiers are never dropped on their own; [`RateLimiter::sweep`]
//! exists for callers that want to reclaim idle entries.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Ceiling reported by [`RateLimiter::remaining`], independent of the
/// ceiling passed to [`RateLimiter::admit`].
pub const REMAINING_CEILING: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    pub remaining: usize,
    /// Unix milliseconds.
    pub reset_time: i64,
}

#[derive(Default)]
pub struct RateLimiter {
    requests: Mutex<HashMap<String, Vec<i64>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request for `identifier` and returns `true` if fewer than
    /// `max_requests` requests fall inside the trailing `window`.
    pub fn admit(&self, identifier: &str, max_requests: usize, window: Duration) -> bool {
        self.admit_at(identifier, max_requests, window, now_ms())
    }

    pub fn admit_at(&self, identifier: &str, max_requests: usize, window: Duration, now: i64) -> bool {
        let window_ms = window_ms(window);
        let mut requests = self.lock();

        let mut valid = in_window(requests.get(identifier), now, window_ms);
        if valid.len() >= max_requests {
            // stored list stays as read; only an accepted call prunes it
            return false;
        }

        valid.push(now);
        requests.insert(identifier.to_string(), valid);
        true
    }

    pub fn remaining(&self, identifier: &str, window: Duration) -> RateLimitInfo {
        self.remaining_at(identifier, window, now_ms())
    }

    pub fn remaining_at(&self, identifier: &str, window: Duration, now: i64) -> RateLimitInfo {
        let window_ms = window_ms(window);
        let requests = self.lock();
        let count = in_window(requests.get(identifier), now, window_ms).len();

        RateLimitInfo {
            remaining: REMAINING_CEILING.saturating_sub(count),
            reset_time: now.saturating_add(window_ms),
        }
    }

    /// Drops identifiers with no requests inside `window`. Returns how many
    /// were removed.
    pub fn sweep(&self, window: Duration) -> usize {
        self.sweep_at(window, now_ms())
    }

    pub fn sweep_at(&self, window: Duration, now: i64) -> usize {
        let window_ms = window_ms(window);
        let mut requests = self.lock();
        let before = requests.len();
        requests.retain(|_, times| times.iter().any(|t| now - t < window_ms));
        before - requests.len()
    }

    pub fn tracked_identifiers(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<i64>>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn in_window(times: Option<&Vec<i64>>, now: i64, window_ms: i64) -> Vec<i64> {
    times
        .map(|times| {
            times
                .iter()
                .copied()
                .filter(|t| now - t < window_ms)
                .collect()
        })
        .unwrap_or_default()
}

fn window_ms(window: Duration) -> i64 {
    i64::try_from(window.as_millis()).unwrap_or(i64::MAX)
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_millis(1000);

    fn stored(limiter: &RateLimiter, id: &str) -> Vec<i64> {
        limiter.lock().get(id).cloned().unwrap_or_default()
    }

    #[test]
    fn test_admits_up_to_ceiling_then_rejects() {
        let limiter = RateLimiter::new();
        assert!(limiter.admit_at("1.2.3.4", 3, SECOND, 0));
        assert!(limiter.admit_at("1.2.3.4", 3, SECOND, 100));
        assert!(limiter.admit_at("1.2.3.4", 3, SECOND, 200));
        assert!(!limiter.admit_at("1.2.3.4", 3, SECOND, 300));
    }

    #[test]
    fn test_admits_again_after_window_elapses() {
        let limiter = RateLimiter::new();
        for t in [0, 10, 20] {
            assert!(limiter.admit_at("ip", 3, SECOND, t));
        }
        assert!(!limiter.admit_at("ip", 3, SECOND, 999));
        assert!(limiter.admit_at("ip", 3, SECOND, 1020));
    }

    #[test]
    fn test_window_boundary_is_exclusive() {
        let limiter = RateLimiter::new();
        assert!(limiter.admit_at("ip", 1, SECOND, 0));
        assert!(!limiter.admit_at("ip", 1, SECOND, 999));
        assert!(limiter.admit_at("ip", 1, SECOND, 1000));
    }

    #[test]
    fn test_identifiers_are_independent() {
        let limiter = RateLimiter::new();
        assert!(limiter.admit_at("a", 1, SECOND, 0));
        assert!(!limiter.admit_at("a", 1, SECOND, 1));
        assert!(limiter.admit_at("b", 1, SECOND, 2));
    }

    #[test]
    fn test_rejection_leaves_stored_list_unfiltered() {
        let limiter = RateLimiter::new();
        for t in [0, 500, 900] {
            assert!(limiter.admit_at("ip", 3, SECOND, t));
        }

        // entry at 0 has aged out, but a rejection does not prune it
        assert!(!limiter.admit_at("ip", 1, SECOND, 1200));
        assert_eq!(stored(&limiter, "ip"), vec![0, 500, 900]);

        // an accepted call replaces the list with its filtered form
        assert!(limiter.admit_at("ip", 3, SECOND, 1300));
        assert_eq!(stored(&limiter, "ip"), vec![500, 900, 1300]);
    }

    #[test]
    fn test_empty_identifier_is_a_shared_bucket() {
        let limiter = RateLimiter::new();
        assert!(limiter.admit_at("", 1, SECOND, 0));
        assert!(!limiter.admit_at("", 1, SECOND, 1));
    }

    #[test]
    fn test_remaining_uses_fixed_ceiling() {
        let limiter = RateLimiter::new();
        for t in 0..3 {
            assert!(limiter.admit_at("ip", 3, SECOND, t));
        }
        let info = limiter.remaining_at("ip", SECOND, 500);
        assert_eq!(info.remaining, REMAINING_CEILING - 3);
        assert_eq!(info.reset_time, 1500);

        let unseen = limiter.remaining_at("other", SECOND, 500);
        assert_eq!(unseen.remaining, REMAINING_CEILING);
    }

    #[test]
    fn test_huge_window_saturates_reset_time() {
        let limiter = RateLimiter::new();
        let forever = Duration::from_secs(u64::MAX);

        assert!(limiter.admit_at("a", 2, forever, 1_000));
        let info = limiter.remaining_at("a", forever, 2_000);
        assert_eq!(info.remaining, REMAINING_CEILING - 1);
        assert_eq!(info.reset_time, i64::MAX);
    }

    #[test]
    fn test_remaining_saturates_at_zero() {
        let limiter = RateLimiter::new();
        for t in 0..12 {
            assert!(limiter.admit_at("ip", 20, SECOND, t));
        }
        assert_eq!(limiter.remaining_at("ip", SECOND, 20).remaining, 0);
    }

    #[test]
    fn test_identifiers_persist_without_sweep() {
        let limiter = RateLimiter::new();
        limiter.admit_at("a", 1, SECOND, 0);
        limiter.admit_at("b", 1, SECOND, 0);
        assert!(limiter.admit_at("c", 1, SECOND, 10_000));
        assert_eq!(limiter.tracked_identifiers(), 3);
    }

    #[test]
    fn test_sweep_removes_only_idle_identifiers() {
        let limiter = RateLimiter::new();
        limiter.admit_at("old", 5, SECOND, 0);
        limiter.admit_at("fresh", 5, SECOND, 1800);

        assert_eq!(limiter.sweep_at(SECOND, 2000), 1);
        assert_eq!(limiter.tracked_identifiers(), 1);
        assert_eq!(stored(&limiter, "fresh"), vec![1800]);
    }
}
