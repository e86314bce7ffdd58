//! Palisade Rate Limit - token-bucket admission control keyed by caller.
//!
//! Each key owns a bucket that refills at a fixed rate up to a capacity;
//! every allowed action consumes one token. Refill happens lazily at each
//! check — there is no background timer. A trailing one-hour window of
//! request timestamps backs the [`RateLimiter::stats`] view and is pruned
//! lazily on each check as well.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Trailing window retained for per-key request statistics.
const STATS_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Per-key token bucket state.
#[derive(Debug)]
struct TokenBucket {
    /// Current token count; invariant `0.0 <= tokens <= capacity`.
    tokens: f64,
    /// Last time `tokens` was refilled.
    last_refill: Instant,
    /// Timestamps of allowed requests inside [`STATS_WINDOW`].
    recent: VecDeque<Instant>,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
            recent: VecDeque::new(),
        }
    }

    /// Lazily refill, then prune the stats window.
    fn advance(&mut self, capacity: f64, refill_rate: f64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).clamp(0.0, capacity);
        self.last_refill = now;

        while let Some(oldest) = self.recent.front() {
            if now.saturating_duration_since(*oldest) > STATS_WINDOW {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }

    /// Consume one token if available, recording the request timestamp.
    fn try_consume(&mut self, now: Instant) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            self.recent.push_back(now);
            true
        } else {
            false
        }
    }

    fn count_since(&self, now: Instant, window: Duration) -> usize {
        self.recent
            .iter()
            .filter(|t| now.saturating_duration_since(**t) <= window)
            .count()
    }
}

/// Point-in-time statistics for one key.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RateLimiterStats {
    /// Whole tokens currently available (floor-truncated for display;
    /// the admission decision always uses the fractional count).
    pub tokens_available: u64,
    /// Bucket capacity.
    pub capacity: u64,
    /// Allowed requests in the trailing minute.
    pub requests_last_minute: usize,
    /// Allowed requests in the trailing hour.
    pub requests_last_hour: usize,
}

/// Token-bucket rate limiter keyed by caller identity.
///
/// Refill plus consume is a single critical section per call, so two
/// concurrent callers can never both observe the same spare token.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    refill_rate: f64,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    /// Create a limiter with the given bucket capacity and refill rate
    /// (tokens per second).
    #[must_use]
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            capacity: capacity.max(0.0),
            refill_rate: refill_rate.max(0.0),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Check and consume one token for `key`.
    ///
    /// Returns `true` if the request is admitted. A `false` here is
    /// retryable by the caller once the bucket refills.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// [`allow`](Self::allow) against an explicit clock (test hook).
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.lock_buckets();
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, now));
        bucket.advance(self.capacity, self.refill_rate, now);
        let admitted = bucket.try_consume(now);
        if !admitted {
            tracing::debug!(key, "rate limit exhausted");
        }
        admitted
    }

    /// Current statistics for `key`.
    ///
    /// Keys that have never been seen report a full bucket.
    pub fn stats(&self, key: &str) -> RateLimiterStats {
        let now = Instant::now();
        let mut buckets = self.lock_buckets();
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, now));
        bucket.advance(self.capacity, self.refill_rate, now);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let stats = RateLimiterStats {
            tokens_available: bucket.tokens.floor() as u64,
            capacity: self.capacity.floor() as u64,
            requests_last_minute: bucket.count_since(now, Duration::from_secs(60)),
            requests_last_hour: bucket.count_since(now, STATS_WINDOW),
        };
        stats
    }

    /// Drop all state for `key`.
    pub fn remove(&self, key: &str) {
        self.lock_buckets().remove(key);
    }

    /// Drop all per-key state.
    pub fn reset(&self) {
        self.lock_buckets().clear();
    }

    fn lock_buckets(&self) -> std::sync::MutexGuard<'_, HashMap<String, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(|e| {
            tracing::warn!("rate limiter lock poisoned, recovering");
            e.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Admission
    // -----------------------------------------------------------------------

    #[test]
    fn test_burst_up_to_capacity() {
        let limiter = RateLimiter::new(3.0, 0.0);
        assert!(limiter.allow("caller"));
        assert!(limiter.allow("caller"));
        assert!(limiter.allow("caller"));
        assert!(!limiter.allow("caller"));
    }

    #[test]
    fn test_no_refill_second_call_denied() {
        let limiter = RateLimiter::new(1.0, 0.0);
        assert!(limiter.allow("caller"));
        assert!(!limiter.allow("caller"));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(1.0, 0.0);
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));
        assert!(limiter.allow("b"));
    }

    #[test]
    fn test_lazy_refill() {
        let limiter = RateLimiter::new(1.0, 2.0);
        let start = Instant::now();
        assert!(limiter.allow_at("caller", start));
        assert!(!limiter.allow_at("caller", start));
        // 2 tokens/sec: after 600ms one token is back
        assert!(limiter.allow_at("caller", start + Duration::from_millis(600)));
    }

    #[test]
    fn test_refill_never_exceeds_capacity() {
        let limiter = RateLimiter::new(2.0, 100.0);
        let start = Instant::now();
        assert!(limiter.allow_at("caller", start));
        // A long idle period refills to capacity, not beyond
        let later = start + Duration::from_secs(3600);
        assert!(limiter.allow_at("caller", later));
        assert!(limiter.allow_at("caller", later));
        assert!(!limiter.allow_at("caller", later));
    }

    #[test]
    fn test_tokens_never_negative() {
        let limiter = RateLimiter::new(1.0, 0.0);
        let now = Instant::now();
        for _ in 0..10 {
            limiter.allow_at("caller", now);
        }
        let stats = limiter.stats("caller");
        assert_eq!(stats.tokens_available, 0);
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    #[test]
    fn test_stats_fresh_key_reports_full_bucket() {
        let limiter = RateLimiter::new(5.0, 1.0);
        let stats = limiter.stats("unseen");
        assert_eq!(stats.tokens_available, 5);
        assert_eq!(stats.capacity, 5);
        assert_eq!(stats.requests_last_minute, 0);
        assert_eq!(stats.requests_last_hour, 0);
    }

    #[test]
    fn test_stats_counts_requests() {
        let limiter = RateLimiter::new(10.0, 0.0);
        let now = Instant::now();
        assert!(limiter.allow_at("caller", now));
        assert!(limiter.allow_at("caller", now));
        let stats = limiter.stats("caller");
        assert_eq!(stats.requests_last_minute, 2);
        assert_eq!(stats.requests_last_hour, 2);
        assert_eq!(stats.tokens_available, 8);
    }

    #[test]
    fn test_stats_floor_truncation() {
        // 1.5 tokens available after a half-token refill
        let limiter = RateLimiter::new(2.0, 1.0);
        let start = Instant::now();
        assert!(limiter.allow_at("caller", start));
        assert!(limiter.allow_at("caller", start + Duration::from_millis(500)));
        // ~0.5 tokens left; display floors to 0 but internal stays fractional
        let stats = limiter.stats("caller");
        assert!(stats.tokens_available <= 1);
    }

    // -----------------------------------------------------------------------
    // Housekeeping
    // -----------------------------------------------------------------------

    #[test]
    fn test_remove_and_reset() {
        let limiter = RateLimiter::new(1.0, 0.0);
        assert!(limiter.allow("a"));
        assert!(!limiter.allow("a"));

        limiter.remove("a");
        assert!(limiter.allow("a"));

        assert!(limiter.allow("b"));
        limiter.reset();
        assert!(limiter.allow("a"));
        assert!(limiter.allow("b"));
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn test_concurrent_callers_cannot_double_spend() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let limiter = Arc::new(RateLimiter::new(8.0, 0.0));
        let admitted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let admitted = Arc::clone(&admitted);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        if limiter.allow("shared") {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // 40 attempts against 8 tokens and no refill: exactly 8 admitted
        assert_eq!(admitted.load(Ordering::SeqCst), 8);
    }
}
