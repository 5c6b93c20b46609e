//! Token-bucket rate limiter keyed by resource.
//!
//! Each resource gets its own bucket; limits are supplied at construction
//! (with a default for resources that were not configured explicitly).
//! Buckets refill continuously at the configured rate up to the burst
//! capacity.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::ResourceId;

/// Rate limit for one resource.
#[derive(Clone, Debug)]
pub struct RateLimit {
    /// Sustained requests allowed per minute.
    pub requests_per_minute: u32,
    /// Burst capacity (maximum tokens held).
    pub burst: f64,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst: 10.0,
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    rate_per_sec: f64,
    capacity: f64,
}

impl Bucket {
    fn from_limit(limit: &RateLimit) -> Self {
        Self {
            tokens: limit.burst,
            last_refill: Instant::now(),
            rate_per_sec: f64::from(limit.requests_per_minute) / 60.0,
            capacity: limit.burst,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    fn try_take(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn wait_for_token(&mut self) -> Duration {
        self.refill();
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate_per_sec)
        }
    }
}

/// Per-resource token-bucket rate limiter.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    limits: HashMap<String, RateLimit>,
    default_limit: RateLimit,
}

impl RateLimiter {
    /// Create a limiter where every resource uses `default_limit`.
    pub fn new(default_limit: RateLimit) -> Self {
        Self::with_limits(default_limit, HashMap::new())
    }

    /// Create a limiter with per-resource overrides.
    pub fn with_limits(default_limit: RateLimit, limits: HashMap<String, RateLimit>) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            limits,
            default_limit,
        }
    }

    fn lock_buckets(&self) -> MutexGuard<'_, HashMap<String, Bucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn limit_for(&self, resource: &str) -> &RateLimit {
        self.limits.get(resource).unwrap_or(&self.default_limit)
    }

    /// Take a token without waiting. Returns false when rate limited.
    pub fn try_acquire(&self, resource: &ResourceId) -> bool {
        let mut buckets = self.lock_buckets();
        let limit = self.limit_for(resource.as_ref());
        buckets
            .entry(resource.to_string())
            .or_insert_with(|| Bucket::from_limit(limit))
            .try_take()
    }

    /// Take a token, sleeping until one becomes available.
    pub async fn acquire(&self, resource: &ResourceId) {
        loop {
            let wait = {
                let mut buckets = self.lock_buckets();
                let limit = self.limit_for(resource.as_ref());
                let bucket = buckets
                    .entry(resource.to_string())
                    .or_insert_with(|| Bucket::from_limit(limit));
                if bucket.try_take() {
                    return;
                }
                bucket.wait_for_token()
            };

            debug!("Rate limiter: waiting {:?} for '{}'", wait, resource);
            tokio::time::sleep(wait).await;
        }
    }

    /// Restore the bucket for a resource to full capacity.
    pub fn reset(&self, resource: &ResourceId) {
        let mut buckets = self.lock_buckets();
        buckets.remove(resource.as_ref());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimit::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn test_burst_then_limited() {
        let limiter = RateLimiter::new(RateLimit {
            requests_per_minute: 60,
            burst: 3.0,
        });
        let resource: ResourceId = Cow::Borrowed("QUOTES");

        assert!(limiter.try_acquire(&resource));
        assert!(limiter.try_acquire(&resource));
        assert!(limiter.try_acquire(&resource));
        assert!(!limiter.try_acquire(&resource));
    }

    #[test]
    fn test_per_resource_override() {
        let mut limits = HashMap::new();
        limits.insert(
            "TIGHT".to_string(),
            RateLimit {
                requests_per_minute: 60,
                burst: 1.0,
            },
        );
        let limiter = RateLimiter::with_limits(RateLimit::default(), limits);

        let tight: ResourceId = Cow::Borrowed("TIGHT");
        let loose: ResourceId = Cow::Borrowed("LOOSE");

        assert!(limiter.try_acquire(&tight));
        assert!(!limiter.try_acquire(&tight));

        // The default burst of 10 still applies elsewhere.
        for _ in 0..10 {
            assert!(limiter.try_acquire(&loose));
        }
        assert!(!limiter.try_acquire(&loose));
    }

    #[test]
    fn test_reset_restores_capacity() {
        let limiter = RateLimiter::new(RateLimit {
            requests_per_minute: 60,
            burst: 1.0,
        });
        let resource: ResourceId = Cow::Borrowed("RESET");

        assert!(limiter.try_acquire(&resource));
        assert!(!limiter.try_acquire(&resource));

        limiter.reset(&resource);
        assert!(limiter.try_acquire(&resource));
    }

    #[tokio::test]
    async fn test_acquire_waits_for_refill() {
        let limiter = RateLimiter::new(RateLimit {
            requests_per_minute: 6000, // 100/s keeps the test fast
            burst: 1.0,
        });
        let resource: ResourceId = Cow::Borrowed("WAITING");

        limiter.acquire(&resource).await;

        let start = Instant::now();
        limiter.acquire(&resource).await;
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
