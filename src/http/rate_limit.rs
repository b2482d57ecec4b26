//! Per-source rate limiting: a bucket per IP with a rolling 60s window, a
//! single mutex guarding the whole map so the prune tick and the check
//! path never race, and eager pruning on insertion once the map grows
//! past a hard cap.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

const WINDOW: Duration = Duration::from_secs(60);
const MAX_LIVE_BUCKETS: usize = 10_000;

struct RateBucket {
    count: u32,
    reset_at: Instant,
}

pub struct RateLimiter {
    buckets: Mutex<HashMap<IpAddr, RateBucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Increment the bucket for `source` and report whether this request is
    /// admitted under `limit` requests per rolling 60s window. Reads
    /// `limit` fresh on every call so a runtime config change takes effect
    /// on the very next request.
    pub fn check(&self, source: IpAddr, limit: u32) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();

        if buckets.len() >= MAX_LIVE_BUCKETS {
            buckets.retain(|_, b| b.reset_at > now);
        }

        let bucket = buckets.entry(source).or_insert_with(|| RateBucket {
            count: 0,
            reset_at: now + WINDOW,
        });

        if bucket.reset_at <= now {
            bucket.count = 0;
            bucket.reset_at = now + WINDOW;
        }

        bucket.count += 1;
        bucket.count <= limit
    }

    /// Drop every bucket whose window has already elapsed. Called on a
    /// background tick every 60s by the startup supervisor.
    pub fn prune(&self) {
        let now = Instant::now();
        self.buckets.lock().retain(|_, b| b.reset_at > now);
    }

    #[cfg(test)]
    pub fn live_bucket_count(&self) -> usize {
        self.buckets.lock().len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn ip(n: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(127, 0, 0, n))
    }

    #[test]
    fn admits_requests_under_the_limit_and_rejects_over() {
        let limiter = RateLimiter::new();
        assert!(limiter.check(ip(1), 2));
        assert!(limiter.check(ip(1), 2));
        assert!(!limiter.check(ip(1), 2));
    }

    #[test]
    fn different_sources_have_independent_buckets() {
        let limiter = RateLimiter::new();
        assert!(limiter.check(ip(1), 1));
        assert!(limiter.check(ip(2), 1));
    }

    #[test]
    fn prune_drops_only_expired_buckets() {
        let limiter = RateLimiter::new();
        limiter.check(ip(1), 10);
        assert_eq!(limiter.live_bucket_count(), 1);
        limiter.prune();
        // Window has not elapsed yet; the fresh bucket survives.
        assert_eq!(limiter.live_bucket_count(), 1);
    }

    #[test]
    fn a_reset_window_clears_the_previous_count() {
        let limiter = RateLimiter::new();
        assert!(limiter.check(ip(1), 1));
        assert!(!limiter.check(ip(1), 1));
        {
            let mut buckets = limiter.buckets.lock();
            buckets.get_mut(&ip(1)).unwrap().reset_at = Instant::now();
        }
        assert!(limiter.check(ip(1), 1));
    }
}
