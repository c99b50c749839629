//! Token bucket admission gate shared by every fetch
//!
//! The bucket holds up to `capacity` tokens and refills at `rate` tokens per
//! second. `acquire` takes one token, waiting when the bucket is empty. The
//! bucket state sits behind an async mutex that is held across the wait, so
//! concurrent callers are admitted one at a time and the aggregate rate never
//! exceeds `rate * T + capacity` over any window of `T` seconds. Tasks that
//! are not fetching are unaffected by a waiting caller.

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

#[derive(Debug)]
struct Bucket {
    allowance: f64,
    last_check: Instant,
}

/// A token bucket rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    capacity: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Creates a limiter admitting `rate` acquisitions per second with bursts
    /// of up to `capacity`. The bucket starts full.
    ///
    /// Non-positive or non-finite values are clamped to a minimal valid
    /// bucket; configuration validation rejects them before this point.
    pub fn new(rate: f64, capacity: f64) -> Self {
        let rate = if rate.is_finite() && rate > 0.0 {
            rate
        } else {
            1.0
        };
        let capacity = if capacity.is_finite() && capacity >= 1.0 {
            capacity
        } else {
            1.0
        };

        Self {
            rate,
            capacity,
            bucket: Mutex::new(Bucket {
                allowance: capacity,
                last_check: Instant::now(),
            }),
        }
    }

    /// Creates a limiter whose burst capacity equals its rate
    pub fn per_second(rate: f64) -> Self {
        Self::new(rate, rate)
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Waits until a token is available, then consumes it
    pub async fn acquire(&self) {
        let mut bucket = self.bucket.lock().await;

        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_check).as_secs_f64();
        bucket.last_check = now;
        bucket.allowance = (bucket.allowance + elapsed * self.rate).min(self.capacity);

        if bucket.allowance < 1.0 {
            let wait = Duration::from_secs_f64((1.0 - bucket.allowance) / self.rate);
            tracing::trace!("Rate limiter waiting {:?}", wait);
            sleep(wait).await;
            bucket.allowance = 0.0;
            bucket.last_check = Instant::now();
        } else {
            bucket.allowance -= 1.0;
        }
    }
}
