use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Token bucket: holds up to `burst` tokens and regains one every `interval`. Starts full.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    burst: u32,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(interval: Duration, burst: u32) -> Self {
        Self::starting_at(interval, burst, Instant::now())
    }

    pub(crate) fn starting_at(interval: Duration, burst: u32, start: Instant) -> Self {
        Self { interval, burst, bucket: Mutex::new(Bucket { tokens: burst, last_refill: start }) }
    }

    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut bucket = self.bucket.lock();

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let refill = if self.interval.is_zero() {
            u128::from(self.burst)
        } else {
            elapsed.as_nanos() / self.interval.as_nanos()
        };

        if refill > 0 {
            let tokens = u128::from(bucket.tokens) + refill;
            if tokens >= u128::from(self.burst) {
                bucket.tokens = self.burst;
                bucket.last_refill = now;
            } else {
                bucket.tokens = tokens as u32;
                bucket.last_refill += self.interval * refill as u32;
            }
        }

        if bucket.tokens == 0 {
            return false;
        }
        bucket.tokens -= 1;
        true
    }
}
