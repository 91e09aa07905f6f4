//! Token bucket throttle
//!
//! Caps how many messages per second enter handler execution.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use drivesync_dispatch::throttle::TokenBucket;
//!
//! # async fn example() {
//! let bucket = TokenBucket::per_second(10.0);
//! bucket.acquire().await;
//! // ... handle one message ...
//! # }
//! ```

use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use tracing::trace;

/// Internal mutable state for the token bucket, protected by a Mutex.
#[derive(Debug)]
struct TokenBucketInner {
    /// Current number of available tokens (fractional for smooth refill)
    tokens: f64,
    /// Timestamp of the last refill calculation
    last_refill: Instant,
}

/// Token bucket rate limiter.
///
/// Tokens are consumed on each admission and refilled at a constant rate.
/// When no tokens are available, callers wait for refill.
#[derive(Debug)]
pub struct TokenBucket {
    /// Maximum number of tokens in the bucket (burst size)
    capacity: u32,
    /// Rate at which tokens are added (tokens per second)
    refill_rate: f64,
    inner: Mutex<TokenBucketInner>,
}

impl TokenBucket {
    /// Creates a new `TokenBucket`. The bucket starts full.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of tokens
    /// * `refill_rate` - Tokens added per second
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
            inner: Mutex::new(TokenBucketInner {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Bucket admitting `rate` acquisitions per second with a one-second burst
    pub fn per_second(rate: f64) -> Self {
        let capacity = rate.ceil().max(1.0) as u32;
        Self::new(capacity, rate)
    }

    fn refill(inner: &mut TokenBucketInner, refill_rate: f64, capacity: u32) {
        let now = Instant::now();
        let elapsed_secs = now.duration_since(inner.last_refill).as_secs_f64();

        if elapsed_secs > 0.0 {
            inner.tokens = (inner.tokens + elapsed_secs * refill_rate).min(capacity as f64);
            inner.last_refill = now;
        }
    }

    /// Attempts to take a single token without waiting.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        Self::refill(&mut inner, self.refill_rate, self.capacity);

        if inner.tokens >= 1.0 {
            inner.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Estimated wait until a token becomes available (zero if one is available now).
    pub fn time_until_available(&self) -> Duration {
        let mut inner = self.inner.lock().unwrap();
        Self::refill(&mut inner, self.refill_rate, self.capacity);

        if inner.tokens >= 1.0 {
            Duration::ZERO
        } else if self.refill_rate > 0.0 {
            Duration::from_secs_f64((1.0 - inner.tokens) / self.refill_rate)
        } else {
            Duration::MAX
        }
    }

    /// Returns the current number of available tokens (after refill).
    pub fn available_tokens(&self) -> f64 {
        let mut inner = self.inner.lock().unwrap();
        Self::refill(&mut inner, self.refill_rate, self.capacity);
        inner.tokens
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Waits until a token is available and takes it.
    pub async fn acquire(&self) {
        loop {
            if self.try_acquire() {
                return;
            }

            let wait = self
                .time_until_available()
                .max(Duration::from_millis(10))
                .min(Duration::from_secs(1));
            trace!(wait_ms = wait.as_millis() as u64, "Throttled, waiting for refill");
            tokio::time::sleep(wait).await;
        }
    }
}
