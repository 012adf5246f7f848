//! Token bucket with lazy refill.

use parking_lot::Mutex;
use scrivener_error::{RateLimitError, RateLimitErrorKind};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Mutable part of a bucket, always accessed under the bucket's lock.
#[derive(Debug)]
struct BucketState {
    /// Current available tokens, `0.0..=capacity`
    tokens: f64,
    /// Last refill time
    last_refill: Instant,
}

/// Capacity-with-refill rate limiting primitive.
///
/// Allows bursts up to `capacity` while enforcing a long-run average of
/// `refill_rate` tokens per second. Refill is computed on access rather than by
/// a timer. Refill-then-consume runs inside one critical section, so
/// concurrent callers can never spend more than `capacity` plus whatever has
/// refilled since the previous access.
///
/// # Example
///
/// ```
/// use scrivener_rate_limit::TokenBucket;
///
/// let bucket = TokenBucket::new(2, 1.0).unwrap();
/// assert!(bucket.consume(1));
/// assert!(bucket.consume(1));
/// assert!(!bucket.consume(1));
/// ```
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u64,
    refill_rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if `capacity` is zero or `refill_rate` is not a
    /// positive finite number.
    pub fn new(capacity: u64, refill_rate: f64) -> Result<Self, RateLimitError> {
        if capacity == 0 {
            return Err(RateLimitError::new(RateLimitErrorKind::InvalidConfig(
                "bucket capacity must be at least 1".to_string(),
            )));
        }
        if !refill_rate.is_finite() || refill_rate <= 0.0 {
            return Err(RateLimitError::new(RateLimitErrorKind::InvalidConfig(format!(
                "bucket refill rate must be positive, got {}",
                refill_rate
            ))));
        }

        Ok(Self {
            capacity,
            refill_rate,
            state: Mutex::new(BucketState {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        })
    }

    /// Bucket holding `limit` tokens that refills completely once a minute.
    pub fn per_minute(limit: u64) -> Result<Self, RateLimitError> {
        Self::new(limit, limit as f64 / 60.0)
    }

    /// Maximum burst size.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Tokens added per second.
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.capacity as f64);
        state.last_refill = now;
    }

    /// Try to take `tokens` from the bucket.
    ///
    /// Returns false and leaves the bucket untouched if fewer than `tokens`
    /// are available after refilling.
    pub fn consume(&self, tokens: u64) -> bool {
        let mut state = self.state.lock();
        self.refill(&mut state);

        let wanted = tokens as f64;
        if state.tokens >= wanted {
            state.tokens -= wanted;
            trace!(tokens, remaining = state.tokens, "Consumed from bucket");
            true
        } else {
            trace!(tokens, available = state.tokens, "Bucket short");
            false
        }
    }

    /// Tokens currently available, after refilling.
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.tokens
    }

    /// Wait until `tokens` can be consumed, then consume them.
    ///
    /// Sleeps between attempts for the time the shortfall needs to refill,
    /// capped at one second. Returns false only if `timeout` elapses first;
    /// with no timeout the wait is unbounded, so requesting more than
    /// `capacity` without a timeout never returns.
    pub async fn wait_for_tokens(&self, tokens: u64, timeout: Option<Duration>) -> bool {
        let start = Instant::now();

        loop {
            if self.consume(tokens) {
                return true;
            }

            if let Some(timeout) = timeout
                && start.elapsed() >= timeout
            {
                return false;
            }

            let wait_secs = {
                let state = self.state.lock();
                let needed = tokens as f64 - state.tokens;
                (needed / self.refill_rate).clamp(0.001, 1.0)
            };
            tokio::time::sleep(Duration::from_secs_f64(wait_secs)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_capacity() {
        assert!(TokenBucket::new(0, 1.0).is_err());
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        assert!(TokenBucket::new(10, 0.0).is_err());
        assert!(TokenBucket::new(10, -1.0).is_err());
        assert!(TokenBucket::new(10, f64::NAN).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_consume_leaves_tokens() {
        let bucket = TokenBucket::new(5, 1.0).unwrap();
        assert!(!bucket.consume(6));
        assert_eq!(bucket.available(), 5.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_is_capped() {
        let bucket = TokenBucket::new(3, 10.0).unwrap();
        assert!(bucket.consume(3));
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(bucket.available(), 3.0);
    }
}
