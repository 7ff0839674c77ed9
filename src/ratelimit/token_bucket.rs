//! Token-bucket rate limiting algorithm.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A thread-safe token bucket.
///
/// The bucket starts full and refills lazily: every [`allow`](Self::allow)
/// call first credits the tokens accrued since the last refill, then tries
/// to consume. Bursts up to `capacity` are permitted. Purely in-memory,
/// no external dependency; use one instance per key for multi-key limiting.
#[derive(Debug)]
pub struct TokenBucket {
    /// Max tokens the bucket can hold
    capacity: i64,
    /// Tokens added per refill period
    refill_rate: i64,
    /// How often tokens are added
    refill_period: Duration,
    /// Mutable state, guarded by a single lock covering the full
    /// refill-then-consume sequence. Only in-memory arithmetic happens
    /// under the lock.
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: i64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a bucket that starts at full capacity.
    pub fn new(capacity: i64, refill_rate: i64, refill_period: Duration) -> Self {
        Self {
            capacity,
            refill_rate,
            refill_period,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Attempt to consume `cost` tokens.
    ///
    /// Returns whether the request is admitted and the tokens left
    /// afterwards; on denial the token count is unchanged.
    pub fn allow(&self, cost: i64) -> (bool, i64) {
        let mut state = self.state.lock();

        let elapsed = state.last_refill.elapsed();
        let periods = (elapsed.as_nanos() / self.refill_period.as_nanos()) as u32;
        if periods > 0 {
            // Advance by whole periods only, so fractional-period credit
            // carries into the next call instead of being lost.
            state.last_refill += self.refill_period * periods;
            state.tokens = self
                .capacity
                .min(state.tokens + self.refill_rate * i64::from(periods));
        }

        if state.tokens < cost {
            (false, state.tokens)
        } else {
            state.tokens -= cost;
            (true, state.tokens)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread::sleep;

    use super::*;

    #[test]
    fn test_new_bucket_starts_full() {
        let bucket = TokenBucket::new(5, 1, Duration::from_millis(100));

        let (allowed, remaining) = bucket.allow(5);
        assert!(allowed);
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_allow_within_capacity() {
        let bucket = TokenBucket::new(5, 1, Duration::from_millis(100));

        let (allowed, remaining) = bucket.allow(3);
        assert!(allowed);
        assert_eq!(remaining, 2);
    }

    #[test]
    fn test_deny_when_insufficient_tokens() {
        let bucket = TokenBucket::new(5, 1, Duration::from_millis(100));

        let (allowed, remaining) = bucket.allow(5);
        assert!(allowed);
        assert_eq!(remaining, 0);

        let (allowed, remaining) = bucket.allow(5);
        assert!(!allowed);
        assert_eq!(remaining, 0, "denial must not change the token count");
    }

    #[test]
    fn test_refill_after_one_period() {
        let bucket = TokenBucket::new(5, 1, Duration::from_millis(100));

        bucket.allow(5);
        let (allowed, _) = bucket.allow(1);
        assert!(!allowed);

        sleep(Duration::from_millis(101));

        let (allowed, remaining) = bucket.allow(1);
        assert!(allowed);
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_refill_over_multiple_periods() {
        let bucket = TokenBucket::new(5, 2, Duration::from_millis(100));

        bucket.allow(5);

        // Two full periods accrue 4 tokens.
        sleep(Duration::from_millis(201));

        let (allowed, remaining) = bucket.allow(4);
        assert!(allowed);
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_refill_never_exceeds_capacity() {
        let bucket = TokenBucket::new(3, 10, Duration::from_millis(10));

        sleep(Duration::from_millis(50));

        let (allowed, remaining) = bucket.allow(3);
        assert!(allowed);
        assert_eq!(remaining, 0);

        let (allowed, _) = bucket.allow(1);
        assert!(!allowed);
    }
}
