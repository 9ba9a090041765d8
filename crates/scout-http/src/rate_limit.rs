// crates/scout-http/src/rate_limit.rs
// ============================================================================
// Module: Token-Bucket Rate Limiter
// Description: Two independent buckets (`search`, `core`) gating outbound
//              GitHub calls.
// Purpose: Keep the client under GitHub's published rate limits without a
//          background timer — tokens refill lazily on acquire.
// Dependencies: scout-core, tokio
// ============================================================================

//! ## Overview
//! Each [`TokenBucket`] tracks `tokens` and `last_refill` under a
//! `tokio::sync::Mutex`. [`TokenBucket::acquire`] refills based on elapsed
//! wall-clock time (via the injected [`Clock`]), then either takes a token
//! immediately or sleeps (via the injected [`Sleeper`]) until one is
//! available, per `spec.md` §4.C ("Bucket tokens refill continuously based
//! on elapsed wall-clock time since last observation, clamped to capacity").

use std::sync::Arc;
use std::time::Duration;

use scout_core::Clock;
use scout_core::RateLimitBucket;
use scout_core::Sleeper;
use tokio::sync::Mutex;

/// Bucket capacity and refill rate, expressed as tokens per millisecond.
#[derive(Debug, Clone, Copy)]
struct BucketSpec {
    capacity: f64,
    refill_per_ms: f64,
}

/// Returns the fixed spec for a bucket (`spec.md` §4.C: `search` 30/30min,
/// `core` 5000/5000h).
const fn spec_for(bucket: RateLimitBucket) -> BucketSpec {
    match bucket {
        RateLimitBucket::Search => BucketSpec { capacity: 30.0, refill_per_ms: 30.0 / 60_000.0 },
        RateLimitBucket::Core => BucketSpec { capacity: 5000.0, refill_per_ms: 5000.0 / 3_600_000.0 },
    }
}

struct BucketState {
    tokens: f64,
    last_refill_millis: i64,
}

/// One named token bucket.
pub struct TokenBucket {
    bucket: RateLimitBucket,
    spec: BucketSpec,
    state: Mutex<BucketState>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
}

impl TokenBucket {
    /// Builds a bucket starting full at `clock.now()`.
    #[must_use]
    pub fn new(bucket: RateLimitBucket, clock: Arc<dyn Clock>, sleeper: Arc<dyn Sleeper>) -> Self {
        let spec = spec_for(bucket);
        let now = clock.now().epoch_millis();
        Self { bucket, spec, state: Mutex::new(BucketState { tokens: spec.capacity, last_refill_millis: now }), clock, sleeper }
    }

    /// Which bucket this is.
    #[must_use]
    pub const fn kind(&self) -> RateLimitBucket {
        self.bucket
    }

    /// Blocks until a token is available, then consumes it. Returns the
    /// duration slept, if any (zero when a token was immediately available).
    pub async fn acquire(&self) -> Duration {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                self.refill_locked(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - state.tokens;
                    let wait_ms = (deficit / self.spec.refill_per_ms).ceil().max(0.0);
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    Some(Duration::from_millis(wait_ms as u64))
                }
            };
            match wait {
                None => return Duration::ZERO,
                Some(duration) => {
                    self.sleeper.sleep(duration).await;
                    return duration;
                }
            }
        }
    }

    fn refill_locked(&self, state: &mut BucketState) {
        let now = self.clock.now().epoch_millis();
        let elapsed_ms = (now - state.last_refill_millis).max(0);
        #[allow(clippy::cast_precision_loss)]
        let refill = elapsed_ms as f64 * self.spec.refill_per_ms;
        state.tokens = (state.tokens + refill).min(self.spec.capacity);
        state.last_refill_millis = now;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use std::sync::Mutex as StdMutex;

    use scout_core::Timestamp;

    use super::*;

    struct FixedClock(StdMutex<i64>);

    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            Timestamp::from_epoch_millis(*self.0.lock().unwrap())
        }
    }

    struct NoopSleeper;

    #[async_trait::async_trait]
    impl Sleeper for NoopSleeper {
        async fn sleep(&self, _duration: Duration) {}
    }

    #[tokio::test]
    async fn search_bucket_starts_full_and_drains_by_one_per_acquire() {
        let clock = Arc::new(FixedClock(StdMutex::new(0)));
        let sleeper = Arc::new(NoopSleeper);
        let bucket = TokenBucket::new(RateLimitBucket::Search, clock, sleeper);
        for _ in 0..30 {
            let waited = bucket.acquire().await;
            assert_eq!(waited, Duration::ZERO);
        }
        // The 31st acquire must wait since the bucket is now empty.
        let waited = bucket.acquire().await;
        assert!(waited > Duration::ZERO);
    }

    #[tokio::test]
    async fn tokens_refill_based_on_elapsed_time() {
        let clock = Arc::new(FixedClock(StdMutex::new(0)));
        let sleeper = Arc::new(NoopSleeper);
        let bucket = TokenBucket::new(RateLimitBucket::Search, clock.clone(), sleeper);
        for _ in 0..30 {
            bucket.acquire().await;
        }
        // One minute later a full bucket's worth of tokens (30) should be available again.
        *clock.0.lock().unwrap() = 60_000;
        for _ in 0..30 {
            let waited = bucket.acquire().await;
            assert_eq!(waited, Duration::ZERO);
        }
    }
}
