// crates/scout-core/src/time.rs
// ============================================================================
// Module: Timestamps and Injectable Clock/Sleep
// Description: Wall-clock timestamp type plus the Clock/Sleeper traits used to
//              make the HTTP and LLM clients deterministically testable.
// Purpose: Let every suspension point (rate-limit wait, retry backoff) be
//          driven by a fake clock in tests instead of real time.
// Dependencies: chrono, serde, tokio
// ============================================================================

//! ## Overview
//! Per the dependency-injection-of-clock/sleep design note (`spec.md` §9),
//! no component calls `SystemTime::now()` or `tokio::time::sleep` directly.
//! Instead they hold a `Clock` and a `Sleeper` trait object, both satisfied in
//! production by [`SystemClock`] and [`TokioSleeper`] and in tests by fakes
//! that advance a shared counter instead of the real wall clock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// A UTC timestamp stored as milliseconds since the Unix epoch.
///
/// # Invariants
/// - Always non-negative (times before 1970 are clamped to zero at construction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Builds a timestamp from raw epoch milliseconds.
    #[must_use]
    pub const fn from_epoch_millis(millis: i64) -> Self {
        Self(if millis < 0 { 0 } else { millis })
    }

    /// Returns the epoch milliseconds value.
    #[must_use]
    pub const fn epoch_millis(self) -> i64 {
        self.0
    }

    /// Returns the epoch seconds value (floor division).
    #[must_use]
    pub const fn epoch_seconds(self) -> i64 {
        self.0 / 1000
    }

    /// Formats the timestamp as an ISO `YYYY-MM-DD` date string (UTC).
    #[must_use]
    pub fn to_date_string(self) -> String {
        let secs = self.epoch_seconds();
        let datetime = chrono::DateTime::from_timestamp(secs, 0).unwrap_or_default();
        datetime.format("%Y-%m-%d").to_string()
    }
}

impl From<SystemTime> for Timestamp {
    fn from(value: SystemTime) -> Self {
        let millis = value.duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0);
        Self::from_epoch_millis(millis)
    }
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Injectable source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// Production clock backed by [`SystemTime::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from(SystemTime::now())
    }
}

// ============================================================================
// SECTION: Sleeper
// ============================================================================

/// Injectable sleep primitive so retry/backoff logic can be driven by fakes.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspends for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Computes `today - days` formatted as `YYYY-MM-DD`, per the search-query
/// qualifier grammar in `spec.md` §6.
#[must_use]
pub fn date_days_ago(clock: &dyn Clock, days: u32) -> String {
    let now_secs = clock.now().epoch_seconds();
    let now = chrono::DateTime::from_timestamp(now_secs, 0).unwrap_or_default();
    let target = now - chrono::Duration::days(i64::from(days));
    target.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use super::*;

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            Timestamp::from_epoch_millis(self.0)
        }
    }

    #[test]
    fn timestamp_clamps_negative_millis() {
        assert_eq!(Timestamp::from_epoch_millis(-5).epoch_millis(), 0);
    }

    #[test]
    fn date_days_ago_subtracts_calendar_days() {
        // 2024-01-10T00:00:00Z
        let clock = FixedClock(1_704_844_800_000);
        assert_eq!(date_days_ago(&clock, 0), "2024-01-10");
        assert_eq!(date_days_ago(&clock, 10), "2023-12-31");
    }

    #[tokio::test]
    async fn tokio_sleeper_returns_after_duration() {
        let sleeper = TokioSleeper;
        sleeper.sleep(Duration::from_millis(1)).await;
    }
}
