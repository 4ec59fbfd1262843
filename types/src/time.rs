//! Timestamp type used throughout the consensus core.
//!
//! Timestamps are Unix epoch nanoseconds (UTC). Nanosecond resolution matters:
//! consensus timestamps are made strictly monotonic by bumping collisions a
//! single nanosecond forward.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A Unix timestamp in nanoseconds since epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Default for Timestamp {
    fn default() -> Self {
        Self::EPOCH
    }
}

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    /// Get the current system time as a `Timestamp`.
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_nanos();
        Self(nanos.min(u64::MAX as u128) as u64)
    }

    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    /// This timestamp advanced by `d`, saturating at the far future.
    pub fn saturating_add(&self, d: Duration) -> Self {
        Self(self.0.saturating_add(d.as_nanos().min(u64::MAX as u128) as u64))
    }

    /// The next representable instant (one nanosecond later).
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Duration elapsed from `self` to `later`, zero if `later` is earlier.
    pub fn duration_until(&self, later: Timestamp) -> Duration {
        Duration::from_nanos(later.0.saturating_sub(self.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}s", self.0 / 1_000_000_000, self.0 % 1_000_000_000)
    }
}
