//! Time utilities.
//!
//! Every registry timestamp and expiry deadline is a [`Timestamp`] read from a
//! single [`Clock`] shared by the Lease Manager and the stores it drives, so
//! "now" means the same thing to the code that sets a deadline and the code
//! that enforces it.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Nanoseconds since the Unix epoch.
///
/// Used both for `created_at` / `last_updated` metadata and for absolute
/// expiry deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp {
    /// Nanoseconds since the epoch.
    pub nanos: u64,
}

impl Timestamp {
    /// Create a timestamp from raw nanoseconds.
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Create a timestamp from milliseconds.
    pub const fn from_millis(ms: u64) -> Self {
        Self {
            nanos: ms.saturating_mul(1_000_000),
        }
    }

    /// The epoch.
    pub const fn zero() -> Self {
        Self { nanos: 0 }
    }

    /// Whole milliseconds since the epoch.
    pub const fn as_millis(self) -> u64 {
        self.nanos / 1_000_000
    }

    /// Add a duration, saturating at `u64::MAX`.
    pub fn add(self, duration: Duration) -> Self {
        let delta = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        Self {
            nanos: self.nanos.saturating_add(delta),
        }
    }

    /// Check if this timestamp is at or after the given deadline.
    pub const fn is_at_or_after(self, deadline: Timestamp) -> bool {
        self.nanos >= deadline.nanos
    }

    /// Time remaining until a deadline, zero if it already passed.
    pub fn until(self, deadline: Timestamp) -> Duration {
        Duration::from_nanos(deadline.nanos.saturating_sub(self.nanos))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{:09}",
            self.nanos / 1_000_000_000,
            self.nanos % 1_000_000_000
        )
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        Timestamp::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// Manually advanced clock.
///
/// Time only moves when [`ManualClock::advance`] or [`ManualClock::set`] is
/// called, which makes expiry behaviour reproducible in tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at the given time.
    pub fn new(start: Timestamp) -> Self {
        Self {
            nanos: AtomicU64::new(start.nanos),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let delta = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(delta, Ordering::AcqRel);
    }

    /// Jump to an absolute time.
    pub fn set(&self, at: Timestamp) {
        self.nanos.store(at.nanos, Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_nanos(self.nanos.load(Ordering::Acquire))
    }
}
