//! Wall-clock abstraction for testability.
//!
//! Draft snapshots and sync requests carry epoch-millisecond timestamps that
//! are compared against the server's `updated_at`. The [`Clock`] trait lets
//! tests pin those timestamps.
//!
//! # Example
//!
//! ```
//! use cordiq_core::time::{Clock, MockClock};
//! use std::time::Duration;
//!
//! let clock = MockClock::at_millis(1_700_000_000_000);
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(clock.now_millis(), 1_700_000_005_000);
//! ```

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;

    /// Current time as a UTC timestamp.
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_millis()).unwrap_or_default()
    }
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A manually driven clock for tests.
#[derive(Debug, Default)]
pub struct MockClock {
    millis: AtomicI64,
}

impl MockClock {
    /// Creates a clock frozen at the given epoch milliseconds.
    #[must_use]
    pub const fn at_millis(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    /// Creates a clock frozen at the given timestamp.
    #[must_use]
    pub fn at(time: DateTime<Utc>) -> Self {
        Self::at_millis(time.timestamp_millis())
    }

    /// Moves the clock forward.
    #[allow(clippy::cast_possible_truncation)]
    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }

    /// Jumps the clock to the given epoch milliseconds.
    pub fn set_millis(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}
