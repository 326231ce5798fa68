//! Time sources for issuing and validating tokens.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// A source of whole Unix seconds.
pub trait Clock: fmt::Debug + Send + Sync {
    /// Current time, floored to the second.
    fn now_unix(&self) -> i64;
}

/// Wall-clock time in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// A clock that only moves when told to.
///
/// Used for offline validation against a recorded timeline, and in tests.
///
/// # Example
///
/// ```rust
/// use aegis_token::{Clock, ManualClock};
///
/// let clock = ManualClock::new(100);
/// clock.advance(5);
/// assert_eq!(clock.now_unix(), 105);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Starts at `unix_second`.
    #[must_use]
    pub const fn new(unix_second: i64) -> Self {
        Self {
            now: AtomicI64::new(unix_second),
        }
    }

    /// Jumps to `unix_second`.
    pub fn set(&self, unix_second: i64) {
        self.now.store(unix_second, Ordering::SeqCst);
    }

    /// Moves forward (or back, for negative `seconds`).
    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_unix(&self) -> i64 {
        (**self).now_unix()
    }
}
