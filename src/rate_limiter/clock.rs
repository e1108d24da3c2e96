//! # Clocks
//!
//! The limiter never reads the system timer directly. It asks a [`Clock`],
//! which lets tests swap in a [`VirtualClock`] that only moves when told to.
//!
//! ```text
//!     SystemClock  ── monotonic Instant, nanos since first use
//!     VirtualClock ── shared AtomicI64, advanced by hand (or by sleeping)
//! ```

use super::utils::monotonic_nanos;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Source of monotonic nanosecond time plus the matching way to wait.
///
/// Implementations must be cheap to read and safe to share across threads.
pub trait Clock: Send + Sync {
    /// Current monotonic time in nanoseconds.
    fn now_nanos(&self) -> i64;

    /// Blocks the calling thread for roughly `nanos` nanoseconds.
    ///
    /// Returning early is allowed; the limiter does not re-check or sleep
    /// again.
    fn sleep_nanos(&self, nanos: i64) {
        if nanos > 0 {
            std::thread::sleep(Duration::from_nanos(nanos as u64));
        }
    }
}

/// Production clock backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline(always)]
    fn now_nanos(&self) -> i64 {
        monotonic_nanos()
    }
}

/// Deterministic clock for tests.
///
/// Clones share the same underlying counter, so a test can hand one clone
/// to a limiter and keep another to move time forward. Sleeping on a
/// virtual clock advances it by the requested amount instead of blocking.
///
/// ## Example
///
/// ```rust
/// use pacer::{Clock, VirtualClock};
///
/// let clock = VirtualClock::new(50_000);
/// let handle = clock.clone();
///
/// handle.advance(25_000);
/// assert_eq!(clock.now_nanos(), 75_000);
///
/// clock.sleep_nanos(5_000);
/// assert_eq!(handle.now_nanos(), 80_000);
/// ```
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    nanos: Arc<AtomicI64>,
}

impl VirtualClock {
    /// Creates a clock reading `start_nanos`.
    pub fn new(start_nanos: i64) -> Self {
        Self {
            nanos: Arc::new(AtomicI64::new(start_nanos)),
        }
    }

    /// Sets the reading to an absolute value.
    pub fn set(&self, nanos: i64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }

    /// Moves the reading forward by `nanos` and returns the new value.
    pub fn advance(&self, nanos: i64) -> i64 {
        self.nanos.fetch_add(nanos, Ordering::SeqCst) + nanos
    }
}

impl Clock for VirtualClock {
    #[inline]
    fn now_nanos(&self) -> i64 {
        self.nanos.load(Ordering::SeqCst)
    }

    fn sleep_nanos(&self, nanos: i64) {
        if nanos > 0 {
            self.advance(nanos);
        }
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    #[inline]
    fn now_nanos(&self) -> i64 {
        (**self).now_nanos()
    }

    fn sleep_nanos(&self, nanos: i64) {
        (**self).sleep_nanos(nanos)
    }
}
