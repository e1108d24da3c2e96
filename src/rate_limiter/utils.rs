//! # Utility Functions (utils.rs)
//!
//! Low-level helpers shared by the limiter: the process-wide monotonic time
//! base and cache-line padding for the hot atomics.
//!
//! ```text
//!     Platform-Specific Cache Lines:
//!
//!     x86_64 (Intel/AMD): 64 bytes
//!     AArch64 (ARM):      128 bytes
//!     Generic (Fallback): 64 bytes (assumed)
//! ```

use std::sync::OnceLock;
use std::time::Instant;

// Captured on first use; every reading is measured from here so that
// readings fit in i64 and never jump with the wall clock.
static MONOTONIC_BASE: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds elapsed on the monotonic timer since the process first asked.
///
/// Saturates at `i64::MAX` (roughly 292 years of uptime).
///
/// # Example
///
/// ```rust
/// use pacer::monotonic_nanos;
///
/// let start = monotonic_nanos();
/// let elapsed = monotonic_nanos() - start;
/// assert!(elapsed >= 0);
/// ```
#[inline(always)]
pub fn monotonic_nanos() -> i64 {
    let base = MONOTONIC_BASE.get_or_init(Instant::now);
    i64::try_from(base.elapsed().as_nanos()).unwrap_or(i64::MAX)
}

/// Cache-aligned wrapper to keep contended atomics on their own lines.
///
/// ```text
///     Without Cache Alignment:
///     ┌──────────────────────────────┐
///     │ ticks_timeline │ last_seen   │ ← Same cache line
///     └──────────────────────────────┘
///     Every fetch-add on the timeline evicts last_seen from other cores.
///
///     With Cache Alignment:
///     ┌──────────────────────────────┐
///     │        ticks_timeline        │ ← Own cache line
///     └──────────────────────────────┘
///     ┌──────────────────────────────┐
///     │          last_seen           │ ← Own cache line
///     └──────────────────────────────┘
/// ```
#[cfg(target_arch = "x86_64")]
#[repr(C, align(64))]
pub(crate) struct CacheAligned<T>(T);
#[cfg(target_arch = "aarch64")]
#[repr(C, align(128))]
pub(crate) struct CacheAligned<T>(T);
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[repr(C, align(64))]
pub(crate) struct CacheAligned<T>(T);

impl<T> CacheAligned<T> {
    /// Creates a new cache-aligned value.
    #[inline(always)]
    pub(crate) const fn new(value: T) -> Self {
        Self(value)
    }

    /// Gets a reference to the inner value.
    #[inline(always)]
    pub(crate) fn get(&self) -> &T {
        &self.0
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for CacheAligned<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
