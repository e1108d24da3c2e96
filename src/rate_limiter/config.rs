//! # Rate Limiter Configuration
//!
//! Settings that shape a limiter beyond its [`RateSpec`]: the atomic memory
//! ordering used on the timeline, a carried-over delay when resuming a paced
//! session, and the constants that bound the scheduling arithmetic.
//!
//! ## Memory Ordering
//!
//! ```text
//!     Relaxed ──────► Fast but minimal guarantees
//!        │
//!     AcquireRelease ► Balanced (recommended)
//!        │
//!     Sequential ───► Slow but strongest guarantees
//! ```

use super::error::ConfigurationError;
use super::rate_spec::RateSpec;
use std::sync::atomic::Ordering;

/// Nanoseconds in one second; the unit conversion between ops/s and op ticks.
pub const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Highest representable rate. One op tick can't be narrower than 1ns.
pub const MAX_RATE: f64 = 1_000_000_000.0;

/// Burst ratio used when a spec string leaves it out.
pub const DEFAULT_BURST_RATIO: f64 = 1.1;

/// Strictness used when none is given: fully isochronous pacing.
pub const DEFAULT_STRICTNESS: f64 = 1.0;

/// Gap closing runs on every this-many-th clock read, starting with the first.
///
/// Reads are counted per limiter, so the cadence holds whatever the op width
/// or the instant the limiter started.
pub const GAP_SAMPLE_MODULUS: u64 = 10;

/// Largest compensation shift; `gap >> 63` forgives nothing for any real gap.
pub const MAX_COMPENSATION_SHIFT: u32 = 63;

/// Memory ordering strategy for the limiter's atomics.
///
/// ## Quick Guide
///
/// - `Relaxed` when slot uniqueness is all you need (fetch-add is atomic
///   regardless) and you read delays only from the owning thread
/// - `AcquireRelease` (default) for most use cases
/// - `Sequential` when debugging cross-thread observations of the timeline
///
/// ## Example
///
/// ```rust
/// use pacer::{MemoryOrdering, RateLimiterConfig, RateSpec};
///
/// let spec: RateSpec = "1000".parse().unwrap();
/// let config = RateLimiterConfig::new(spec).with_ordering(MemoryOrdering::Relaxed);
/// assert_eq!(config.ordering, MemoryOrdering::Relaxed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryOrdering {
    /// Relaxed ordering - fastest but provides minimal guarantees.
    Relaxed,

    /// Acquire-Release ordering - balanced performance and correctness.
    #[default]
    AcquireRelease,

    /// Sequential consistency - strongest guarantees but slower.
    Sequential,
}

impl MemoryOrdering {
    /// Ordering for plain reads of the timeline and delay counters.
    #[inline(always)]
    pub(crate) fn load(&self) -> Ordering {
        match self {
            Self::Relaxed => Ordering::Relaxed,
            Self::AcquireRelease => Ordering::Acquire,
            Self::Sequential => Ordering::SeqCst,
        }
    }

    /// Ordering for reference resets.
    #[inline(always)]
    pub(crate) fn store(&self) -> Ordering {
        match self {
            Self::Relaxed => Ordering::Relaxed,
            Self::AcquireRelease => Ordering::Release,
            Self::Sequential => Ordering::SeqCst,
        }
    }

    /// Ordering for fetch-add / fetch-max on the hot path.
    #[inline(always)]
    pub(crate) fn rmw(&self) -> Ordering {
        match self {
            Self::Relaxed => Ordering::Relaxed,
            Self::AcquireRelease => Ordering::AcqRel,
            Self::Sequential => Ordering::SeqCst,
        }
    }
}

/// Everything needed to build a [`RateLimiter`](crate::RateLimiter).
///
/// ## Examples
///
/// ```rust
/// use pacer::{RateLimiterConfig, RateSpec};
///
/// let spec: RateSpec = "250,1.2".parse().unwrap();
///
/// // Fresh session
/// let config = RateLimiterConfig::new(spec.clone());
/// assert!(config.validate().is_ok());
///
/// // Resuming a session that was already 3ms behind
/// let resumed = RateLimiterConfig::new(spec).with_carried_delay_ns(3_000_000);
/// assert_eq!(resumed.carried_delay_ns, 3_000_000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    /// Target rate, burst ratio, strictness and scheduling type.
    pub spec: RateSpec,

    /// Scheduling delay inherited from a previous limiter, in nanoseconds.
    ///
    /// Seeds the accumulated delay so cumulative reporting continues
    /// where the prior session left off. `start()` clears it.
    pub carried_delay_ns: i64,

    /// Memory ordering strategy for atomic operations.
    pub ordering: MemoryOrdering,
}

impl RateLimiterConfig {
    /// Creates a configuration for `spec` with no carried delay.
    pub fn new(spec: RateSpec) -> Self {
        Self {
            spec,
            carried_delay_ns: 0,
            ordering: MemoryOrdering::default(),
        }
    }

    /// Sets the memory ordering strategy.
    pub fn with_ordering(mut self, ordering: MemoryOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Seeds the accumulated delay. Negative values are treated as zero.
    pub fn with_carried_delay_ns(mut self, carried_delay_ns: i64) -> Self {
        self.carried_delay_ns = carried_delay_ns.max(0);
        self
    }

    /// Checks that the rate and strictness are usable by a limiter.
    ///
    /// # Errors
    ///
    /// - [`ConfigurationError::RateOutOfRange`] if the rate is not in `(0, 1e9]`
    /// - [`ConfigurationError::StrictnessOutOfRange`] if strictness is not in `[0, 1]`
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_rate(self.spec.rate())?;
        validate_strictness(self.spec.strictness())
    }
}

/// Accepts finite rates in `(0, MAX_RATE]`.
pub(crate) fn validate_rate(rate: f64) -> Result<(), ConfigurationError> {
    if rate.is_finite() && rate > 0.0 && rate <= MAX_RATE {
        Ok(())
    } else {
        Err(ConfigurationError::RateOutOfRange { rate })
    }
}

/// Accepts strictness in `[0.0, 1.0]`.
pub(crate) fn validate_strictness(strictness: f64) -> Result<(), ConfigurationError> {
    if (0.0..=1.0).contains(&strictness) {
        Ok(())
    } else {
        Err(ConfigurationError::StrictnessOutOfRange { strictness })
    }
}

/// Width of one op at `rate`, rounded to the nearest nanosecond.
///
/// Callers validate the rate first, so the result is at least 1.
#[inline]
pub(crate) fn op_ticks_for_rate(rate: f64) -> i64 {
    (NANOS_PER_SECOND / rate).round() as i64
}

/// Converts strictness into the shift applied to observed gaps.
///
/// `1.0` maps to 0 (close every gap at once). Anything lower is scaled onto
/// the positive `i64` range and the count of leading zero bits becomes the
/// shift, so 0.5 → 1, 0.25 → 2, ... and 0.0 → 63.
#[inline]
pub fn compensation_shift(strictness: f64) -> u32 {
    if strictness >= 1.0 {
        return 0;
    }
    let scaled = (strictness.max(0.0) * i64::MAX as f64) as i64;
    scaled.leading_zeros().min(MAX_COMPENSATION_SHIFT)
}
