//! # Pacer - Timeline Rate Limiter for Load Generation
//!
//! A lock-free rate limiter that paces many worker threads to a shared
//! target rate, the way a load generator drives operations against a system
//! under test. Callers ahead of schedule are made to wait; callers behind
//! schedule are told how late they are, and that lateness is tracked as
//! *scheduling delay*.
//!
//! ## What is Pacing?
//!
//! A token bucket answers "may I go now?". A pacer answers "when is my
//! turn?". Every operation owns a slot on a shared nanosecond timeline, and
//! slots are handed out strictly in order:
//!
//! ```text
//!     Ticks Timeline at 1000 ops/s (1ms per op):
//!
//!     ──┬──────┬──────┬──────┬──────┬──────►
//!       │ op 1 │ op 2 │ op 3 │ op 4 │
//!       0ms    1ms    2ms    3ms    4ms
//!                 ▲
//!                now
//!
//!     op 1: slot already started → returns overrun, no wait
//!     op 3: slot in the future   → sleeps until 2ms
//! ```
//!
//! - **Op ticks** = nanoseconds per op, `1e9 / rate` rounded
//! - **Timeline** = the instant up to which slots have been granted
//! - **Scheduling delay** = how far real time has run past the timeline
//! - **Strictness** = how quickly accumulated lag is forgiven
//!
//! ## Features
//!
//! - 🔒 **Lock-free hot path** - one fetch-add per `acquire`
//! - 🧮 **Exact slot accounting** - no two callers ever share a slot
//! - 🎚️ **Tunable strictness** - from isochronous pacing to burst catch-up
//! - 🔄 **Live reconfiguration** - change rate or strictness under load
//! - 📊 **Delay reporting** - current and cumulative delay, health status
//! - 🧪 **Virtual clock** - deterministic tests for paced code
//!
//! ## Quick Start
//!
//! ### Basic Pacing
//!
//! ```rust
//! use pacer::{RateLimiter, RateSpec};
//!
//! let spec: RateSpec = "1000".parse().unwrap();
//! let limiter = RateLimiter::new(&spec, None).unwrap();
//! limiter.start();
//!
//! for _ in 0..3 {
//!     let overrun_ns = limiter.acquire();
//!     // do one op; overrun_ns > 0 means this op started late
//! #   let _ = overrun_ns;
//! }
//! ```
//!
//! ### Builder Pattern
//!
//! ```rust
//! use pacer::{MemoryOrdering, RateLimiterBuilder};
//!
//! let limiter = RateLimiterBuilder::new()
//!     .rate(5000.0)                // ops per second
//!     .strictness(0.5)             // forgive half the gap per sample
//!     .memory_ordering(MemoryOrdering::AcquireRelease)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(limiter.op_ticks_ns(), 200_000);
//! assert_eq!(limiter.compensation_shift(), 1);
//! ```
//!
//! ### Named Activities
//!
//! ```rust
//! use pacer::RateLimiterRegistry;
//!
//! let registry = RateLimiterRegistry::new();
//! let reads = registry.create_or_update("reads", &"800".parse().unwrap()).unwrap();
//! reads.start();
//!
//! // Re-applying config reconfigures in place
//! registry.create_or_update("reads", &"1200".parse().unwrap()).unwrap();
//! assert_eq!(reads.rate(), 1200.0);
//! ```
//!
//! ## Architecture Overview
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │   Load Generator        │
//!                    └──────────┬──────────────┘
//!                               │
//!                    ┌──────────▼───────────────┐
//!                    │    Rate Limiter API      │
//!                    ├──────────────────────────┤
//!                    │  • acquire()             │
//!                    │  • acquire_nanos()       │
//!                    │  • metrics()             │
//!                    └──────────┬───────────────┘
//!                               │
//!                ┌──────────────┴────────────────┐
//!                │                               │
//!     ┌──────────▼──────────┐       ┌────────────▼─────────┐
//!     │   Ticks Timeline    │       │   Registry           │
//!     ├─────────────────────┤       ├──────────────────────┤
//!     │ • Atomic fetch-add  │       │ • Per-name limiters  │
//!     │ • Sampled gap close │       │ • Create or update   │
//!     │ • Delay accounting  │       │ • Delay reporting    │
//!     └─────────────────────┘       └──────────────────────┘
//! ```
//!
//! ## Performance Characteristics
//!
//! | Operation | Time Complexity | Notes |
//! |-----------|----------------|-------|
//! | acquire() | O(1) | one fetch-add, clock read only when the cached one is stale |
//! | reserve() | O(1) | one fetch-add, no clock read |
//! | set_rate() | O(1) | takes the reconfiguration lock |
//! | metrics() | O(1) | |
//!
//! ## Thread Safety
//!
//! All types are thread-safe and can be shared across threads:
//! - `RateLimiter` - Safe to share via `Arc<RateLimiter>`
//! - `RateLimiterRegistry` - Safe to share via `Arc<RateLimiterRegistry>`
//!
//! ## Memory Ordering
//!
//! Choose the right memory ordering for your use case:
//! - `Relaxed` - Fastest; slots stay unique, cross-thread delay reads may lag
//! - `AcquireRelease` - Balanced (default)
//! - `Sequential` - Strongest guarantees
//!
//! ## Examples
//!
//! See `demos/paced_workload.rs` for a multi-threaded workload with a live
//! rate change and delay reporting.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    missing_debug_implementations
)]
#![forbid(unsafe_code)]

// Internal module
mod rate_limiter;

// Public re-exports
pub use rate_limiter::{
    compensation_shift, monotonic_nanos, Clock, ConfigurationError, DelayGauge, Error,
    HealthStatus, MemoryOrdering, RateLimiter, RateLimiterConfig, RateLimiterMetrics,
    RateLimiterRegistry, RateSpec, RateSpecType, RegistryStats, Result, SpecParseError,
    SystemClock, VirtualClock, CRITICAL_LAG_OPS, DEFAULT_BURST_RATIO, DEFAULT_STRICTNESS,
    DEGRADED_LAG_OPS, GAP_SAMPLE_MODULUS, MAX_COMPENSATION_SHIFT, MAX_RATE, NANOS_PER_SECOND,
};

/// A rate limiter wrapped in `Arc` for convenient thread-safe sharing.
///
/// # Example
/// ```rust
/// use pacer::{RateLimiter, SharedRateLimiter};
/// use std::sync::Arc;
///
/// let limiter = RateLimiter::new(&"100".parse().unwrap(), None).unwrap();
/// let shared: SharedRateLimiter = Arc::new(limiter);
///
/// // Now you can clone and share across threads
/// let limiter_clone = shared.clone();
/// std::thread::spawn(move || {
///     limiter_clone.acquire();
/// });
/// ```
pub type SharedRateLimiter = std::sync::Arc<RateLimiter>;

/// A registry wrapped in `Arc`, as needed by
/// [`RateLimiterRegistry::start_delay_reporter`].
pub type SharedRegistry = std::sync::Arc<RateLimiterRegistry>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum supported Rust version.
///
/// This crate requires at least Rust 1.70.0 for `std::sync::OnceLock`.
pub const MSRV: &str = "1.70.0";

/// Prelude module for convenient imports.
///
/// Import everything you need with a single line:
/// ```rust
/// use pacer::prelude::*;
/// ```
pub mod prelude {
    //! Common imports for typical pacing use cases.
    //!
    //! # Example
    //! ```rust
    //! use pacer::prelude::*;
    //!
    //! let spec: RateSpec = "100".parse().unwrap();
    //! let limiter = RateLimiter::new(&spec, None).unwrap();
    //! let status = HealthStatus::Healthy;
    //! ```

    pub use crate::{
        Clock, HealthStatus, MemoryOrdering, RateLimiter, RateLimiterBuilder,
        RateLimiterConfig, RateLimiterMetrics, RateLimiterRegistry, RateSpec, RateSpecType,
        SharedRateLimiter, SharedRegistry, SystemClock, VirtualClock,
    };
}

/// Builder pattern for creating rate limiters with custom configuration.
///
/// Every setting is validated in [`build`](Self::build), so invalid values
/// come back as errors rather than panics.
///
/// # Example
///
/// ```rust
/// use pacer::{MemoryOrdering, RateLimiterBuilder, RateSpecType};
///
/// // Resume a paced session that was already 2ms behind
/// let limiter = RateLimiterBuilder::new()
///     .rate(250.0)
///     .burst_ratio(1.5)
///     .kind(RateSpecType::Strict)
///     .carried_delay_ns(2_000_000)
///     .memory_ordering(MemoryOrdering::Relaxed)
///     .build()
///     .unwrap();
/// assert_eq!(limiter.accumulated_delay_ns(), 2_000_000);
///
/// // Missing or invalid values are reported
/// assert!(RateLimiterBuilder::new().build().is_err());
/// assert!(RateLimiterBuilder::new().rate(10.0).strictness(2.0).build().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct RateLimiterBuilder {
    rate: Option<f64>,
    burst_ratio: f64,
    strictness: f64,
    kind: RateSpecType,
    carried_delay_ns: i64,
    ordering: MemoryOrdering,
}

impl RateLimiterBuilder {
    /// Creates a new builder with default configuration.
    ///
    /// Default configuration:
    /// - no rate (must be set)
    /// - burst ratio 1.1
    /// - strictness 1.0
    /// - strict scheduling type
    /// - no carried delay
    /// - AcquireRelease memory ordering
    pub fn new() -> Self {
        Self {
            rate: None,
            burst_ratio: DEFAULT_BURST_RATIO,
            strictness: DEFAULT_STRICTNESS,
            kind: RateSpecType::default(),
            carried_delay_ns: 0,
            ordering: MemoryOrdering::default(),
        }
    }

    /// Starts from an existing spec.
    pub fn from_spec(spec: &RateSpec) -> Self {
        Self {
            rate: Some(spec.rate()),
            burst_ratio: spec.burst_ratio(),
            strictness: spec.strictness(),
            kind: spec.kind(),
            ..Self::new()
        }
    }

    /// Sets the target rate in ops per second (`0 < rate <= 1e9`).
    pub fn rate(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Sets the burst ratio carried in the spec.
    pub fn burst_ratio(mut self, burst_ratio: f64) -> Self {
        self.burst_ratio = burst_ratio;
        self
    }

    /// Sets the strictness (`0.0..=1.0`).
    ///
    /// - 1.0: every observed gap is closed at once
    /// - 0.0: gaps are never closed; lagging callers may burst to catch up
    pub fn strictness(mut self, strictness: f64) -> Self {
        self.strictness = strictness;
        self
    }

    /// Sets the scheduling type tag.
    pub fn kind(mut self, kind: RateSpecType) -> Self {
        self.kind = kind;
        self
    }

    /// Seeds the accumulated delay, e.g. when resuming a session.
    pub fn carried_delay_ns(mut self, carried_delay_ns: i64) -> Self {
        self.carried_delay_ns = carried_delay_ns;
        self
    }

    /// Sets the memory ordering strategy for atomic operations.
    ///
    /// Unless you have specific requirements, use the default.
    pub fn memory_ordering(mut self, ordering: MemoryOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Builds a limiter on the system clock.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if no rate was set, or the rate or strictness
    /// is out of range.
    pub fn build(self) -> Result<RateLimiter> {
        self.build_with_clock(SystemClock)
    }

    /// Builds a limiter that reads `clock`.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn build_with_clock<C: Clock>(self, clock: C) -> Result<RateLimiter<C>> {
        let config = self.config()?;
        Ok(RateLimiter::with_config(config, clock)?)
    }

    /// Validated configuration this builder describes.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn config(&self) -> Result<RateLimiterConfig> {
        // A missing rate is reported as rate 0
        let rate = self.rate.unwrap_or(0.0);
        if !(rate.is_finite() && rate > 0.0) {
            return Err(ConfigurationError::RateOutOfRange { rate }.into());
        }
        let spec = RateSpec::new(rate)?
            .with_burst_ratio(self.burst_ratio)
            .with_strictness(self.strictness)
            .with_kind(self.kind);
        let config = RateLimiterConfig::new(spec)
            .with_carried_delay_ns(self.carried_delay_ns)
            .with_ordering(self.ordering);
        config.validate()?;
        Ok(config)
    }
}

impl Default for RateLimiterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
