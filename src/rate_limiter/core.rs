//! # Core Rate Limiter Implementation
//!
//! This module implements the pacing algorithm: a lock-free **ticks
//! timeline** that hands out nanosecond-wide slots to any number of calling
//! threads and blocks callers that run ahead of schedule.
//!
//! ## The Ticks Timeline
//!
//! ```text
//!     Timeline (ns on the monotonic clock):
//!
//!     ──┬──────┬──────┬──────┬──────┬──────►
//!       │ A    │ B    │ C    │ D    │
//!       └──────┴──────┴──────┴──────┘
//!       ^ slot starts handed out by fetch-add
//!
//!               now
//!                │
//!     A, B: slot start ≤ now  → no wait, overrun reported
//!     C, D: slot start > now  → caller sleeps until its slot
//! ```
//!
//! Each `acquire` does one fetch-add on the timeline. The slot it gets back
//! belongs to that caller alone; no two callers can ever overlap.
//!
//! ## Falling Behind
//!
//! When callers can't keep up, real time runs past the timeline and the gap
//! grows. A sampled fraction of calls moves the timeline forward by
//! `gap >> compensation_shift`:
//!
//! ```text
//!     strictness 1.0 → shift 0  → whole gap forgiven at once (isochronous)
//!     strictness 0.5 → shift 1  → half the gap per sampled call
//!     strictness 0.0 → shift 63 → nothing forgiven; callers may burst
//! ```
//!
//! ## Reconfiguration
//!
//! `set_rate`, `set_strictness`, `update` and `start` run under one mutex.
//! `acquire` never takes it; it only reads atomics that reconfiguration
//! stores.

use super::{
    clock::{Clock, SystemClock},
    config::{
        compensation_shift, op_ticks_for_rate, validate_rate, validate_strictness,
        MemoryOrdering, RateLimiterConfig, GAP_SAMPLE_MODULUS,
    },
    error::ConfigurationError,
    metrics::RateLimiterMetrics,
    rate_spec::RateSpec,
    utils::CacheAligned,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Lock-free timeline rate limiter.
///
/// One instance paces one resource. Share it by reference (usually
/// `Arc<RateLimiter>`) with every thread that does paced work.
///
/// ## Internal Structure
///
/// - The timeline and the cached clock reading are cache-aligned: every
///   caller writes the first and most callers read the second.
/// - Rate, op ticks, shift and strictness are atomics so `acquire` can read
///   them while a reconfiguration is in flight.
/// - The current [`RateSpec`] lives behind the reconfiguration mutex.
///
/// ## Example
///
/// ```rust
/// use pacer::{RateLimiter, RateSpec};
/// use std::sync::Arc;
/// use std::thread;
///
/// let spec: RateSpec = "2000".parse().unwrap();
/// let limiter = Arc::new(RateLimiter::new(&spec, None).unwrap());
/// limiter.start();
///
/// let handles: Vec<_> = (0..4)
///     .map(|_| {
///         let limiter = limiter.clone();
///         thread::spawn(move || {
///             for _ in 0..5 {
///                 limiter.acquire();
///                 // paced work goes here
///             }
///         })
///     })
///     .collect();
///
/// for handle in handles {
///     handle.join().unwrap();
/// }
/// ```
pub struct RateLimiter<C: Clock = SystemClock> {
    // Hot path fields

    /// Nanosecond instant up to which scheduling has been granted.
    ticks_timeline: CacheAligned<AtomicI64>,

    /// Most recent clock reading seen by any caller.
    last_seen_clock_ns: CacheAligned<AtomicI64>,

    /// Width of one op at the current rate.
    op_ticks_ns: AtomicI64,

    /// Right shift applied to observed gaps before closing them.
    compensation_shift: AtomicU32,

    // Accounting

    /// Delay carried over from earlier configurations or sessions.
    accumulated_delay_ns: AtomicI64,

    started: AtomicBool,

    // Configuration (cold path)

    /// `f64` bits of the current rate.
    rate_bits: AtomicU64,

    /// `f64` bits of the current strictness.
    strictness_bits: AtomicU64,

    /// Reconfiguration critical section; holds the spec last applied.
    spec: Mutex<RateSpec>,

    ordering: MemoryOrdering,

    clock: C,

    // Metrics fields

    total_grants: AtomicU64,
    blocked_grants: AtomicU64,
    total_slept_ns: AtomicU64,
    clock_reads: AtomicU64,
    gap_closures: AtomicU64,
    forgiven_ns: AtomicU64,
}

impl RateLimiter<SystemClock> {
    /// Creates a limiter on the system monotonic clock.
    ///
    /// `carried_delay_ns` seeds the accumulated delay when resuming a paced
    /// session; pass `None` for a fresh one. Call [`start`](Self::start)
    /// before the first `acquire`.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError`] if the spec's rate or strictness is out of range.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pacer::{RateLimiter, RateSpec};
    ///
    /// let spec: RateSpec = "500".parse().unwrap();
    /// let limiter = RateLimiter::new(&spec, None).unwrap();
    /// assert_eq!(limiter.op_ticks_ns(), 2_000_000);
    /// ```
    pub fn new(spec: &RateSpec, carried_delay_ns: Option<i64>) -> Result<Self, ConfigurationError> {
        Self::with_clock(spec, carried_delay_ns, SystemClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Creates a limiter that reads time from `clock`.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError`] if the spec's rate or strictness is out of range.
    pub fn with_clock(
        spec: &RateSpec,
        carried_delay_ns: Option<i64>,
        clock: C,
    ) -> Result<Self, ConfigurationError> {
        let config = RateLimiterConfig::new(*spec).with_carried_delay_ns(carried_delay_ns.unwrap_or(0));
        Self::with_config(config, clock)
    }

    /// Creates a limiter from a full configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError`] if [`RateLimiterConfig::validate`] fails.
    pub fn with_config(config: RateLimiterConfig, clock: C) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let spec = config.spec;
        let op_ticks = op_ticks_for_rate(spec.rate());
        let now = clock.now_nanos();

        debug!(
            rate = spec.rate(),
            op_ticks_ns = op_ticks,
            strictness = spec.strictness(),
            carried_delay_ns = config.carried_delay_ns,
            "Created rate limiter"
        );

        Ok(Self {
            ticks_timeline: CacheAligned::new(AtomicI64::new(now)),
            last_seen_clock_ns: CacheAligned::new(AtomicI64::new(now)),
            op_ticks_ns: AtomicI64::new(op_ticks),
            compensation_shift: AtomicU32::new(compensation_shift(spec.strictness())),
            accumulated_delay_ns: AtomicI64::new(config.carried_delay_ns.max(0)),
            started: AtomicBool::new(false),
            rate_bits: AtomicU64::new(spec.rate().to_bits()),
            strictness_bits: AtomicU64::new(spec.strictness().to_bits()),
            spec: Mutex::new(spec),
            ordering: config.ordering,
            clock,
            total_grants: AtomicU64::new(0),
            blocked_grants: AtomicU64::new(0),
            total_slept_ns: AtomicU64::new(0),
            clock_reads: AtomicU64::new(0),
            gap_closures: AtomicU64::new(0),
            forgiven_ns: AtomicU64::new(0),
        })
    }

    /// Begins a fresh accounting epoch.
    ///
    /// The first call zeroes the accumulated delay (including any carried
    /// delay) and moves the timeline to "now". Later calls do nothing.
    pub fn start(&self) {
        let _guard = self.lock_spec();
        if self.started.swap(true, self.ordering.rmw()) {
            return;
        }
        self.accumulated_delay_ns.store(0, self.ordering.store());
        self.reset_references();
        debug!(timeline_ns = self.ticks_timeline_ns(), "Started rate limiter");
    }

    /// Returns `true` once [`start`](Self::start) has run.
    #[inline]
    pub fn is_started(&self) -> bool {
        self.started.load(self.ordering.load())
    }

    /// Acquires one op's worth of schedule. Same as
    /// `acquire_nanos(op_ticks_ns)`.
    ///
    /// # Returns
    ///
    /// - `0` if the caller was ahead of schedule and slept until its slot
    /// - otherwise the nanoseconds by which its slot was already overdue
    #[inline]
    pub fn acquire(&self) -> i64 {
        self.acquire_nanos(self.op_ticks_ns.load(self.ordering.load()))
    }

    /// Reserves `nanos` of schedule and waits for the slot if it's ahead.
    ///
    /// ## How it Works
    ///
    /// ```text
    ///     acquire_nanos(w) flow:
    ///
    ///     fetch_add(w) ──► slot start S
    ///          │
    ///          ▼
    ///     cached clock < S? ──Yes──► read clock, publish
    ///          │                         │
    ///          │                  10th read? ──Yes──► close gap >> shift
    ///          ▼                         │
    ///     delay = S - clock ◄────────────┘
    ///          │
    ///     delay > 0 ──Yes──► sleep(delay), return 0
    ///          │
    ///          No ──► return clock - S (overrun)
    /// ```
    ///
    /// A zero width is legal and reserves an empty slot. Negative widths
    /// count as zero, and a width that would carry the timeline past
    /// `i64::MAX` is cut short there. Early wake-ups from the sleep are not
    /// corrected; the caller simply proceeds.
    pub fn acquire_nanos(&self, nanos: i64) -> i64 {
        let width = self.bounded_width(nanos);
        let slot_start = self
            .ticks_timeline
            .get()
            .fetch_add(width, self.ordering.rmw());

        let mut seen = self.last_seen_clock_ns.get().load(self.ordering.load());
        if seen < slot_start {
            let now = self.clock.now_nanos();
            let previous = self
                .last_seen_clock_ns
                .get()
                .fetch_max(now, self.ordering.rmw());
            seen = previous.max(now);

            let read = self.clock_reads.fetch_add(1, Ordering::Relaxed);
            if read % GAP_SAMPLE_MODULUS == 0 {
                self.close_gap(now, slot_start, width);
            }
        }

        self.total_grants.fetch_add(1, Ordering::Relaxed);

        let delay = slot_start.saturating_sub(seen);
        if delay > 0 {
            self.blocked_grants.fetch_add(1, Ordering::Relaxed);
            self.total_slept_ns.fetch_add(delay as u64, Ordering::Relaxed);
            self.clock.sleep_nanos(delay);
            return 0;
        }

        seen.saturating_sub(slot_start)
    }

    /// Reserves `nanos` of schedule without reading the clock or waiting.
    ///
    /// Returns the start of the reserved slot. Useful for bookkeeping
    /// grants made on behalf of work that is paced elsewhere. Widths are
    /// bounded as in [`acquire_nanos`](Self::acquire_nanos).
    #[inline]
    pub fn reserve(&self, nanos: i64) -> i64 {
        let width = self.bounded_width(nanos);
        self.ticks_timeline
            .get()
            .fetch_add(width, self.ordering.rmw())
    }

    /// Clamps `nanos` into `[0, i64::MAX - timeline]`.
    #[inline]
    fn bounded_width(&self, nanos: i64) -> i64 {
        let timeline = self.ticks_timeline.get().load(Ordering::Relaxed);
        nanos.clamp(0, i64::MAX.saturating_sub(timeline).max(0))
    }

    /// Moves the timeline toward real time when a sampled slot is overdue.
    #[inline]
    fn close_gap(&self, now: i64, slot_start: i64, width: i64) {
        let gap = now.saturating_sub(slot_start).saturating_sub(width);
        if gap <= 0 {
            return;
        }
        let shift = self.compensation_shift.load(Ordering::Relaxed);
        let forgiven = gap >> shift;
        if forgiven > 0 {
            debug!(gap_ns = gap, forgiven_ns = forgiven, "Closing scheduling gap");
            self.ticks_timeline
                .get()
                .fetch_add(forgiven, self.ordering.rmw());
            self.gap_closures.fetch_add(1, Ordering::Relaxed);
            self.forgiven_ns.fetch_add(forgiven as u64, Ordering::Relaxed);
        }
    }

    /// How far real time has run past the timeline, clamped at zero.
    #[inline]
    pub fn current_scheduling_delay_ns(&self) -> i64 {
        let timeline = self.ticks_timeline.get().load(self.ordering.load());
        self.clock.now_nanos().saturating_sub(timeline).max(0)
    }

    /// Current delay plus everything carried over from before.
    #[inline]
    pub fn cumulative_scheduling_delay_ns(&self) -> i64 {
        self.current_scheduling_delay_ns()
            .saturating_add(self.accumulated_delay_ns.load(self.ordering.load()))
    }

    /// Current target rate in ops per second.
    #[inline]
    pub fn rate(&self) -> f64 {
        f64::from_bits(self.rate_bits.load(self.ordering.load()))
    }

    /// Changes the target rate.
    ///
    /// The delay accrued so far is folded into the accumulated delay, then
    /// the timeline restarts at "now" with the new op width.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::RateOutOfRange`] if `rate` is not in `(0, 1e9]`.
    /// Nothing changes in that case.
    pub fn set_rate(&self, rate: f64) -> Result<(), ConfigurationError> {
        validate_rate(rate)?;
        let mut spec = self.lock_spec();
        self.apply_rate(rate);
        *spec = spec.with_rate(rate);
        Ok(())
    }

    /// Current strictness.
    #[inline]
    pub fn strictness(&self) -> f64 {
        f64::from_bits(self.strictness_bits.load(self.ordering.load()))
    }

    /// Changes how quickly lag is forgiven.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::StrictnessOutOfRange`] if `strictness` is not
    /// in `[0, 1]`. Nothing changes in that case.
    pub fn set_strictness(&self, strictness: f64) -> Result<(), ConfigurationError> {
        validate_strictness(strictness)?;
        let mut spec = self.lock_spec();
        self.apply_strictness(strictness);
        *spec = spec.with_strictness(strictness);
        Ok(())
    }

    /// Applies whichever of rate and strictness differ from `spec`.
    ///
    /// Both values are validated before anything changes. Burst ratio and
    /// type are recorded as given.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError`] if the new rate or strictness is out of range.
    pub fn update(&self, spec: &RateSpec) -> Result<(), ConfigurationError> {
        validate_rate(spec.rate())?;
        validate_strictness(spec.strictness())?;

        let mut current = self.lock_spec();
        if *current == *spec {
            debug!(spec = %spec, "Rate spec unchanged, skipping update");
            return Ok(());
        }
        if current.rate() != spec.rate() {
            self.apply_rate(spec.rate());
        }
        if current.strictness() != spec.strictness() {
            self.apply_strictness(spec.strictness());
        }
        *current = *spec;
        Ok(())
    }

    /// The spec most recently applied.
    pub fn spec(&self) -> RateSpec {
        *self.lock_spec()
    }

    /// Width of one op on the timeline, in nanoseconds.
    #[inline]
    pub fn op_ticks_ns(&self) -> i64 {
        self.op_ticks_ns.load(self.ordering.load())
    }

    /// Shift currently applied to observed gaps.
    #[inline]
    pub fn compensation_shift(&self) -> u32 {
        self.compensation_shift.load(self.ordering.load())
    }

    /// Instant up to which schedule has been granted.
    #[inline]
    pub fn ticks_timeline_ns(&self) -> i64 {
        self.ticks_timeline.get().load(self.ordering.load())
    }

    /// The cached clock reading used by the hot path.
    #[inline]
    pub fn last_seen_clock_ns(&self) -> i64 {
        self.last_seen_clock_ns.get().load(self.ordering.load())
    }

    /// Delay carried over from earlier configurations or sessions.
    #[inline]
    pub fn accumulated_delay_ns(&self) -> i64 {
        self.accumulated_delay_ns.load(self.ordering.load())
    }

    /// The clock this limiter reads.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// One-line snapshot for logs: rate, op ticks, delay and strictness.
    pub fn summary(&self) -> String {
        format!(
            "rate={}, opticks={}, delay={}, strictness={} (shift {})",
            self.rate(),
            self.op_ticks_ns(),
            self.current_scheduling_delay_ns(),
            self.strictness(),
            self.compensation_shift()
        )
    }

    /// Returns configuration, delay and activity counters in one snapshot.
    pub fn metrics(&self) -> RateLimiterMetrics {
        let current_delay_ns = self.current_scheduling_delay_ns();
        let accumulated_delay_ns = self.accumulated_delay_ns();
        RateLimiterMetrics {
            rate: self.rate(),
            op_ticks_ns: self.op_ticks_ns(),
            strictness: self.strictness(),
            compensation_shift: self.compensation_shift(),
            current_delay_ns,
            accumulated_delay_ns,
            cumulative_delay_ns: current_delay_ns.saturating_add(accumulated_delay_ns),
            total_grants: self.total_grants.load(Ordering::Relaxed),
            blocked_grants: self.blocked_grants.load(Ordering::Relaxed),
            total_slept_ns: self.total_slept_ns.load(Ordering::Relaxed),
            clock_reads: self.clock_reads.load(Ordering::Relaxed),
            gap_closures: self.gap_closures.load(Ordering::Relaxed),
            forgiven_ns: self.forgiven_ns.load(Ordering::Relaxed),
        }
    }

    // Callers hold the spec lock for everything below.

    fn apply_rate(&self, rate: f64) {
        self.accumulate_delay();
        let op_ticks = op_ticks_for_rate(rate);
        self.op_ticks_ns.store(op_ticks, self.ordering.store());
        self.rate_bits.store(rate.to_bits(), self.ordering.store());
        info!(rate, op_ticks_ns = op_ticks, "OpTicksNs for one cycle is {}ns", op_ticks);
        self.reset_references();
    }

    fn apply_strictness(&self, strictness: f64) {
        let shift = compensation_shift(strictness);
        self.compensation_shift.store(shift, self.ordering.store());
        self.strictness_bits
            .store(strictness.to_bits(), self.ordering.store());
        debug!(strictness, shift, "Updated compensation shift");
    }

    fn accumulate_delay(&self) {
        let current = self.current_scheduling_delay_ns();
        self.accumulated_delay_ns
            .fetch_add(current, self.ordering.rmw());
    }

    fn reset_references(&self) {
        let now = self.clock.now_nanos();
        self.ticks_timeline.get().store(now, self.ordering.store());
        self.last_seen_clock_ns.get().store(now, self.ordering.store());
    }

    fn lock_spec(&self) -> MutexGuard<'_, RateSpec> {
        self.spec.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Clock> fmt::Display for RateLimiter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

impl<C: Clock> fmt::Debug for RateLimiter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rate", &self.rate())
            .field("op_ticks_ns", &self.op_ticks_ns())
            .field("strictness", &self.strictness())
            .field("compensation_shift", &self.compensation_shift())
            .field("ticks_timeline_ns", &self.ticks_timeline_ns())
            .field("accumulated_delay_ns", &self.accumulated_delay_ns())
            .field("started", &self.is_started())
            .finish()
    }
}
