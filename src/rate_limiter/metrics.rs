//! # Scheduling Metrics
//!
//! Point-in-time view of a limiter: its configuration, how far behind
//! schedule it is, and what the hot path has been doing.
//!
//! ```text
//!     Metrics Dashboard:
//!     ┌─────────────────────────────────────┐
//!     │  Rate: 1000 ops/s  (1000000ns/op)   │
//!     │  Current Delay: 2.500ms  (2 ops)    │
//!     │  Cumulative Delay: 14.000ms         │
//!     │                                     │
//!     │  Grants: 10000  Blocked: 9950       │
//!     │  Health: ✅ Healthy                 │
//!     └─────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::fmt;

/// Lag below this many op ticks is considered on schedule.
pub const DEGRADED_LAG_OPS: i64 = 10;

/// Lag at or above this many op ticks is critical.
pub const CRITICAL_LAG_OPS: i64 = 1_000;

/// Snapshot of a limiter's configuration, delay and activity counters.
///
/// ## Example Usage
///
/// ```rust
/// use pacer::{RateLimiter, RateSpec};
///
/// let limiter = RateLimiter::new(&"1000".parse::<RateSpec>().unwrap(), None).unwrap();
/// limiter.start();
///
/// let metrics = limiter.metrics();
/// if metrics.health_status().is_unhealthy() {
///     println!("{}", metrics.summary());
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimiterMetrics {
    /// Configured rate in ops per second.
    pub rate: f64,

    /// Width of one op on the timeline, in nanoseconds.
    pub op_ticks_ns: i64,

    /// Configured strictness (0.0–1.0).
    pub strictness: f64,

    /// Shift derived from strictness.
    pub compensation_shift: u32,

    /// How far real time is past the timeline right now (clamped at 0).
    pub current_delay_ns: i64,

    /// Delay folded in from earlier configurations or sessions.
    pub accumulated_delay_ns: i64,

    /// `current_delay_ns + accumulated_delay_ns`.
    pub cumulative_delay_ns: i64,

    /// Number of `acquire` calls served.
    pub total_grants: u64,

    /// Calls that were ahead of schedule and had to sleep.
    pub blocked_grants: u64,

    /// Total nanoseconds callers were asked to sleep.
    pub total_slept_ns: u64,

    /// Calls that found the cached clock stale and read the clock.
    pub clock_reads: u64,

    /// Sampled calls that moved the timeline forward to close a gap.
    pub gap_closures: u64,

    /// Total nanoseconds of lag forgiven by gap closing.
    pub forgiven_ns: u64,
}

impl RateLimiterMetrics {
    /// Current delay expressed as a number of op ticks.
    #[inline]
    pub fn lag_ops(&self) -> i64 {
        if self.op_ticks_ns <= 0 {
            0
        } else {
            self.current_delay_ns / self.op_ticks_ns
        }
    }

    /// Whether real time has run past the schedule at all.
    #[inline]
    pub fn is_behind_schedule(&self) -> bool {
        self.current_delay_ns > 0
    }

    /// Fraction of grants that had to wait (0.0 to 1.0).
    ///
    /// A paced workload that keeps up sits near 1.0; a value near 0.0
    /// means callers can't keep up with the target rate.
    #[inline]
    pub fn blocked_ratio(&self) -> f64 {
        if self.total_grants == 0 {
            0.0
        } else {
            self.blocked_grants as f64 / self.total_grants as f64
        }
    }

    /// Current delay in milliseconds.
    #[inline]
    pub fn current_delay_ms(&self) -> f64 {
        self.current_delay_ns as f64 / 1_000_000.0
    }

    /// Cumulative delay in milliseconds.
    #[inline]
    pub fn cumulative_delay_ms(&self) -> f64 {
        self.cumulative_delay_ns as f64 / 1_000_000.0
    }

    /// Classifies the current lag.
    ///
    /// - **Healthy**: under [`DEGRADED_LAG_OPS`] ops behind
    /// - **Degraded**: under [`CRITICAL_LAG_OPS`] ops behind
    /// - **Critical**: further behind than that
    pub fn health_status(&self) -> HealthStatus {
        let lag = self.lag_ops();
        if lag >= CRITICAL_LAG_OPS {
            HealthStatus::Critical
        } else if lag >= DEGRADED_LAG_OPS {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Generates a human-readable summary of the metrics.
    ///
    /// # Example Output
    ///
    /// ```text
    /// RateLimiter Metrics:
    /// ├─ Configuration:
    /// │  ├─ Rate: 1000 ops/s
    /// │  ├─ Op Ticks: 1000000ns
    /// │  └─ Strictness: 1 (shift 0)
    /// ├─ Delay:
    /// │  ├─ Current: 0.000ms (0 ops)
    /// │  ├─ Accumulated: 0.000ms
    /// │  └─ Cumulative: 0.000ms
    /// ├─ Counters:
    /// │  ├─ Grants: 0
    /// │  ├─ Blocked: 0 (0.00%)
    /// │  ├─ Slept: 0.000ms
    /// │  ├─ Clock Reads: 0
    /// │  └─ Gap Closures: 0 (0.000ms forgiven)
    /// └─ Health: ✅ Healthy
    /// ```
    pub fn summary(&self) -> String {
        format!(
            "RateLimiter Metrics:\n\
             ├─ Configuration:\n\
             │  ├─ Rate: {} ops/s\n\
             │  ├─ Op Ticks: {}ns\n\
             │  └─ Strictness: {} (shift {})\n\
             ├─ Delay:\n\
             │  ├─ Current: {:.3}ms ({} ops)\n\
             │  ├─ Accumulated: {:.3}ms\n\
             │  └─ Cumulative: {:.3}ms\n\
             ├─ Counters:\n\
             │  ├─ Grants: {}\n\
             │  ├─ Blocked: {} ({:.2}%)\n\
             │  ├─ Slept: {:.3}ms\n\
             │  ├─ Clock Reads: {}\n\
             │  └─ Gap Closures: {} ({:.3}ms forgiven)\n\
             └─ Health: {}",
            self.rate,
            self.op_ticks_ns,
            self.strictness,
            self.compensation_shift,
            self.current_delay_ms(),
            self.lag_ops(),
            self.accumulated_delay_ns as f64 / 1_000_000.0,
            self.cumulative_delay_ms(),
            self.total_grants,
            self.blocked_grants,
            self.blocked_ratio() * 100.0,
            self.total_slept_ns as f64 / 1_000_000.0,
            self.clock_reads,
            self.gap_closures,
            self.forgiven_ns as f64 / 1_000_000.0,
            self.health_status(),
        )
    }
}

impl fmt::Display for RateLimiterMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// How far behind schedule a limiter is running.
///
/// ```text
///     Healthy ──────► Keeping up with the target rate
///        │
///     Degraded ─────► Falling behind, backlog growing
///        │
///     Critical ─────► Far behind, callers can't sustain the rate
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Less than [`DEGRADED_LAG_OPS`] ops of lag.
    Healthy,

    /// Noticeable lag; the host may want to apply backpressure.
    Degraded,

    /// Lag of [`CRITICAL_LAG_OPS`] ops or more.
    Critical,
}

impl HealthStatus {
    /// Returns true if the status indicates any lag problem.
    pub fn is_unhealthy(&self) -> bool {
        !matches!(self, Self::Healthy)
    }

    /// Returns a suggested action based on the health status.
    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::Healthy => "No action needed",
            Self::Degraded => "Monitor closely, callers are falling behind the target rate",
            Self::Critical => "Immediate action required: add concurrency or lower the rate",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "✅ Healthy"),
            Self::Degraded => write!(f, "⚠️ Degraded"),
            Self::Critical => write!(f, "🔴 Critical"),
        }
    }
}
