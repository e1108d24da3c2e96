//! # Rate Limiter Module
//!
//! This module provides the internal implementation of the pacing
//! functionality. It's organized into several submodules, each responsible
//! for a specific aspect of the system.
//!
//! ## Module Structure
//!
//! ```text
//!     rate_limiter/
//!     ├── mod.rs          (You are here - Module organization)
//!     ├── clock.rs        (Time source abstraction)
//!     ├── config.rs       (Configuration, constants and validation)
//!     ├── core.rs         (Ticks timeline implementation)
//!     ├── error.rs        (Error types)
//!     ├── metrics.rs      (Delay and health monitoring)
//!     ├── rate_spec.rs    (Rate spec value type and parser)
//!     ├── registry.rs     (Named limiter management)
//!     └── utils.rs        (Monotonic time base, cache alignment)
//! ```
//!
//! ## Architecture Flow
//!
//! ```text
//!     Activity config ("1000,1.1,strict")
//!          │
//!          ▼
//!     ┌──────────┐
//!     │ RateSpec │ ◄── Parsing & defaults
//!     └────┬─────┘
//!          │
//!          ▼
//!     ┌──────────┐
//!     │ Registry │ ◄── Create or update by name
//!     └────┬─────┘
//!          │
//!          ▼
//!     ┌──────────┐
//!     │  Core    │ ◄── Ticks timeline, gap closing
//!     └────┬─────┘
//!          │
//!          ▼
//!     ┌──────────┐
//!     │  Clock   │ ◄── System or virtual time
//!     └──────────┘
//! ```

mod clock;
mod config;
mod core;
mod error;
mod metrics;
mod rate_spec;
mod registry;
mod utils;

/// Time sources
pub use clock::{Clock, SystemClock, VirtualClock};

/// Configuration types, constants and the strictness mapping
pub use config::{
    compensation_shift, MemoryOrdering, RateLimiterConfig, DEFAULT_BURST_RATIO,
    DEFAULT_STRICTNESS, GAP_SAMPLE_MODULUS, MAX_COMPENSATION_SHIFT, MAX_RATE, NANOS_PER_SECOND,
};

/// Timeline rate limiter
pub use core::RateLimiter;

/// Error types
pub use error::{ConfigurationError, Error, Result, SpecParseError};

/// Metrics and health monitoring
pub use metrics::{HealthStatus, RateLimiterMetrics, CRITICAL_LAG_OPS, DEGRADED_LAG_OPS};

/// Rate spec value type
pub use rate_spec::{RateSpec, RateSpecType};

/// Named limiter management
pub use registry::{DelayGauge, RateLimiterRegistry, RegistryStats};

/// Monotonic time base
pub use utils::monotonic_nanos;
