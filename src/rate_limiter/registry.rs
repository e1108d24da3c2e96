//! # Named Rate Limiter Registry
//!
//! Keeps one [`RateLimiter`] per named activity so that re-applying a
//! configuration updates the running limiter in place instead of replacing
//! it (and losing its timeline and accumulated delay).
//!
//! ## Architecture
//!
//! ```text
//!     Activity configs:
//!     "reads"  ──┐
//!     "writes" ──┼──► Registry ──► create_or_update ──► RateLimiter
//!     "scans"  ──┘        │
//!                         ▼
//!                   ┌──────────────────┐
//!                   │  DashMap         │
//!                   │  ┌────────────┐  │
//!                   │  │name → RL   │  │  RL = Rate Limiter
//!                   │  │name → RL   │  │
//!                   │  └────────────┘  │
//!                   └──────────────────┘
//!                         │
//!                         ▼
//!                  delay reporter thread ──► tracing
//! ```
//!
//! ## Key Features
//!
//! 1. **Create or update**: a second config for the same name reconfigures
//!    the existing limiter
//! 2. **Resume**: new limiters can inherit delay from a prior session
//! 3. **Delay gauges**: `(name, cumulative delay)` pairs for an external
//!    metrics sink
//! 4. **Background reporting**: a stoppable thread logs every limiter's
//!    summary and warns on critical lag

use super::{
    clock::{Clock, SystemClock},
    config::{MemoryOrdering, RateLimiterConfig},
    core::RateLimiter,
    error::ConfigurationError,
    metrics::HealthStatus,
    rate_spec::RateSpec,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Name used for the delay reporter thread.
const REPORTER_THREAD_NAME: &str = "pacer-delay-reporter";

/// Registry of rate limiters keyed by activity name.
///
/// ## Usage Patterns
///
/// ### Reconfiguring a Running Activity
///
/// ```rust
/// use pacer::{RateLimiterRegistry, RateSpec};
///
/// let registry = RateLimiterRegistry::new();
///
/// let limiter = registry.create_or_update("reads", &"1000".parse().unwrap()).unwrap();
/// limiter.start();
///
/// // Same name: the running limiter is updated, not replaced
/// let again = registry.create_or_update("reads", &"2000".parse().unwrap()).unwrap();
/// assert!(std::sync::Arc::ptr_eq(&limiter, &again));
/// assert_eq!(again.rate(), 2000.0);
/// ```
///
/// ### With Background Delay Reporting
///
/// ```rust
/// use pacer::RateLimiterRegistry;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let registry = Arc::new(RateLimiterRegistry::new());
/// registry.create_or_update("writes", &"500".parse().unwrap()).unwrap();
///
/// let (handle, stop_tx) = registry
///     .clone()
///     .start_delay_reporter(Duration::from_secs(10))
///     .unwrap();
///
/// // Later, to stop the thread:
/// stop_tx.send(()).unwrap();
/// handle.join().unwrap();
/// ```
pub struct RateLimiterRegistry<C: Clock + Clone = SystemClock> {
    /// Name to limiter mappings.
    limiters: DashMap<String, Arc<RateLimiter<C>>, ahash::RandomState>,

    /// Clock handed to every limiter this registry creates.
    clock: C,

    /// Memory ordering for every limiter this registry creates.
    ordering: MemoryOrdering,

    /// Limiters created since startup.
    total_created: AtomicU64,

    /// Existing limiters reconfigured through `create_or_update`.
    total_updated: AtomicU64,

    /// Limiters removed since startup.
    total_removed: AtomicU64,
}

impl RateLimiterRegistry<SystemClock> {
    /// Creates an empty registry on the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for RateLimiterRegistry<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock + Clone> RateLimiterRegistry<C> {
    /// Creates an empty registry whose limiters read `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self {
            limiters: DashMap::with_hasher(ahash::RandomState::new()),
            clock,
            ordering: MemoryOrdering::default(),
            total_created: AtomicU64::new(0),
            total_updated: AtomicU64::new(0),
            total_removed: AtomicU64::new(0),
        }
    }

    /// Sets the memory ordering used by limiters created from now on.
    pub fn with_ordering(mut self, ordering: MemoryOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Returns the limiter for `name`, creating it from `spec` if absent or
    /// applying `spec` to it if present.
    ///
    /// New limiters are not started; call [`RateLimiter::start`] when the
    /// activity begins.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError`] if `spec` can't be applied. An existing limiter
    /// keeps its previous configuration and nothing new is inserted.
    pub fn create_or_update(
        &self,
        name: &str,
        spec: &RateSpec,
    ) -> Result<Arc<RateLimiter<C>>, ConfigurationError> {
        self.create_or_resume(name, spec, 0)
    }

    /// Like [`create_or_update`](Self::create_or_update), but a newly
    /// created limiter starts with `carried_delay_ns` of accumulated delay.
    ///
    /// The carried delay is ignored when the limiter already exists.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError`] if `spec` can't be applied.
    pub fn create_or_resume(
        &self,
        name: &str,
        spec: &RateSpec,
        carried_delay_ns: i64,
    ) -> Result<Arc<RateLimiter<C>>, ConfigurationError> {
        // Fast path: update without holding the shard lock
        if let Some(existing) = self.get(name) {
            existing.update(spec)?;
            self.total_updated.fetch_add(1, Ordering::Relaxed);
            debug!(activity = name, spec = %spec, "Updated rate limiter");
            return Ok(existing);
        }

        let limiter = match self.limiters.entry(name.to_string()) {
            Entry::Occupied(occupied) => {
                // Another thread created it while we were checking
                let existing = occupied.get().clone();
                drop(occupied);
                existing.update(spec)?;
                self.total_updated.fetch_add(1, Ordering::Relaxed);
                existing
            }
            Entry::Vacant(vacant) => {
                let config = RateLimiterConfig::new(*spec)
                    .with_carried_delay_ns(carried_delay_ns)
                    .with_ordering(self.ordering);
                let limiter = Arc::new(RateLimiter::with_config(config, self.clock.clone())?);
                vacant.insert(limiter.clone());

                let total = self.total_created.fetch_add(1, Ordering::Relaxed) + 1;
                info!(activity = name, spec = %spec, total, "Created rate limiter");
                limiter
            }
        };

        Ok(limiter)
    }

    /// Returns the limiter registered under `name`.
    #[inline]
    pub fn get(&self, name: &str) -> Option<Arc<RateLimiter<C>>> {
        self.limiters.get(name).map(|entry| entry.value().clone())
    }

    /// Removes and returns the limiter registered under `name`.
    ///
    /// Threads still holding the `Arc` keep using it.
    pub fn remove(&self, name: &str) -> Option<Arc<RateLimiter<C>>> {
        let removed = self.limiters.remove(name).map(|(_, limiter)| limiter);
        if removed.is_some() {
            self.total_removed.fetch_add(1, Ordering::Relaxed);
            debug!(activity = name, "Removed rate limiter");
        }
        removed
    }

    /// Number of registered limiters.
    #[inline]
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    /// Returns true if no limiters are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .limiters
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort_unstable();
        names
    }

    /// Removes every limiter.
    pub fn clear(&self) {
        let count = self.limiters.len();
        self.limiters.clear();
        self.total_removed.fetch_add(count as u64, Ordering::Relaxed);
        info!("Cleared all {} rate limiters", count);
    }

    /// Cumulative scheduling delay per limiter, sorted by name.
    ///
    /// Meant to be polled by an external metrics sink.
    pub fn delay_gauges(&self) -> Vec<DelayGauge> {
        let mut gauges: Vec<DelayGauge> = self
            .limiters
            .iter()
            .map(|entry| DelayGauge {
                name: entry.key().clone(),
                cumulative_delay_ns: entry.value().cumulative_scheduling_delay_ns(),
            })
            .collect();
        gauges.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        gauges
    }

    /// Lifetime counters for this registry.
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            active: self.len(),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_updated: self.total_updated.load(Ordering::Relaxed),
            total_removed: self.total_removed.load(Ordering::Relaxed),
        }
    }

    /// Logs every limiter's summary once; warns for critical lag.
    ///
    /// Returns the number of limiters in critical lag.
    pub fn report_delays(&self) -> usize {
        let mut critical = 0;
        for entry in self.limiters.iter() {
            let name = entry.key();
            let metrics = entry.value().metrics();
            let health = metrics.health_status();
            if health == HealthStatus::Critical {
                critical += 1;
                warn!(
                    activity = %name,
                    lag_ops = metrics.lag_ops(),
                    cumulative_delay_ns = metrics.cumulative_delay_ns,
                    "{}",
                    health.suggested_action()
                );
            } else {
                debug!(activity = %name, "{}", entry.value().summary());
            }
        }
        critical
    }
}

impl<C: Clock + Clone + 'static> RateLimiterRegistry<C> {
    /// Starts a thread that calls [`report_delays`](Self::report_delays)
    /// every `interval` until signalled.
    ///
    /// # Returns
    ///
    /// A tuple of:
    /// - `JoinHandle` for the reporter thread
    /// - `Sender` to signal the thread to stop (dropping it also stops it)
    ///
    /// # Errors
    ///
    /// The I/O error from the OS if the thread can't be spawned.
    pub fn start_delay_reporter(
        self: Arc<Self>,
        interval: Duration,
    ) -> io::Result<(thread::JoinHandle<()>, mpsc::Sender<()>)> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let registry = self;

        let handle = thread::Builder::new()
            .name(REPORTER_THREAD_NAME.to_string())
            .spawn(move || {
                info!("Started delay reporter (interval: {:?})", interval);

                loop {
                    match stop_rx.recv_timeout(interval) {
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                            info!("Delay reporter stopping");
                            break;
                        }
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            registry.report_delays();
                        }
                    }
                }
            })?;

        Ok((handle, stop_tx))
    }
}

impl<C: Clock + Clone> fmt::Debug for RateLimiterRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiterRegistry")
            .field("names", &self.names())
            .field("ordering", &self.ordering)
            .finish()
    }
}

/// Cumulative scheduling delay of one named limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelayGauge {
    /// Activity name the limiter is registered under.
    pub name: String,

    /// Current plus accumulated delay, in nanoseconds.
    pub cumulative_delay_ns: i64,
}

/// Lifetime counters of a [`RateLimiterRegistry`].
///
/// ## Metrics Explained
///
/// - **active**: limiters registered right now
/// - **total_created**: limiters created since startup
/// - **total_updated**: reconfigurations applied to existing limiters
/// - **total_removed**: limiters removed or cleared
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Limiters currently registered.
    pub active: usize,

    /// Limiters created since startup.
    pub total_created: u64,

    /// Reconfigurations applied to existing limiters.
    pub total_updated: u64,

    /// Limiters removed since startup.
    pub total_removed: u64,
}

impl RegistryStats {
    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Rate Limiter Registry Stats:\n\
             ├─ Active: {}\n\
             └─ Lifetime:\n\
                ├─ Created: {}\n\
                ├─ Updated: {}\n\
                └─ Removed: {}",
            self.active, self.total_created, self.total_updated, self.total_removed
        )
    }
}

impl fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}
