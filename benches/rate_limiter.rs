//! # Rate Limiter Benchmarks
//!
//! Hot-path and reconfiguration benchmarks for the timeline rate limiter.
//! Limiters run at the maximum rate (1ns per op) or against a virtual clock
//! parked far in the future, so callers are behind schedule and never sleep.
//!
//! Run with: `cargo bench`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pacer::{
    MemoryOrdering, RateLimiter, RateLimiterConfig, RateLimiterRegistry, RateSpec, VirtualClock,
    MAX_RATE,
};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn max_rate_spec() -> RateSpec {
    RateSpec::new(MAX_RATE).unwrap()
}

/// Limiter on a clock parked far ahead of any timeline the bench can reach
fn parked_limiter(strictness: f64) -> RateLimiter<VirtualClock> {
    let clock = VirtualClock::new(i64::MAX / 2);
    let spec = max_rate_spec().with_strictness(strictness);
    let limiter = RateLimiter::with_clock(&spec, None, clock).unwrap();
    limiter.start();
    limiter
}

/// Benchmark single-threaded acquisition on the system clock
fn bench_single_acquire(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_acquire");
    group.throughput(Throughput::Elements(1));

    group.bench_function("system_clock", |b| {
        let limiter = RateLimiter::new(&max_rate_spec(), None).unwrap();
        limiter.start();
        b.iter(|| black_box(limiter.acquire()));
    });

    group.bench_function("virtual_clock", |b| {
        let limiter = parked_limiter(1.0);
        b.iter(|| black_box(limiter.acquire()));
    });

    group.bench_function("reserve", |b| {
        let limiter = parked_limiter(1.0);
        b.iter(|| black_box(limiter.reserve(1)));
    });

    group.finish();
}

/// Benchmark acquisition across slot widths
fn bench_acquire_widths(c: &mut Criterion) {
    let mut group = c.benchmark_group("acquire_nanos");

    for width in [1i64, 10, 1_000, 1_000_000] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            let limiter = parked_limiter(1.0);
            b.iter(|| black_box(limiter.acquire_nanos(width)));
        });
    }

    group.finish();
}

/// Benchmark gap closing cost across strictness levels
fn bench_strictness(c: &mut Criterion) {
    let mut group = c.benchmark_group("strictness");

    for strictness in [0.0, 0.5, 1.0] {
        group.bench_with_input(
            BenchmarkId::from_parameter(strictness),
            &strictness,
            |b, &strictness| {
                let limiter = parked_limiter(strictness);
                b.iter(|| black_box(limiter.acquire_nanos(10)));
            },
        );
    }

    group.finish();
}

/// Benchmark different memory orderings
fn bench_memory_orderings(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_orderings");

    let orderings = [
        ("Relaxed", MemoryOrdering::Relaxed),
        ("AcquireRelease", MemoryOrdering::AcquireRelease),
        ("Sequential", MemoryOrdering::Sequential),
    ];

    for (name, ordering) in orderings {
        group.bench_function(name, |b| {
            let config = RateLimiterConfig::new(max_rate_spec()).with_ordering(ordering);
            let limiter = RateLimiter::with_config(config, VirtualClock::new(i64::MAX / 2)).unwrap();
            limiter.start();

            b.iter(|| black_box(limiter.acquire()));
        });
    }

    group.finish();
}

/// Benchmark concurrent acquisition
fn bench_concurrent_acquire(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_acquire");

    for num_threads in [2, 4, 8, 16] {
        group.throughput(Throughput::Elements(num_threads as u64 * 1000));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_threads", num_threads)),
            &num_threads,
            |b, &num_threads| {
                let limiter = Arc::new(RateLimiter::new(&max_rate_spec(), None).unwrap());
                limiter.start();

                b.iter_custom(|iters| {
                    let mut total_duration = Duration::ZERO;

                    for _ in 0..iters {
                        let start = Instant::now();

                        let handles: Vec<_> = (0..num_threads)
                            .map(|_| {
                                let limiter = limiter.clone();
                                thread::spawn(move || {
                                    for _ in 0..1000 {
                                        limiter.acquire();
                                    }
                                })
                            })
                            .collect();

                        for handle in handles {
                            handle.join().unwrap();
                        }

                        total_duration += start.elapsed();
                    }

                    total_duration
                });
            },
        );
    }

    group.finish();
}

/// Benchmark high contention scenarios
fn bench_high_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("high_contention");

    group.bench_function("high_contention_32_threads", |b| {
        let limiter = Arc::new(parked_limiter(0.5));

        b.iter_custom(|iters| {
            let mut total_duration = Duration::ZERO;

            for _ in 0..iters {
                let start = Instant::now();

                let handles: Vec<_> = (0..32)
                    .map(|_| {
                        let limiter = limiter.clone();
                        thread::spawn(move || {
                            for _ in 0..100 {
                                limiter.acquire_nanos(5);
                            }
                        })
                    })
                    .collect();

                for handle in handles {
                    handle.join().unwrap();
                }

                total_duration += start.elapsed();
            }

            total_duration
        });
    });

    group.finish();
}

/// Benchmark reconfiguration
fn bench_reconfigure(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconfigure");

    group.bench_function("set_rate", |b| {
        let limiter = parked_limiter(1.0);
        let mut fast = true;
        b.iter(|| {
            let rate = if fast { 1e6 } else { 2e6 };
            fast = !fast;
            black_box(limiter.set_rate(rate))
        });
    });

    group.bench_function("set_strictness", |b| {
        let limiter = parked_limiter(1.0);
        b.iter(|| black_box(limiter.set_strictness(black_box(0.5))));
    });

    group.bench_function("update_unchanged", |b| {
        let limiter = parked_limiter(1.0);
        let spec = limiter.spec();
        b.iter(|| black_box(limiter.update(&spec)));
    });

    group.finish();
}

/// Benchmark delay and metrics reads
fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics");

    let limiter = parked_limiter(1.0);
    for _ in 0..1000 {
        limiter.acquire();
    }

    group.bench_function("current_delay", |b| {
        b.iter(|| black_box(limiter.current_scheduling_delay_ns()));
    });

    group.bench_function("cumulative_delay", |b| {
        b.iter(|| black_box(limiter.cumulative_scheduling_delay_ns()));
    });

    group.bench_function("get_metrics", |b| {
        b.iter(|| black_box(limiter.metrics()));
    });

    group.bench_function("summary", |b| {
        b.iter(|| black_box(limiter.summary()));
    });

    group.finish();
}

/// Benchmark registry lookups and updates
fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");

    let registry = RateLimiterRegistry::with_clock(VirtualClock::new(0));
    let spec: RateSpec = "1000".parse().unwrap();
    for i in 0..100 {
        registry.create_or_update(&format!("activity-{}", i), &spec).unwrap();
    }

    group.bench_function("get_existing", |b| {
        b.iter(|| black_box(registry.get("activity-42")));
    });

    group.bench_function("create_or_update_existing", |b| {
        b.iter(|| black_box(registry.create_or_update("activity-42", &spec)));
    });

    group.bench_function("delay_gauges_100", |b| {
        b.iter(|| black_box(registry.delay_gauges()));
    });

    group.finish();
}

/// Benchmark concurrent registry access
fn bench_registry_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_concurrent");

    for num_threads in [2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_threads", num_threads)),
            &num_threads,
            |b, &num_threads| {
                let registry = Arc::new(RateLimiterRegistry::with_clock(VirtualClock::new(
                    i64::MAX / 2,
                )));
                let spec = max_rate_spec();

                b.iter_custom(|iters| {
                    let mut total_duration = Duration::ZERO;

                    for _ in 0..iters {
                        let start = Instant::now();

                        let handles: Vec<_> = (0..num_threads)
                            .map(|thread_id| {
                                let registry = registry.clone();
                                thread::spawn(move || {
                                    let name = format!("worker-{}", thread_id % 2);
                                    for _ in 0..100 {
                                        if let Ok(limiter) = registry.create_or_update(&name, &spec) {
                                            limiter.acquire();
                                        }
                                    }
                                })
                            })
                            .collect();

                        for handle in handles {
                            handle.join().unwrap();
                        }

                        total_duration += start.elapsed();
                    }

                    total_duration
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_acquire,
    bench_acquire_widths,
    bench_strictness,
    bench_memory_orderings,
    bench_concurrent_acquire,
    bench_high_contention,
    bench_reconfigure,
    bench_metrics,
    bench_registry,
    bench_registry_concurrent,
);

criterion_main!(benches);
