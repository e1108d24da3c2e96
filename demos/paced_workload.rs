//! Paced workload example for the pacer crate.
//!
//! Run with: `RUST_LOG=debug cargo run --example paced_workload`

use pacer::{RateLimiter, RateLimiterBuilder, RateLimiterRegistry, RateSpec, VirtualClock};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn main() -> pacer::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    println!("=== Paced Workload Example ===\n");

    // Example 1: Multi-threaded pacing
    threaded_example()?;

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 2: Live rate change
    rate_change_example()?;

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 3: Strictness and lag
    strictness_example()?;

    println!("{}", "\n".to_owned() + "=".repeat(50).as_str() + "\n");

    // Example 4: Registry with background reporting
    registry_example()?;

    Ok(())
}

fn run_workers(limiter: &Arc<RateLimiter>, threads: usize, ops_per_thread: usize) -> Duration {
    let start = Instant::now();
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let limiter = limiter.clone();
            thread::spawn(move || {
                for _ in 0..ops_per_thread {
                    limiter.acquire();
                }
            })
        })
        .collect();

    for handle in handles {
        let _ = handle.join();
    }
    start.elapsed()
}

fn threaded_example() -> pacer::Result<()> {
    println!("1. Multi-threaded Pacing:");

    let spec: RateSpec = "500".parse()?;
    let limiter = Arc::new(RateLimiter::new(&spec, None)?);
    limiter.start();

    let elapsed = run_workers(&limiter, 4, 50);
    println!(
        "   200 ops at 500 ops/s across 4 threads took {:.0}ms (ideal ~400ms)",
        elapsed.as_secs_f64() * 1000.0
    );
    println!("   {}", limiter.summary());
    Ok(())
}

fn rate_change_example() -> pacer::Result<()> {
    println!("2. Live Rate Change:");

    let limiter = Arc::new(RateLimiterBuilder::new().rate(200.0).build()?);
    limiter.start();

    let elapsed = run_workers(&limiter, 2, 20);
    println!("   40 ops at 200 ops/s: {:.0}ms", elapsed.as_secs_f64() * 1000.0);

    limiter.set_rate(2000.0)?;
    let elapsed = run_workers(&limiter, 2, 200);
    println!("   400 ops at 2000 ops/s: {:.0}ms", elapsed.as_secs_f64() * 1000.0);

    println!(
        "   Cumulative delay after rate change: {}ns",
        limiter.cumulative_scheduling_delay_ns()
    );
    Ok(())
}

fn strictness_example() -> pacer::Result<()> {
    println!("3. Strictness and Lag (virtual clock):");

    for strictness in [1.0, 0.5, 0.0] {
        let clock = VirtualClock::new(0);
        let limiter = RateLimiterBuilder::new()
            .rate(1000.0)
            .strictness(strictness)
            .build_with_clock(clock.clone())?;
        limiter.start();

        // Workers stall for 50ms, then resume
        clock.advance(50_000_000);
        let overruns: Vec<i64> = (0..5).map(|_| limiter.acquire()).collect();

        println!(
            "   strictness {:.1} (shift {:>2}): overruns {:?}, delay now {}ns",
            strictness,
            limiter.compensation_shift(),
            overruns,
            limiter.current_scheduling_delay_ns()
        );
    }
    Ok(())
}

fn registry_example() -> pacer::Result<()> {
    println!("4. Registry with Background Reporting:");

    let registry = Arc::new(RateLimiterRegistry::new());
    let reads = registry.create_or_update("reads", &"1000".parse::<RateSpec>()?)?;
    let writes = registry.create_or_update("writes", &"100,1.2".parse::<RateSpec>()?)?;
    reads.start();
    writes.start();

    let (handle, stop_tx) = registry
        .clone()
        .start_delay_reporter(Duration::from_millis(50))
        .map_err(|e| {
            eprintln!("   Could not start reporter: {}", e);
            e
        })
        .ok()
        .unzip();

    for _ in 0..100 {
        reads.acquire();
    }
    for _ in 0..10 {
        writes.acquire();
    }

    // Reconfigure in place
    registry.create_or_update("reads", &"4000".parse::<RateSpec>()?)?;

    for gauge in registry.delay_gauges() {
        println!("   {} cumulative delay: {}ns", gauge.name, gauge.cumulative_delay_ns);
    }
    println!("\n{}", registry.stats());

    if let (Some(handle), Some(stop_tx)) = (handle, stop_tx) {
        let _ = stop_tx.send(());
        let _ = handle.join();
    }
    Ok(())
}
