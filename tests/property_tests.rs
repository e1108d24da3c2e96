//! Property-based tests for the timeline rate limiter.

use pacer::{compensation_shift, Clock, RateLimiter, RateSpec, RateSpecType, VirtualClock};
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;

/// Maps arbitrary input onto a valid rate, fractional rates included.
fn rate_from(raw: u32) -> f64 {
    (raw as f64 / 7.0).clamp(0.001, 1e9)
}

fn strictness_from(raw: u16) -> f64 {
    raw as f64 / u16::MAX as f64
}

fn limiter_at(start_ns: i64, rate: f64, strictness: f64) -> (RateLimiter<VirtualClock>, VirtualClock) {
    let clock = VirtualClock::new(start_ns);
    let spec = RateSpec::new(rate).unwrap().with_strictness(strictness);
    let limiter = RateLimiter::with_clock(&spec, None, clock.clone()).unwrap();
    (limiter, clock)
}

#[quickcheck]
fn op_ticks_depend_only_on_latest_rate(first: u32, second: u32) {
    let (limiter, _clock) = limiter_at(0, rate_from(first), 1.0);
    let rate = rate_from(second);
    limiter.set_rate(rate).unwrap();

    let expected = (1e9 / rate).round() as i64;
    assert_eq!(limiter.op_ticks_ns(), expected);
    assert!(limiter.op_ticks_ns() >= 1);
}

#[quickcheck]
fn compensation_shift_is_monotonic(a: u16, b: u16) {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    let low_shift = compensation_shift(strictness_from(low));
    let high_shift = compensation_shift(strictness_from(high));

    assert!(
        low_shift >= high_shift,
        "shift({}) = {} < shift({}) = {}",
        low,
        low_shift,
        high,
        high_shift
    );
    assert!(low_shift <= 63);
}

#[quickcheck]
fn start_twice_equals_start_once(start: u32, advance: u32, carried: u32, widths: Vec<u16>) {
    let clock = VirtualClock::new(start as i64);
    let spec = RateSpec::new(1000.0).unwrap();
    let limiter = RateLimiter::with_clock(&spec, Some(carried as i64), clock.clone()).unwrap();

    limiter.start();
    for width in widths {
        limiter.reserve(width as i64);
    }
    let timeline = limiter.ticks_timeline_ns();
    let last_seen = limiter.last_seen_clock_ns();

    clock.advance(advance as i64);
    limiter.start();

    assert_eq!(limiter.ticks_timeline_ns(), timeline);
    assert_eq!(limiter.last_seen_clock_ns(), last_seen);
    assert_eq!(limiter.accumulated_delay_ns(), 0);
}

#[quickcheck]
fn reservations_are_contiguous(start: u32, widths: Vec<u16>) {
    let (limiter, _clock) = limiter_at(start as i64, 100.0, 1.0);
    limiter.start();

    let mut expected = start as i64;
    for width in widths {
        assert_eq!(limiter.reserve(width as i64), expected);
        expected += width as i64;
    }
    assert_eq!(limiter.ticks_timeline_ns(), expected);
}

#[derive(Clone, Debug)]
enum Step {
    Advance(u32),
    Acquire(u32),
    Reserve(u16),
    SetRate(u32),
    SetStrictness(u16),
}

impl Arbitrary for Step {
    fn arbitrary(g: &mut Gen) -> Self {
        match u8::arbitrary(g) % 5 {
            0 => Step::Advance(u32::arbitrary(g)),
            1 => Step::Acquire(u32::arbitrary(g)),
            2 => Step::Reserve(u16::arbitrary(g)),
            3 => Step::SetRate(u32::arbitrary(g)),
            _ => Step::SetStrictness(u16::arbitrary(g)),
        }
    }
}

#[quickcheck]
fn cumulative_is_current_plus_accumulated(steps: Vec<Step>) {
    let (limiter, clock) = limiter_at(1_000, 1000.0, 1.0);
    limiter.start();

    for step in steps {
        match step {
            Step::Advance(nanos) => {
                clock.advance(nanos as i64);
            }
            Step::Acquire(nanos) => {
                assert!(limiter.acquire_nanos(nanos as i64) >= 0);
            }
            Step::Reserve(nanos) => {
                limiter.reserve(nanos as i64);
            }
            Step::SetRate(raw) => limiter.set_rate(rate_from(raw)).unwrap(),
            Step::SetStrictness(raw) => limiter.set_strictness(strictness_from(raw)).unwrap(),
        }

        let current = limiter.current_scheduling_delay_ns();
        let accumulated = limiter.accumulated_delay_ns();
        assert!(current >= 0);
        assert!(accumulated >= 0);
        assert_eq!(limiter.cumulative_scheduling_delay_ns(), current + accumulated);
        assert_eq!(current, (clock.now_nanos() - limiter.ticks_timeline_ns()).max(0));
    }
}

#[quickcheck]
fn timeline_never_decreases_without_reconfiguration(steps: Vec<Step>) {
    let (limiter, clock) = limiter_at(0, 1000.0, 0.5);
    limiter.start();
    let mut last = limiter.ticks_timeline_ns();

    for step in steps {
        match step {
            Step::Advance(nanos) => {
                clock.advance(nanos as i64);
            }
            Step::Acquire(nanos) => {
                limiter.acquire_nanos(nanos as i64);
            }
            Step::Reserve(nanos) => {
                limiter.reserve(nanos as i64);
            }
            // Reconfiguration resets the timeline; excluded here
            Step::SetRate(_) | Step::SetStrictness(_) => continue,
        }

        let now = limiter.ticks_timeline_ns();
        assert!(now >= last, "timeline went from {} to {}", last, now);
        last = now;
    }
}

#[quickcheck]
fn rejected_strictness_changes_nothing(raw: u16, over: u16) {
    let strictness = strictness_from(raw);
    let (limiter, _clock) = limiter_at(0, 1000.0, strictness);
    let shift = limiter.compensation_shift();

    let bad = 1.0 + (over as f64 + 1.0) / 1000.0;
    assert!(limiter.set_strictness(bad).is_err());
    assert!(limiter.set_strictness(-bad).is_err());
    assert_eq!(limiter.strictness(), strictness);
    assert_eq!(limiter.compensation_shift(), shift);
}

#[quickcheck]
fn spec_text_form_is_stable(rate: u32, burst_tenths: u8, kind: u8, strictness: u16) {
    let kind = match kind % 3 {
        0 => RateSpecType::Strict,
        1 => RateSpecType::Average,
        _ => RateSpecType::Hybrid,
    };
    let spec = RateSpec::new(rate as f64 + 1.0)
        .unwrap()
        .with_burst_ratio(burst_tenths as f64 / 10.0)
        .with_strictness(strictness_from(strictness))
        .with_kind(kind);

    let parsed: RateSpec = spec.to_string().parse().unwrap();
    assert_eq!(parsed, spec);

    let json = serde_json::to_string(&spec).unwrap();
    let back: RateSpec = serde_json::from_str(&json).unwrap();
    assert_eq!(back, spec);
}

#[quickcheck]
fn any_width_keeps_timeline_monotonic(start: u32, widths: Vec<i64>) {
    let (limiter, _clock) = limiter_at(start as i64, 1000.0, 1.0);
    limiter.start();
    let mut last = limiter.ticks_timeline_ns();

    for width in widths {
        let slot = limiter.reserve(width);
        let now = limiter.ticks_timeline_ns();
        assert_eq!(slot, last);
        assert!(now >= last, "timeline went from {} to {}", last, now);
        last = now;
    }
}
