// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const PERIODS: [Duration; 3] =
    [Duration::from_millis(2), Duration::from_millis(5), Duration::from_millis(20)];

fn pacer() -> AdaptivePacer {
    AdaptivePacer::new(PERIODS)
}

#[test]
fn starts_slow() {
    assert_eq!(pacer().current_period(), Duration::from_millis(20));
}

#[test]
fn sustained_traffic_narrows_after_two_samples() {
    let mut pacer = pacer();

    // One hot sample is not enough.
    assert_eq!(pacer.sample(200, Duration::ZERO), None);
    assert_eq!(pacer.current_period(), Duration::from_millis(20));

    // Second consecutive hot sample switches to the fast band.
    assert_eq!(pacer.sample(200, Duration::ZERO), Some(Duration::from_millis(2)));
    assert_eq!(pacer.current_period(), Duration::from_millis(2));
}

#[test]
fn brief_spike_never_reaches_fast_band() {
    let mut pacer = pacer();
    // One sample over the fast threshold starts a candidate…
    assert_eq!(pacer.sample(150, Duration::ZERO), None);
    // …but the EWMA decays below it before the confirming sample, so the
    // fast band is never entered and the pacer settles slow again.
    let mut periods = Vec::new();
    for _ in 0..16 {
        if let Some(period) = pacer.sample(0, Duration::ZERO) {
            periods.push(period);
        }
    }
    assert!(!periods.contains(&Duration::from_millis(2)));
    assert_eq!(pacer.current_period(), Duration::from_millis(20));
}

#[test]
fn heavy_processing_forces_fast_band() {
    let mut pacer = pacer();
    let slow_tick = Duration::from_millis(12);
    assert_eq!(pacer.sample(0, slow_tick), None);
    assert_eq!(pacer.sample(0, slow_tick), Some(Duration::from_millis(2)));
}

#[test]
fn mid_band_velocity() {
    let mut pacer = pacer();
    // Constant 20 msg/s settles the EWMA between 10 and 40.
    let mut changed = None;
    for _ in 0..8 {
        if let Some(period) = pacer.sample(20, Duration::ZERO) {
            changed = Some(period);
        }
    }
    assert_eq!(changed, Some(Duration::from_millis(5)));
    assert_eq!(pacer.current_period(), Duration::from_millis(5));
}

#[test]
fn velocity_is_exponentially_smoothed() {
    let mut pacer = pacer();
    let _ = pacer.sample(100, Duration::ZERO);
    assert!((pacer.velocity() - 30.0).abs() < 1e-9);
    let _ = pacer.sample(100, Duration::ZERO);
    assert!((pacer.velocity() - 51.0).abs() < 1e-9);
}

#[test]
fn decay_widens_period_with_hysteresis() {
    let mut pacer = pacer();
    // Settle into the fast band.
    let _ = pacer.sample(300, Duration::ZERO);
    let _ = pacer.sample(300, Duration::ZERO);
    assert_eq!(pacer.current_period(), Duration::from_millis(2));

    // Traffic stops; the EWMA needs a few quiet samples to fall below 10,
    // then two consecutive quiet samples to actually widen.
    let mut widened = Vec::new();
    for _ in 0..20 {
        if let Some(period) = pacer.sample(0, Duration::ZERO) {
            widened.push(period);
        }
    }
    assert_eq!(widened.last(), Some(&Duration::from_millis(20)));
}
