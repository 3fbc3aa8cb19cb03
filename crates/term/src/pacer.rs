// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adaptive pacing for the router tick.
//!
//! The processor samples once per second: message velocity (EWMA over the
//! dispatch count) and the worst per-tick processing time pick one of three
//! periods. Two consecutive out-of-band samples are required before the
//! period actually moves, so a single bursty second does not thrash the
//! timer.

use std::time::Duration;

/// EWMA weight for the newest velocity sample.
const ALPHA: f64 = 0.3;

/// Per-tick processing time above this forces the fast band.
const BUSY_PROCESSING: Duration = Duration::from_millis(10);

/// Velocity thresholds for the fast and mid bands, in messages/s.
const FAST_VELOCITY: f64 = 40.0;
const MID_VELOCITY: f64 = 10.0;

/// Band index into the period table: 0 = fast, 1 = mid, 2 = slow.
type Band = usize;

#[derive(Debug)]
pub struct AdaptivePacer {
    periods: [Duration; 3],
    current: Band,
    velocity: f64,
    pending: Option<Band>,
    pending_samples: u8,
}

impl AdaptivePacer {
    pub fn new(periods: [Duration; 3]) -> Self {
        // Start slow; traffic will pull the period down within two samples.
        Self { periods, current: 2, velocity: 0.0, pending: None, pending_samples: 0 }
    }

    pub fn current_period(&self) -> Duration {
        self.periods[self.current]
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Feed one sampling window. Returns the new period when it changed.
    pub fn sample(&mut self, dispatched: u64, max_processing: Duration) -> Option<Duration> {
        self.velocity = ALPHA * (dispatched as f64) + (1.0 - ALPHA) * self.velocity;

        let target = if self.velocity >= FAST_VELOCITY || max_processing > BUSY_PROCESSING {
            0
        } else if self.velocity >= MID_VELOCITY {
            1
        } else {
            2
        };

        if target == self.current {
            self.pending = None;
            self.pending_samples = 0;
            return None;
        }

        if self.pending == Some(target) {
            self.pending_samples += 1;
        } else {
            self.pending = Some(target);
            self.pending_samples = 1;
        }

        if self.pending_samples >= 2 {
            self.current = target;
            self.pending = None;
            self.pending_samples = 0;
            Some(self.current_period())
        } else {
            None
        }
    }
}

#[cfg(test)]
#[path = "pacer_tests.rs"]
mod tests;
