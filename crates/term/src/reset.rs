// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DTR reset sequencing.
//!
//! A rising DTR edge starts exactly one reset sequence: extractor and
//! arbiter state clear, destinations drain, the log rotates, then ingestion
//! resumes. Edge bursts inside the coalesce window collapse into the
//! current sequence; an edge that lands after the window while a sequence
//! is still in flight is parked and replayed once the sequence finishes.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::event::DtrEdge;
use crate::stats::Stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetPhase {
    Idle,
    /// Sequence accepted; waiting for destination drain.
    ResetDetected,
    /// Drained; waiting for the log rotation acknowledgement.
    Rotating,
}

/// Outcome of a DTR edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetDisposition {
    /// A new sequence begins; the caller runs the drain/rotate steps.
    Accepted { seq: u64 },
    /// Absorbed into the current sequence.
    Coalesced { seq: u64 },
    /// Outside the coalesce window but a sequence is still running; will
    /// replay when it completes.
    Parked { seq: u64 },
    /// Falling edge: recorded, nothing triggered.
    Recorded,
}

pub struct ResetManager {
    phase: ResetPhase,
    seq: u64,
    last_accepted_at: Option<Instant>,
    last_low_at: Option<Instant>,
    parked: bool,
    coalesce_window: Duration,
    drain_timeout: Duration,
    stats: Arc<Stats>,
}

impl ResetManager {
    pub fn new(coalesce_window: Duration, drain_timeout: Duration, stats: Arc<Stats>) -> Self {
        Self {
            phase: ResetPhase::Idle,
            seq: 0,
            last_accepted_at: None,
            last_low_at: None,
            parked: false,
            coalesce_window,
            drain_timeout,
            stats,
        }
    }

    /// Feed one DTR edge.
    pub fn request(&mut self, edge: DtrEdge, now: Instant) -> ResetDisposition {
        match edge {
            DtrEdge::Low => {
                self.last_low_at = Some(now);
                ResetDisposition::Recorded
            }
            DtrEdge::High => {
                if let Some(accepted_at) = self.last_accepted_at {
                    if now.duration_since(accepted_at) < self.coalesce_window {
                        self.stats.resets_coalesced.fetch_add(1, Ordering::Relaxed);
                        return ResetDisposition::Coalesced { seq: self.seq };
                    }
                }
                if self.phase != ResetPhase::Idle {
                    self.parked = true;
                    return ResetDisposition::Parked { seq: self.seq };
                }
                self.seq += 1;
                self.phase = ResetPhase::ResetDetected;
                self.last_accepted_at = Some(now);
                self.stats.resets_accepted.fetch_add(1, Ordering::Relaxed);
                ResetDisposition::Accepted { seq: self.seq }
            }
        }
    }

    /// All destinations acknowledged (or the drain timed out).
    pub fn drain_complete(&mut self) {
        if self.phase == ResetPhase::ResetDetected {
            self.phase = ResetPhase::Rotating;
        }
    }

    /// The logger finished rotating; the sequence is over.
    pub fn rotate_ack(&mut self) {
        if self.phase == ResetPhase::Rotating {
            self.phase = ResetPhase::Idle;
        }
    }

    /// A parked edge, if one arrived while a sequence was in flight.
    pub fn take_parked(&mut self) -> bool {
        std::mem::take(&mut self.parked)
    }

    pub fn phase(&self) -> ResetPhase {
        self.phase
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    pub fn last_low_at(&self) -> Option<Instant> {
        self.last_low_at
    }
}

impl std::fmt::Debug for ResetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetManager")
            .field("phase", &self.phase)
            .field("seq", &self.seq)
            .field("parked", &self.parked)
            .finish()
    }
}

#[cfg(test)]
#[path = "reset_tests.rs"]
mod tests;
