// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-response arbiter.
//!
//! Every debugger packet leaves its cog blocked on an inter-core lock until
//! the host transmits a 52-byte all-zero acknowledgement; without it the
//! remaining cogs can never take the lock and go silent. The arbiter sends
//! one reply per packet, debounced so a burst of packets does not saturate
//! the transmit side: replies inside the debounce gap queue (bounded) and
//! flush together once the gap has passed.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::warn;

use crate::event::PacketSignal;
use crate::message::RESPONSE_LEN;
use crate::stats::Stats;

/// The fixed acknowledgement payload.
pub static RESPONSE: [u8; RESPONSE_LEN] = [0u8; RESPONSE_LEN];

/// Replies that may wait out a debounce gap before the queue drops.
pub const RESPONSE_QUEUE_LIMIT: usize = 8;

pub struct ResponseArbiter {
    debounce: Duration,
    window: Duration,
    last_response_at: Option<Instant>,
    queued: usize,
    stats: Arc<Stats>,
}

impl ResponseArbiter {
    pub fn new(debounce: Duration, window: Duration, stats: Arc<Stats>) -> Self {
        Self { debounce, window, last_response_at: None, queued: 0, stats }
    }

    /// The wire bytes of one acknowledgement.
    pub fn reply_bytes() -> Bytes {
        Bytes::from_static(&RESPONSE)
    }

    /// Handle a packet signal. Returns the reply to transmit now, or `None`
    /// when it was queued behind the debounce gap.
    pub fn on_packet(&mut self, signal: &PacketSignal, now: Instant) -> Option<Bytes> {
        let gap_open = self
            .last_response_at
            .is_none_or(|last| now.duration_since(last) >= self.debounce);

        if gap_open && self.queued == 0 {
            self.note_sent(1, now);
            let waited = now.duration_since(signal.arrived);
            if waited > self.window {
                // Advisory: the P2 accepts late replies, but flag the stall.
                warn!(cog_id = signal.cog_id, waited_ms = waited.as_millis() as u64,
                    "debugger response exceeded its window");
            }
            return Some(Self::reply_bytes());
        }

        if self.queued < RESPONSE_QUEUE_LIMIT {
            self.queued += 1;
            self.stats.responses_queued.fetch_add(1, Ordering::Relaxed);
        } else {
            warn!(cog_id = signal.cog_id, "response queue full; dropping reply");
        }
        None
    }

    /// Instant at which queued replies become sendable.
    pub fn next_flush_at(&self) -> Option<Instant> {
        if self.queued == 0 {
            return None;
        }
        Some(self.last_response_at.map_or_else(Instant::now, |last| last + self.debounce))
    }

    /// Drain queued replies once the debounce gap has passed.
    pub fn flush(&mut self, now: Instant) -> Vec<Bytes> {
        if self.queued == 0 {
            return Vec::new();
        }
        let gap_open = self
            .last_response_at
            .is_none_or(|last| now.duration_since(last) >= self.debounce);
        if !gap_open {
            return Vec::new();
        }
        let n = self.queued;
        self.queued = 0;
        self.note_sent(n as u64, now);
        (0..n).map(|_| Self::reply_bytes()).collect()
    }

    /// DTR reset: drop queued replies and forget the debounce history.
    pub fn reset(&mut self) {
        self.queued = 0;
        self.last_response_at = None;
    }

    pub fn queued(&self) -> usize {
        self.queued
    }

    fn note_sent(&mut self, n: u64, now: Instant) {
        self.last_response_at = Some(now);
        self.stats.responses_sent.fetch_add(n, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for ResponseArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseArbiter")
            .field("queued", &self.queued)
            .field("debounce", &self.debounce)
            .finish()
    }
}

#[cfg(test)]
#[path = "respond_tests.rs"]
mod tests;
