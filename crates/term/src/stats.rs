// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide ingestion counters.
//!
//! Everything here is lock-free so the hot paths can record without
//! contention; `snapshot` produces a serializable copy for logging and the
//! shutdown summary.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::message::MessageKind;

#[derive(Debug, Default)]
pub struct Stats {
    pub bytes_in: AtomicU64,
    pub bytes_skipped_zero: AtomicU64,
    pub cog_messages: AtomicU64,
    pub backtick_messages: AtomicU64,
    pub debugger_packets: AtomicU64,
    pub terminal_messages: AtomicU64,
    pub overflow_count: AtomicU64,
    pub pool_exhaustion_count: AtomicU64,
    pub dropped_messages: AtomicU64,
    pub destinations_lost: AtomicU64,
    pub responses_sent: AtomicU64,
    pub responses_queued: AtomicU64,
    pub resets_accepted: AtomicU64,
    pub resets_coalesced: AtomicU64,
    /// Router velocity EWMA in millimessages/s (×1000 to stay integral).
    velocity_milli: AtomicU64,
    current_pacer_ms: AtomicU64,
}

/// Point-in-time copy of [`Stats`], shaped for structured logging.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub bytes_in: u64,
    pub bytes_skipped_zero: u64,
    pub cog_messages: u64,
    pub backtick_messages: u64,
    pub debugger_packets: u64,
    pub terminal_messages: u64,
    pub overflow_count: u64,
    pub pool_exhaustion_count: u64,
    pub dropped_messages: u64,
    pub destinations_lost: u64,
    pub responses_sent: u64,
    pub responses_queued: u64,
    pub resets_accepted: u64,
    pub resets_coalesced: u64,
    pub velocity: f64,
    pub current_pacer_ms: u64,
}

impl Stats {
    pub fn record_emitted(&self, kind: MessageKind) {
        let counter = match kind {
            MessageKind::Cog => &self.cog_messages,
            MessageKind::Backtick => &self.backtick_messages,
            MessageKind::Debugger => &self.debugger_packets,
            MessageKind::Terminal | MessageKind::Unknown => &self.terminal_messages,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_emitted(&self) -> u64 {
        self.cog_messages.load(Ordering::Relaxed)
            + self.backtick_messages.load(Ordering::Relaxed)
            + self.debugger_packets.load(Ordering::Relaxed)
            + self.terminal_messages.load(Ordering::Relaxed)
    }

    pub fn set_velocity(&self, messages_per_sec: f64) {
        let milli = (messages_per_sec.max(0.0) * 1000.0) as u64;
        self.velocity_milli.store(milli, Ordering::Relaxed);
    }

    pub fn velocity(&self) -> f64 {
        self.velocity_milli.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn set_pacer_ms(&self, ms: u64) {
        self.current_pacer_ms.store(ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_skipped_zero: self.bytes_skipped_zero.load(Ordering::Relaxed),
            cog_messages: self.cog_messages.load(Ordering::Relaxed),
            backtick_messages: self.backtick_messages.load(Ordering::Relaxed),
            debugger_packets: self.debugger_packets.load(Ordering::Relaxed),
            terminal_messages: self.terminal_messages.load(Ordering::Relaxed),
            overflow_count: self.overflow_count.load(Ordering::Relaxed),
            pool_exhaustion_count: self.pool_exhaustion_count.load(Ordering::Relaxed),
            dropped_messages: self.dropped_messages.load(Ordering::Relaxed),
            destinations_lost: self.destinations_lost.load(Ordering::Relaxed),
            responses_sent: self.responses_sent.load(Ordering::Relaxed),
            responses_queued: self.responses_queued.load(Ordering::Relaxed),
            resets_accepted: self.resets_accepted.load(Ordering::Relaxed),
            resets_coalesced: self.resets_coalesced.load(Ordering::Relaxed),
            velocity: self.velocity(),
            current_pacer_ms: self.current_pacer_ms.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
