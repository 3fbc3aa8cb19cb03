// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message extractor: drives the recognizer registry over the ring buffer
//! and emits typed messages.
//!
//! Scan protocol per position, in registry priority order:
//! - prefilter miss → next recognizer;
//! - `Complete` → emit the frame and consume exactly its length;
//! - `Incomplete` → stop the whole scan (the highest-priority candidate is
//!   still growing, and the fallback must not eat its opening bytes);
//! - `Invalid` → next recognizer; if every recognizer rejects, consume one
//!   byte and rescan.
//!
//! After a debugger packet the device/driver pads the idle line with zeros;
//! a bounded zero filter swallows that run so it is never re-scanned as a
//! phantom frame.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;

use crate::message::{strip_eol, Message, MessageKind};
use crate::pattern::{Frame, Registry, Scan, SCAN_WINDOW};
use crate::ring::RingConsumer;
use crate::stats::Stats;

pub struct Extractor {
    consumer: RingConsumer,
    registry: Registry,
    zero_skip_cap: usize,
    just_processed_packet: bool,
    epoch: Instant,
    stats: Arc<Stats>,
}

enum Step {
    Emit(Frame),
    Wait,
    Skip,
}

impl Extractor {
    pub fn new(
        consumer: RingConsumer,
        registry: Registry,
        zero_skip_cap: usize,
        stats: Arc<Stats>,
    ) -> Self {
        Self {
            consumer,
            registry,
            zero_skip_cap,
            just_processed_packet: false,
            epoch: Instant::now(),
            stats,
        }
    }

    /// Extract every complete message currently in the ring.
    pub fn poll(&mut self) -> Vec<Message> {
        let mut out = Vec::new();
        loop {
            if self.just_processed_packet {
                let skipped = self.consumer.skip_while(|b| b == 0, self.zero_skip_cap);
                if skipped > 0 {
                    self.stats
                        .bytes_skipped_zero
                        .fetch_add(skipped as u64, std::sync::atomic::Ordering::Relaxed);
                }
                self.just_processed_packet = false;
            }

            let step = {
                let window = self.consumer.peek(SCAN_WINDOW);
                if window.is_empty() {
                    break;
                }
                Self::scan(&self.registry, window)
            };

            match step {
                Step::Emit(frame) => {
                    let message = self.take_frame(&frame);
                    self.stats.record_emitted(message.kind);
                    if message.kind == MessageKind::Debugger {
                        self.just_processed_packet = true;
                    }
                    out.push(message);
                }
                Step::Wait => break,
                Step::Skip => self.consumer.advance(1),
            }
        }
        out
    }

    /// Drop any buffered partial frame and forget packet state. Called on a
    /// device reset, after which the stream restarts from scratch.
    pub fn clear(&mut self) {
        let pending = self.consumer.available();
        self.consumer.advance(pending);
        self.just_processed_packet = false;
    }

    pub fn just_processed_packet(&self) -> bool {
        self.just_processed_packet
    }

    pub fn consumer(&self) -> &RingConsumer {
        &self.consumer
    }

    fn scan(registry: &Registry, window: &[u8]) -> Step {
        let b0 = window[0];
        let b1 = window.get(1).copied().unwrap_or(0);
        for recognizer in registry.recognizers() {
            if !recognizer.can_start_at(b0, b1) {
                continue;
            }
            match recognizer.validate(window) {
                Scan::Complete(frame) => return Step::Emit(frame),
                Scan::Incomplete => return Step::Wait,
                Scan::Invalid => continue,
            }
        }
        Step::Skip
    }

    /// Copy the frame bytes out of the ring and consume them.
    fn take_frame(&mut self, frame: &Frame) -> Message {
        let payload = {
            let window = self.consumer.peek(frame.len);
            if frame.kind.is_text() {
                Bytes::copy_from_slice(strip_eol(&window[..frame.len]))
            } else {
                Bytes::copy_from_slice(&window[..frame.len])
            }
        };
        self.consumer.advance(frame.len);
        Message {
            kind: frame.kind,
            payload,
            timestamp_us: self.epoch.elapsed().as_micros() as u64,
            meta: frame.meta.clone(),
        }
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("just_processed_packet", &self.just_processed_packet)
            .field("consumer", &self.consumer)
            .finish()
    }
}

#[cfg(test)]
#[path = "extract_tests.rs"]
mod tests;
