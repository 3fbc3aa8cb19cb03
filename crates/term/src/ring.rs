// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-capacity single-producer/single-consumer byte ring between the
//! serial reader and the extractor.
//!
//! The producer half is handed to the link task; the consumer half is owned
//! by the processor. Cursors are monotonic byte totals (write `W`, read `R`)
//! so `W - R` is always the buffered count. The producer only advances `W`,
//! the consumer only advances `R`; no locks are taken on either path.
//!
//! An incoming span that does not fit is dropped whole — already-buffered
//! bytes are never overwritten. Overflows are counted and surfaced through a
//! warning rate-limited to one per second.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::warn;

/// Recoverable producer-side error: the incoming span was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overflow {
    pub dropped: usize,
}

struct Shared {
    buf: Box<[AtomicU8]>,
    capacity: usize,
    /// Total bytes ever written (monotonic).
    write: AtomicU64,
    /// Total bytes ever consumed (monotonic).
    read: AtomicU64,
    overflow_count: AtomicU64,
    overflow_bytes: AtomicU64,
    /// Milliseconds since `epoch` of the last overflow warning (0 = never).
    last_warn_ms: AtomicU64,
    epoch: Instant,
}

/// Create a ring of the given capacity, split into its two endpoint handles.
pub fn ring(capacity: usize) -> (RingProducer, RingConsumer) {
    let mut buf = Vec::with_capacity(capacity);
    buf.resize_with(capacity, || AtomicU8::new(0));
    let shared = Arc::new(Shared {
        buf: buf.into_boxed_slice(),
        capacity,
        write: AtomicU64::new(0),
        read: AtomicU64::new(0),
        overflow_count: AtomicU64::new(0),
        overflow_bytes: AtomicU64::new(0),
        last_warn_ms: AtomicU64::new(0),
        epoch: Instant::now(),
    });
    (RingProducer { shared: Arc::clone(&shared) }, RingConsumer { shared, scratch: Vec::new() })
}

/// Write half. Held by the link task; `push` never blocks and never waits.
pub struct RingProducer {
    shared: Arc<Shared>,
}

impl RingProducer {
    /// Append a span. On overflow the whole span is dropped and counted.
    pub fn push(&self, span: &[u8]) -> Result<(), Overflow> {
        let s = &self.shared;
        let r = s.read.load(Ordering::Acquire);
        let w = s.write.load(Ordering::Relaxed);
        let used = (w - r) as usize;
        if span.len() > s.capacity - used {
            s.overflow_count.fetch_add(1, Ordering::Relaxed);
            s.overflow_bytes.fetch_add(span.len() as u64, Ordering::Relaxed);
            s.warn_overflow(span.len());
            return Err(Overflow { dropped: span.len() });
        }
        let base = w as usize;
        for (i, &b) in span.iter().enumerate() {
            s.buf[(base + i) % s.capacity].store(b, Ordering::Relaxed);
        }
        // Publish the bytes before the new cursor becomes visible.
        s.write.store(w + span.len() as u64, Ordering::Release);
        Ok(())
    }

    /// Total bytes ever pushed through this ring.
    pub fn total_written(&self) -> u64 {
        self.shared.write.load(Ordering::Relaxed)
    }

    pub fn overflow_count(&self) -> u64 {
        self.shared.overflow_count.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RingProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingProducer")
            .field("capacity", &self.shared.capacity)
            .field("write", &self.shared.write.load(Ordering::Relaxed))
            .finish()
    }
}

/// Read half. Owned by the processor; `peek` exposes a linearized view so
/// the extractor never has to reason about wrap-around.
pub struct RingConsumer {
    shared: Arc<Shared>,
    scratch: Vec<u8>,
}

impl RingConsumer {
    /// Bytes currently buffered.
    pub fn available(&self) -> usize {
        let w = self.shared.write.load(Ordering::Acquire);
        let r = self.shared.read.load(Ordering::Relaxed);
        (w - r) as usize
    }

    /// Contiguous view of up to `n` buffered bytes without consuming them.
    ///
    /// The view is copied through an internal scratch buffer, so a frame
    /// that wraps the ring edge still reads as one logical sequence.
    pub fn peek(&mut self, n: usize) -> &[u8] {
        let s = &self.shared;
        let w = s.write.load(Ordering::Acquire);
        let r = s.read.load(Ordering::Relaxed);
        let take = n.min((w - r) as usize);
        self.scratch.clear();
        self.scratch.reserve(take);
        let base = r as usize;
        for i in 0..take {
            self.scratch.push(s.buf[(base + i) % s.capacity].load(Ordering::Relaxed));
        }
        &self.scratch
    }

    /// Consume `n` bytes (clamped to what is buffered).
    pub fn advance(&mut self, n: usize) {
        let take = n.min(self.available());
        self.shared.read.fetch_add(take as u64, Ordering::Release);
    }

    /// Consume leading bytes while `pred` holds, up to `max`. Returns the
    /// number skipped.
    pub fn skip_while(&mut self, pred: impl Fn(u8) -> bool, max: usize) -> usize {
        let s = &self.shared;
        let w = s.write.load(Ordering::Acquire);
        let r = s.read.load(Ordering::Relaxed);
        let limit = max.min((w - r) as usize);
        let base = r as usize;
        let mut count = 0;
        while count < limit {
            let b = s.buf[(base + count) % s.capacity].load(Ordering::Relaxed);
            if !pred(b) {
                break;
            }
            count += 1;
        }
        s.read.fetch_add(count as u64, Ordering::Release);
        count
    }

    /// Total bytes ever pushed by the producer.
    pub fn total_written(&self) -> u64 {
        self.shared.write.load(Ordering::Acquire)
    }

    /// Total bytes ever consumed.
    pub fn total_consumed(&self) -> u64 {
        self.shared.read.load(Ordering::Relaxed)
    }

    pub fn overflow_count(&self) -> u64 {
        self.shared.overflow_count.load(Ordering::Relaxed)
    }

    pub fn overflow_bytes(&self) -> u64 {
        self.shared.overflow_bytes.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RingConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingConsumer")
            .field("capacity", &self.shared.capacity)
            .field("read", &self.shared.read.load(Ordering::Relaxed))
            .field("write", &self.shared.write.load(Ordering::Relaxed))
            .finish()
    }
}

impl Shared {
    /// Warn about an overflow at most once per second.
    fn warn_overflow(&self, dropped: usize) {
        let now_ms = (self.epoch.elapsed().as_millis() as u64).max(1);
        let last = self.last_warn_ms.load(Ordering::Relaxed);
        if last != 0 && now_ms.saturating_sub(last) < 1000 {
            return;
        }
        if self
            .last_warn_ms
            .compare_exchange(last, now_ms, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            warn!(
                dropped,
                capacity = self.capacity,
                overflows = self.overflow_count.load(Ordering::Relaxed),
                "ring overflow, dropping incoming span"
            );
        }
    }
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;
