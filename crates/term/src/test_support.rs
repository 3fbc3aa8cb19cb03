// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: byte constructors, ingest harness, and a
//! collecting destination.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::dest::{DestKind, DestQueue, Destination, DEFAULT_QUEUE_CAPACITY};
use crate::extract::Extractor;
use crate::message::{strip_eol, Message, MessageKind, Metadata, PACKET_LEN};
use crate::pattern::{BacktickRecognizer, PacketPolicy, Recognizer, Registry, Scan};
use crate::pool::PooledMessage;
use crate::ring::{ring, RingProducer};
use crate::stats::Stats;

/// A syntactically valid debugger packet: duplicated LE cog id, a non-zero
/// discriminator in bytes 8..20, and `fill` in the body.
pub fn packet_bytes(cog_id: u32, fill: u8) -> Vec<u8> {
    let mut out = vec![0u8; PACKET_LEN];
    out[0..4].copy_from_slice(&cog_id.to_le_bytes());
    out[4..8].copy_from_slice(&cog_id.to_le_bytes());
    for b in &mut out[8..20] {
        *b = 0x5A;
    }
    for b in &mut out[20..] {
        *b = fill;
    }
    out
}

pub fn text_message(text: &str) -> Message {
    Message {
        kind: MessageKind::Terminal,
        payload: Bytes::copy_from_slice(text.as_bytes()),
        timestamp_us: 0,
        meta: Metadata::None,
    }
}

pub fn cog_message(cog: u8, line: &str) -> Message {
    Message {
        kind: MessageKind::Cog,
        payload: Bytes::copy_from_slice(line.as_bytes()),
        timestamp_us: 0,
        meta: Metadata::Cog { cog },
    }
}

pub fn debugger_message(cog_id: u32) -> Message {
    Message {
        kind: MessageKind::Debugger,
        payload: Bytes::from(packet_bytes(cog_id, 0xAA)),
        timestamp_us: 0,
        meta: Metadata::Debugger { cog_id },
    }
}

/// Build a backtick message the way the extractor would, metadata included.
pub fn backtick_message(line: &str) -> Message {
    let fallback = Metadata::Backtick { directive: String::new(), target: None };
    let meta = BacktickRecognizer::new()
        .ok()
        .and_then(|rec| match rec.validate(line.as_bytes()) {
            Scan::Complete(frame) => Some(frame.meta),
            _ => None,
        })
        .unwrap_or(fallback);
    Message {
        kind: MessageKind::Backtick,
        payload: Bytes::copy_from_slice(strip_eol(line.as_bytes())),
        timestamp_us: 0,
        meta,
    }
}

/// Ring producer + extractor wired with the standard registry.
pub struct IngestHarness {
    pub producer: RingProducer,
    pub extractor: Extractor,
    pub stats: Arc<Stats>,
}

pub fn ingest_harness() -> IngestHarness {
    ingest_harness_with(64 * 1024, 256)
}

pub fn ingest_harness_with(capacity: usize, zero_skip_cap: usize) -> IngestHarness {
    let (producer, consumer) = ring(capacity);
    let stats = Arc::new(Stats::default());
    #[allow(clippy::expect_used)]
    let registry =
        Registry::standard(PacketPolicy::default()).expect("standard registry construction");
    let extractor = Extractor::new(consumer, registry, zero_skip_cap, Arc::clone(&stats));
    IngestHarness { producer, extractor, stats }
}

/// In-memory destination that records everything delivered to it.
pub struct CollectingDest {
    id: String,
    kind: DestKind,
    is_immediate: bool,
    queue: DestQueue,
    received: Mutex<Vec<Message>>,
    flushes: AtomicU64,
    drains: AtomicU64,
}

impl CollectingDest {
    pub fn new(id: &str, kind: DestKind) -> Self {
        Self {
            id: id.to_owned(),
            kind,
            is_immediate: false,
            queue: DestQueue::new(DEFAULT_QUEUE_CAPACITY, usize::MAX),
            received: Mutex::new(Vec::new()),
            flushes: AtomicU64::new(0),
            drains: AtomicU64::new(0),
        }
    }

    pub fn immediate(mut self, on: bool) -> Self {
        self.is_immediate = on;
        self
    }

    pub fn received(&self) -> Vec<Message> {
        self.received.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    pub fn drains(&self) -> u64 {
        self.drains.load(Ordering::Relaxed)
    }

    fn collect(&self) {
        let mut received = self.received.lock().unwrap_or_else(PoisonError::into_inner);
        for record in self.queue.drain_now() {
            if let Some(message) = record.message() {
                received.push(message);
            }
        }
    }
}

impl Destination for CollectingDest {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> DestKind {
        self.kind
    }

    fn immediate(&self) -> bool {
        self.is_immediate
    }

    fn enqueue(&self, record: PooledMessage) {
        self.queue.push(record);
        if self.is_immediate {
            self.collect();
        }
    }

    fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.collect();
    }

    fn drain(&self, ack: &mpsc::Sender<String>) {
        self.drains.fetch_add(1, Ordering::Relaxed);
        self.collect();
        let _ = ack.try_send(self.id.clone());
    }
}
