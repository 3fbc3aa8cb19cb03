// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delivery destinations and their registry.
//!
//! Destinations are addressed by stable string id; the registry only holds
//! weak handles and re-resolves on every dispatch, so windows can come and
//! go without invalidating in-flight records. Each destination owns a
//! bounded queue: immediate destinations flush on every push, the rest on
//! the flush watermark or the router tick, whichever comes first.

pub mod logger;
pub mod window;

pub use logger::{LogEntry, LoggerDest, LOGGER_ID};
pub use window::{TypedWindowDest, WindowCreatorDest, WINDOW_CREATOR_ID};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::pool::PooledMessage;

/// Messages accumulated before a non-immediate destination flushes.
pub const DEFAULT_FLUSH_WATERMARK: usize = 7;

/// Bounded per-destination queue depth.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DestKind {
    Logger,
    WindowCreator,
    TypedWindow,
}

impl DestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Logger => "logger",
            Self::WindowCreator => "window-creator",
            Self::TypedWindow => "typed-window",
        }
    }
}

/// A message sink the router can deliver to.
///
/// `enqueue` takes ownership of the pooled handle; dropping it (after the
/// sink has consumed the record) is what releases the consumer slot.
pub trait Destination: Send + Sync {
    fn id(&self) -> &str;

    fn kind(&self) -> DestKind;

    /// Immediate destinations flush on every push.
    fn immediate(&self) -> bool {
        false
    }

    fn enqueue(&self, record: PooledMessage);

    /// Drain the queue into the sink now.
    fn flush(&self);

    /// Flush, then acknowledge on `ack` with this destination's id. Used by
    /// the reset manager to wait for quiescence before rotating logs.
    fn drain(&self, ack: &mpsc::Sender<String>);
}

/// Bounded FIFO shared by the in-core destinations.
///
/// Overflow drops the oldest record (its handle drop releases the pool
/// slot) so a stalled sink cannot pin the pool.
pub struct DestQueue {
    inner: Mutex<VecDeque<PooledMessage>>,
    capacity: usize,
    watermark: usize,
    dropped: AtomicU64,
}

impl DestQueue {
    pub fn new(capacity: usize, watermark: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            watermark: watermark.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Push a record; returns `true` when the watermark has been reached.
    pub fn push(&self, record: PooledMessage) -> bool {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.len() >= self.capacity {
            queue.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queue.push_back(record);
        queue.len() >= self.watermark
    }

    pub fn drain_now(&self) -> Vec<PooledMessage> {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for DestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("watermark", &self.watermark)
            .finish()
    }
}

/// Weak-handle destination registry keyed by stable id.
#[derive(Clone)]
pub struct DestRegistry {
    inner: Arc<RwLock<IndexMap<String, Weak<dyn Destination>>>>,
}

impl Default for DestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DestRegistry {
    pub fn new() -> Self {
        Self { inner: Arc::new(RwLock::new(IndexMap::new())) }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, IndexMap<String, Weak<dyn Destination>>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, IndexMap<String, Weak<dyn Destination>>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, dest: &Arc<dyn Destination>) {
        self.write().insert(dest.id().to_owned(), Arc::downgrade(dest));
    }

    pub fn remove(&self, id: &str) {
        self.write().shift_remove(id);
    }

    /// Look up a live handle. Ids whose destination has been dropped stay
    /// in the table (the caller counts them as lost) until re-registered.
    pub fn resolve(&self, id: &str) -> Option<Arc<dyn Destination>> {
        self.read().get(id).and_then(Weak::upgrade)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Find a live typed window by its directive name (id suffix).
    pub fn resolve_window(&self, name: &str) -> Option<Arc<dyn Destination>> {
        let suffix = name.to_ascii_lowercase();
        self.read()
            .iter()
            .filter_map(|(id, weak)| {
                let (_, win_name) = id.split_once(':')?;
                if win_name != suffix {
                    return None;
                }
                let dest = weak.upgrade()?;
                (dest.kind() == DestKind::TypedWindow).then_some(dest)
            })
            .next()
    }

    /// Flush every live non-immediate destination (the router tick).
    pub fn flush_pending(&self) {
        let live: Vec<Arc<dyn Destination>> =
            self.read().values().filter_map(Weak::upgrade).collect();
        for dest in live {
            if !dest.immediate() {
                dest.flush();
            }
        }
    }

    /// Ask every live destination to drain. Returns how many were asked —
    /// the caller waits for that many acknowledgements.
    pub fn drain_all(&self, ack: &mpsc::Sender<String>) -> usize {
        let live: Vec<Arc<dyn Destination>> =
            self.read().values().filter_map(Weak::upgrade).collect();
        for dest in &live {
            dest.drain(ack);
        }
        live.len()
    }
}

impl std::fmt::Debug for DestRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestRegistry").field("ids", &self.ids()).finish()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
