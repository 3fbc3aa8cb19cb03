// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pre-allocated message records for zero-copy fan-out.
//!
//! The router acquires one slot per extracted message and hands each
//! destination its own [`PooledMessage`] handle. Dropping a handle releases
//! one consumer; the last release returns the slot to the free list. The
//! free list is the only lock, held just across push/pop.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use bytes::Bytes;

use crate::message::{Message, MessageKind, Metadata};

pub const DEFAULT_POOL_SIZE: usize = 100;

struct Slot {
    message: RwLock<Option<Message>>,
    total: AtomicU32,
    remaining: AtomicU32,
}

struct PoolShared {
    slots: Vec<Slot>,
    free: Mutex<Vec<usize>>,
}

impl PoolShared {
    fn free_list(&self) -> std::sync::MutexGuard<'_, Vec<usize>> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
pub struct MessagePool {
    shared: Arc<PoolShared>,
}

impl MessagePool {
    pub fn new(size: usize) -> Self {
        let slots = (0..size)
            .map(|_| Slot {
                message: RwLock::new(None),
                total: AtomicU32::new(0),
                remaining: AtomicU32::new(0),
            })
            .collect();
        let free = (0..size).rev().collect();
        Self { shared: Arc::new(PoolShared { slots, free: Mutex::new(free) }) }
    }

    /// Take a free slot and mint one handle per consumer.
    ///
    /// Never blocks: when the pool is exhausted the message is handed back
    /// so the caller can retry. Zero consumers is a no-op that takes no
    /// slot.
    pub fn try_acquire(
        &self,
        message: Message,
        consumers: u32,
    ) -> Result<Vec<PooledMessage>, Message> {
        if consumers == 0 {
            return Ok(Vec::new());
        }
        let Some(index) = self.shared.free_list().pop() else {
            return Err(message);
        };
        let slot = &self.shared.slots[index];
        *slot.message.write().unwrap_or_else(PoisonError::into_inner) = Some(message);
        slot.total.store(consumers, Ordering::Relaxed);
        slot.remaining.store(consumers, Ordering::Release);

        let handles = (0..consumers)
            .map(|_| PooledMessage { shared: Arc::clone(&self.shared), slot: index })
            .collect();
        Ok(handles)
    }

    pub fn capacity(&self) -> usize {
        self.shared.slots.len()
    }

    pub fn free_slots(&self) -> usize {
        self.shared.free_list().len()
    }
}

impl std::fmt::Debug for MessagePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagePool")
            .field("capacity", &self.capacity())
            .field("free", &self.free_slots())
            .finish()
    }
}

/// One consumer's handle to a pooled message. Dropping it releases the
/// consumer slot; the record recycles when the last handle goes.
pub struct PooledMessage {
    shared: Arc<PoolShared>,
    slot: usize,
}

impl PooledMessage {
    fn with_message<T>(&self, f: impl FnOnce(&Message) -> T) -> Option<T> {
        let guard =
            self.shared.slots[self.slot].message.read().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().map(f)
    }

    pub fn kind(&self) -> MessageKind {
        self.with_message(|m| m.kind).unwrap_or(MessageKind::Unknown)
    }

    pub fn meta(&self) -> Metadata {
        self.with_message(|m| m.meta.clone()).unwrap_or(Metadata::None)
    }

    /// Payload handle; cloning shares the bytes, nothing is copied.
    pub fn payload(&self) -> Bytes {
        self.with_message(|m| m.payload.clone()).unwrap_or_default()
    }

    pub fn timestamp_us(&self) -> u64 {
        self.with_message(|m| m.timestamp_us).unwrap_or_default()
    }

    /// Full copy of the record (payload bytes still shared).
    pub fn message(&self) -> Option<Message> {
        self.with_message(Message::clone)
    }

    pub fn consumer_total(&self) -> u32 {
        self.shared.slots[self.slot].total.load(Ordering::Relaxed)
    }

    pub fn consumers_remaining(&self) -> u32 {
        self.shared.slots[self.slot].remaining.load(Ordering::Acquire)
    }
}

impl Drop for PooledMessage {
    fn drop(&mut self) {
        let slot = &self.shared.slots[self.slot];
        if slot.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            *slot.message.write().unwrap_or_else(PoisonError::into_inner) = None;
            self.shared.free_list().push(self.slot);
        }
    }
}

impl std::fmt::Debug for PooledMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledMessage")
            .field("slot", &self.slot)
            .field("kind", &self.kind())
            .field("remaining", &self.consumers_remaining())
            .finish()
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
