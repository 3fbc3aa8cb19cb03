// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Router: per-kind destination tables, pooled fan-out, and the packet
//! signal to the response arbiter.
//!
//! Dispatch protocol per message:
//! 1. resolve the destination id list (base table plus metadata extras);
//! 2. acquire a pooled record with one handle per destination, backing off
//!    1 ms between attempts when the pool is exhausted;
//! 3. enqueue one handle per destination; an id that no longer resolves
//!    counts as a lost destination and its handle drops immediately,
//!    releasing the consumer slot;
//! 4. debugger packets additionally signal the arbiter, whatever happened
//!    to their destinations.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::dest::{DestRegistry, LOGGER_ID, WINDOW_CREATOR_ID};
use crate::error::FaultKind;
use crate::event::PacketSignal;
use crate::message::{Message, MessageKind, Metadata, WindowType};
use crate::pool::MessagePool;
use crate::stats::Stats;

/// Retries after the first failed pool acquisition.
pub const POOL_RETRY_LIMIT: u32 = 10;

/// Back-off between pool retries.
pub const POOL_RETRY_BACKOFF: Duration = Duration::from_millis(1);

pub struct Router {
    table: IndexMap<MessageKind, Vec<String>>,
    registry: DestRegistry,
    pool: MessagePool,
    packet_tx: mpsc::Sender<PacketSignal>,
    stats: Arc<Stats>,
    dispatched: u64,
}

impl Router {
    pub fn new(
        registry: DestRegistry,
        pool: MessagePool,
        packet_tx: mpsc::Sender<PacketSignal>,
        stats: Arc<Stats>,
    ) -> Self {
        let mut table = IndexMap::new();
        table.insert(MessageKind::Cog, vec![LOGGER_ID.to_owned()]);
        table.insert(MessageKind::Backtick, vec![LOGGER_ID.to_owned()]);
        table.insert(MessageKind::Debugger, vec![LOGGER_ID.to_owned()]);
        table.insert(MessageKind::Terminal, vec![LOGGER_ID.to_owned()]);
        Self { table, registry, pool, packet_tx, stats, dispatched: 0 }
    }

    /// Replace the base destination list for a kind.
    pub fn set_route(&mut self, kind: MessageKind, ids: Vec<String>) {
        self.table.insert(kind, ids);
    }

    /// Destination ids for a message: base table plus metadata-keyed extras.
    pub fn route_for(&self, message: &Message) -> Vec<String> {
        let mut ids = self.table.get(&message.kind).cloned().unwrap_or_default();

        match &message.meta {
            Metadata::Debugger { cog_id } => {
                // Per-cog debugger surface, when one has been opened.
                let window_id = crate::dest::TypedWindowDest::debugger_id(*cog_id);
                if self.registry.contains(&window_id) {
                    ids.push(window_id);
                }
            }
            Metadata::Backtick { directive, .. } => {
                if WindowType::from_directive(directive).is_some() {
                    // Creation directive: the window creator materializes
                    // and registers the typed window.
                    ids.push(WINDOW_CREATOR_ID.to_owned());
                } else if let Some(window) = self.registry.resolve_window(directive) {
                    ids.push(window.id().to_owned());
                }
            }
            Metadata::Cog { .. } | Metadata::None => {}
        }

        ids.dedup();
        ids
    }

    /// Deliver one message to all of its destinations.
    pub async fn dispatch(&mut self, message: Message) {
        if let Metadata::Debugger { cog_id } = message.meta {
            // The arbiter must hear about every packet, even if delivery
            // fails entirely — the sending cog is blocked on the reply.
            if self
                .packet_tx
                .try_send(PacketSignal { cog_id, arrived: Instant::now() })
                .is_err()
            {
                warn!(cog_id, "packet signal channel full; arbiter lagging");
            }
        }

        let ids = self.route_for(&message);
        self.dispatched += 1;

        if ids.is_empty() {
            return;
        }

        let consumers = ids.len() as u32;
        let mut pending = message;
        let mut handles = Vec::new();
        for attempt in 0..=POOL_RETRY_LIMIT {
            match self.pool.try_acquire(pending, consumers) {
                Ok(minted) => {
                    handles = minted;
                    break;
                }
                Err(back) => {
                    self.stats.pool_exhaustion_count.fetch_add(1, Ordering::Relaxed);
                    if attempt == POOL_RETRY_LIMIT {
                        self.stats.dropped_messages.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            fault = FaultKind::PoolExhausted.as_str(),
                            kind = back.kind.as_str(),
                            "pool exhausted after retries; dropping message"
                        );
                        return;
                    }
                    pending = back;
                    tokio::time::sleep(POOL_RETRY_BACKOFF).await;
                }
            }
        }

        for (id, handle) in ids.iter().zip(handles) {
            match self.registry.resolve(id) {
                Some(dest) => dest.enqueue(handle),
                None => {
                    self.stats.destinations_lost.fetch_add(1, Ordering::Relaxed);
                    debug!(fault = FaultKind::DestinationLost.as_str(), id, "destination gone");
                    // Handle drops here, releasing the consumer slot.
                }
            }
        }
    }

    /// Router tick: drain non-immediate destinations.
    pub fn tick(&self) {
        self.registry.flush_pending();
    }

    /// Dispatches since the last call (feeds the velocity sample).
    pub fn take_dispatched(&mut self) -> u64 {
        std::mem::take(&mut self.dispatched)
    }

    pub fn registry(&self) -> &DestRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &MessagePool {
        &self.pool
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("table", &self.table)
            .field("dispatched", &self.dispatched)
            .finish()
    }
}

#[cfg(test)]
#[path = "route_tests.rs"]
mod tests;
