// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Processor loop: the cooperative orchestrator tying ring, extractor,
//! router, arbiter, and reset manager together.
//!
//! One task, one select loop. The pacer tick pulls from the ring and
//! dispatches; a one-second sample re-tunes the pacer; DTR edges run the
//! reset sequence inline (which suspends extraction for its duration,
//! by construction); packet signals feed the response arbiter.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dest::LoggerDest;
use crate::event::{DtrEdge, PacketSignal};
use crate::extract::Extractor;
use crate::pacer::AdaptivePacer;
use crate::reset::{ResetDisposition, ResetManager};
use crate::respond::ResponseArbiter;
use crate::route::Router;
use crate::stats::Stats;

/// Grace period after inbound EOF: a few pacer ticks to drain the ring and
/// flush queued replies before the loop stops.
const QUIESCE_GRACE: Duration = Duration::from_millis(100);

/// Everything a [`Processor`] needs (built by the runner or a test harness).
pub struct ProcessorParts {
    pub extractor: Extractor,
    pub router: Router,
    pub arbiter: ResponseArbiter,
    pub resets: ResetManager,
    pub pacer: AdaptivePacer,
    pub logger: Arc<LoggerDest>,
    pub reply_tx: mpsc::Sender<Bytes>,
    pub packet_rx: mpsc::Receiver<PacketSignal>,
    pub dtr_rx: mpsc::Receiver<DtrEdge>,
    pub ingest_done: CancellationToken,
    pub shutdown: CancellationToken,
    pub stats: Arc<Stats>,
}

pub struct Processor {
    extractor: Extractor,
    router: Router,
    arbiter: ResponseArbiter,
    resets: ResetManager,
    pacer: AdaptivePacer,
    logger: Arc<LoggerDest>,
    reply_tx: mpsc::Sender<Bytes>,
    packet_rx: mpsc::Receiver<PacketSignal>,
    dtr_rx: mpsc::Receiver<DtrEdge>,
    ingest_done: CancellationToken,
    shutdown: CancellationToken,
    stats: Arc<Stats>,
    max_processing: Duration,
}

impl Processor {
    pub fn new(parts: ProcessorParts) -> Self {
        let ProcessorParts {
            extractor,
            router,
            arbiter,
            resets,
            pacer,
            logger,
            reply_tx,
            packet_rx,
            dtr_rx,
            ingest_done,
            shutdown,
            stats,
        } = parts;
        Self {
            extractor,
            router,
            arbiter,
            resets,
            pacer,
            logger,
            reply_tx,
            packet_rx,
            dtr_rx,
            ingest_done,
            shutdown,
            stats,
            max_processing: Duration::ZERO,
        }
    }

    /// Run until shutdown, or until the inbound stream ends and the ring has
    /// had its quiesce grace.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut pace = tokio::time::interval(self.pacer.current_period());
        pace.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut sample = tokio::time::interval(Duration::from_secs(1));
        sample.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        self.stats.set_pacer_ms(self.pacer.current_period().as_millis() as u64);

        let mut quiesce_at: Option<tokio::time::Instant> = None;

        loop {
            let flush_at = self.arbiter.next_flush_at();

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    debug!("shutdown signal received");
                    break;
                }

                Some(edge) = self.dtr_rx.recv() => {
                    self.handle_dtr(edge).await;
                }

                Some(signal) = self.packet_rx.recv() => {
                    let now = Instant::now();
                    if let Some(reply) = self.arbiter.on_packet(&signal, now) {
                        let _ = self.reply_tx.send(reply).await;
                    }
                }

                // Queued acknowledgements become sendable after the debounce
                // gap.
                _ = async {
                    match flush_at {
                        Some(at) => tokio::time::sleep_until(at.into()).await,
                        None => std::future::pending().await,
                    }
                }, if flush_at.is_some() => {
                    let replies = self.arbiter.flush(Instant::now());
                    self.send_replies(replies).await;
                }

                _ = pace.tick() => {
                    let started = Instant::now();
                    self.pump().await;
                    let took = started.elapsed();
                    if took > self.max_processing {
                        self.max_processing = took;
                    }
                }

                _ = sample.tick() => {
                    let dispatched = self.router.take_dispatched();
                    let max_processing = std::mem::take(&mut self.max_processing);
                    if let Some(period) = self.pacer.sample(dispatched, max_processing) {
                        debug!(period_ms = period.as_millis() as u64, "pacer period changed");
                        pace = tokio::time::interval(period);
                        pace.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                        self.stats.set_pacer_ms(period.as_millis() as u64);
                    }
                    self.stats.set_velocity(self.pacer.velocity());
                    self.sync_ring_stats();
                }

                _ = self.ingest_done.cancelled(), if quiesce_at.is_none() => {
                    debug!("inbound stream done; entering quiesce grace");
                    quiesce_at = Some(tokio::time::Instant::now() + QUIESCE_GRACE);
                }

                _ = async {
                    match quiesce_at {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending().await,
                    }
                }, if quiesce_at.is_some() => {
                    debug!("quiesce grace elapsed; stopping");
                    break;
                }
            }
        }

        // Final sweep: frames still in the ring, stale packet signals, and
        // queued replies all resolve before the loop reports done.
        self.pump().await;
        while let Ok(signal) = self.packet_rx.try_recv() {
            let now = Instant::now();
            if let Some(reply) = self.arbiter.on_packet(&signal, now) {
                let _ = self.reply_tx.send(reply).await;
            }
        }
        if self.arbiter.queued() > 0 {
            if let Some(at) = self.arbiter.next_flush_at() {
                tokio::time::sleep_until(at.into()).await;
            }
            let replies = self.arbiter.flush(Instant::now());
            self.send_replies(replies).await;
        }
        self.router.tick();
        self.sync_ring_stats();
        info!(snapshot = ?self.stats.snapshot(), "ingestion stopped");
        Ok(())
    }

    /// One pacer tick: sync producer counters, extract, dispatch, drain
    /// non-immediate destinations.
    async fn pump(&mut self) {
        self.sync_ring_stats();
        let messages = self.extractor.poll();
        if !messages.is_empty() {
            for message in messages {
                self.router.dispatch(message).await;
            }
            // Let the producer side run between batches.
            tokio::task::yield_now().await;
        }
        self.router.tick();
    }

    async fn send_replies(&self, replies: Vec<Bytes>) {
        for reply in replies {
            let _ = self.reply_tx.send(reply).await;
        }
    }

    async fn handle_dtr(&mut self, edge: DtrEdge) {
        match self.resets.request(edge, Instant::now()) {
            ResetDisposition::Accepted { seq } => {
                self.run_reset_sequence(seq).await;
                // Replay an edge that landed mid-sequence.
                while self.resets.take_parked() {
                    match self.resets.request(DtrEdge::High, Instant::now()) {
                        ResetDisposition::Accepted { seq } => self.run_reset_sequence(seq).await,
                        _ => break,
                    }
                }
            }
            ResetDisposition::Coalesced { seq } => {
                debug!(seq, "reset edge coalesced");
            }
            ResetDisposition::Parked { seq } => {
                debug!(seq, "reset edge parked behind running sequence");
            }
            ResetDisposition::Recorded => {}
        }
    }

    /// One full reset sequence: deliver what precedes the marker, clear
    /// stream state, drain destinations, rotate the log, resume.
    async fn run_reset_sequence(&mut self, seq: u64) {
        info!(seq, "device reset detected");

        // Frames already complete in the ring precede the reset marker.
        let messages = self.extractor.poll();
        for message in messages {
            self.router.dispatch(message).await;
        }
        self.extractor.clear();
        self.arbiter.reset();
        // Packet signals from before the marker are void now.
        while self.packet_rx.try_recv().is_ok() {}

        let (ack_tx, mut ack_rx) = mpsc::channel::<String>(256);
        let expected = self.router.registry().drain_all(&ack_tx);
        drop(ack_tx);

        let deadline = tokio::time::Instant::now() + self.resets.drain_timeout();
        let mut acked = 0usize;
        while acked < expected {
            match tokio::time::timeout_at(deadline, ack_rx.recv()).await {
                Ok(Some(_id)) => acked += 1,
                Ok(None) => break,
                Err(_) => {
                    warn!(acked, expected, "destination drain timed out; proceeding");
                    break;
                }
            }
        }
        self.resets.drain_complete();

        let rotation = self.logger.rotate();
        self.resets.rotate_ack();
        info!(seq, rotation, "reset sequence complete");
    }

    fn sync_ring_stats(&self) {
        let consumer = self.extractor.consumer();
        self.stats.bytes_in.store(consumer.total_written(), Ordering::Relaxed);
        self.stats.overflow_count.store(consumer.overflow_count(), Ordering::Relaxed);
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("resets", &self.resets)
            .field("arbiter", &self.arbiter)
            .finish()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
