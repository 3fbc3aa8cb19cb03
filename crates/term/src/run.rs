// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level runner — shared by `main` and integration tests.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::dest::{DestRegistry, Destination, LoggerDest, WindowCreatorDest};
use crate::event::DtrEdge;
use crate::extract::Extractor;
use crate::link::{Boxed, LinkIo, StdioLink};
use crate::pacer::AdaptivePacer;
use crate::pattern::{PacketPolicy, Registry};
use crate::pool::MessagePool;
use crate::reset::ResetManager;
use crate::respond::ResponseArbiter;
use crate::ring::{ring, RingProducer};
use crate::route::Router;
use crate::session::{Processor, ProcessorParts};
use crate::stats::{Stats, StatsSnapshot};

/// A fully-wired session, ready to attach to a link.
///
/// The runner (or a test harness) owns the strong destination handles; the
/// registry inside the router only ever holds weak ones.
pub struct Wired {
    pub processor: Processor,
    pub producer: RingProducer,
    pub reply_rx: mpsc::Receiver<Bytes>,
    pub dtr_tx: mpsc::Sender<DtrEdge>,
    pub ingest_done: CancellationToken,
    pub shutdown: CancellationToken,
    pub stats: Arc<Stats>,
    pub registry: DestRegistry,
    pub logger: Arc<LoggerDest>,
    pub creator: Arc<WindowCreatorDest>,
}

/// Build every component from the configuration.
pub fn wire(config: &Config) -> anyhow::Result<Wired> {
    let (producer, consumer) = ring(config.ring_capacity);
    let stats = Arc::new(Stats::default());
    let registry = DestRegistry::new();

    let logger = Arc::new(LoggerDest::new(config.log_dir.as_deref(), config.flush_watermark));
    let logger_dest: Arc<dyn Destination> = Arc::clone(&logger) as Arc<dyn Destination>;
    registry.register(&logger_dest);

    let creator = Arc::new(
        WindowCreatorDest::new(registry.clone())
            .with_limits(config.flush_watermark, config.window_backlog),
    );
    let creator_dest: Arc<dyn Destination> = Arc::clone(&creator) as Arc<dyn Destination>;
    registry.register(&creator_dest);

    let recognizers = Registry::standard(PacketPolicy { cog_count: config.cog_count })?;
    let extractor =
        Extractor::new(consumer, recognizers, config.zero_skip_cap, Arc::clone(&stats));

    let (packet_tx, packet_rx) = mpsc::channel(64);
    let router = Router::new(
        registry.clone(),
        MessagePool::new(config.pool_size),
        packet_tx,
        Arc::clone(&stats),
    );

    let arbiter = ResponseArbiter::new(
        config.response_debounce(),
        config.response_window(),
        Arc::clone(&stats),
    );
    let resets =
        ResetManager::new(config.reset_coalesce(), config.drain_timeout(), Arc::clone(&stats));
    let pacer = AdaptivePacer::new(config.pacer_periods());

    let (reply_tx, reply_rx) = mpsc::channel(64);
    let (dtr_tx, dtr_rx) = mpsc::channel(16);
    let ingest_done = CancellationToken::new();
    let shutdown = CancellationToken::new();

    let processor = Processor::new(ProcessorParts {
        extractor,
        router,
        arbiter,
        resets,
        pacer,
        logger: Arc::clone(&logger),
        reply_tx,
        packet_rx,
        dtr_rx,
        ingest_done: ingest_done.clone(),
        shutdown: shutdown.clone(),
        stats: Arc::clone(&stats),
    });

    Ok(Wired {
        processor,
        producer,
        reply_rx,
        dtr_tx,
        ingest_done,
        shutdown,
        stats,
        registry,
        logger,
        creator,
    })
}

/// Attach a link to a wired session and run both to completion.
pub async fn launch(wired: Wired, link: impl Boxed) -> anyhow::Result<StatsSnapshot> {
    let Wired {
        processor,
        producer,
        reply_rx,
        dtr_tx,
        ingest_done,
        shutdown,
        stats,
        registry: _registry,
        logger: _logger,
        creator: _creator,
    } = wired;

    let io = LinkIo {
        producer,
        reply_rx,
        dtr_tx,
        ingest_done,
        shutdown: shutdown.clone(),
    };
    let link_handle = tokio::spawn(link.boxed().run(io));

    let result = processor.run().await;

    // The processor is done; release the link and collect it.
    shutdown.cancel();
    match link_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("link error: {e:#}"),
        Err(e) => warn!("link task panicked: {e}"),
    }

    result.map(|_| stats.snapshot())
}

/// Run a session over a custom link (integration tests, embedding).
pub async fn run_with_link(config: Config, link: impl Boxed) -> anyhow::Result<StatsSnapshot> {
    let wired = wire(&config)?;
    launch(wired, link).await
}

/// Run the stdio session: stdin is the P2 stream, stdout the response wire.
/// SIGUSR1/SIGUSR2 stand in for DTR rising/falling edges; SIGINT/SIGTERM
/// shut down.
pub async fn run(config: Config) -> anyhow::Result<StatsSnapshot> {
    let wired = wire(&config)?;
    spawn_signal_watcher(wired.dtr_tx.clone(), wired.shutdown.clone());
    launch(wired, StdioLink).await
}

fn spawn_signal_watcher(dtr_tx: mpsc::Sender<DtrEdge>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let usr1 = signal(SignalKind::user_defined1());
        let usr2 = signal(SignalKind::user_defined2());
        let term = signal(SignalKind::terminate());
        let int = signal(SignalKind::interrupt());
        let (Ok(mut usr1), Ok(mut usr2), Ok(mut term), Ok(mut int)) = (usr1, usr2, term, int)
        else {
            warn!("signal watcher unavailable");
            return;
        };

        loop {
            tokio::select! {
                _ = usr1.recv() => {
                    let _ = dtr_tx.send(DtrEdge::High).await;
                }
                _ = usr2.recv() => {
                    let _ = dtr_tx.send(DtrEdge::Low).await;
                }
                _ = term.recv() => {
                    shutdown.cancel();
                }
                _ = int.recv() => {
                    shutdown.cancel();
                }
                _ = shutdown.cancelled() => break,
            }
        }
    });
}

/// Initialize tracing/logging from config. Diagnostics go to stderr: stdout
/// is the response wire.
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // try_init so repeated initialization (tests) is harmless.
    let _ = match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().try_init()
        }
        _ => fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init(),
    };
}
