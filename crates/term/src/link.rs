// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wire abstraction.
//!
//! A [`Link`] owns the serial side of the system: it pushes inbound bytes
//! straight into the ring producer, transmits host replies, and may surface
//! DTR edges when the transport can observe the control line. The core
//! never drives DTR itself.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::event::DtrEdge;
use crate::ring::RingProducer;

/// Channel endpoints a running link serves.
pub struct LinkIo {
    /// Producer half of the ingest ring; the link is its only writer.
    pub producer: RingProducer,
    /// Host replies (52-byte acknowledgements) to transmit.
    pub reply_rx: mpsc::Receiver<Bytes>,
    /// DTR edges, for transports that can see the control line.
    pub dtr_tx: mpsc::Sender<DtrEdge>,
    /// Cancelled when the inbound stream reaches end-of-file, so the
    /// processor can drain and stop.
    pub ingest_done: CancellationToken,
    /// Session shutdown.
    pub shutdown: CancellationToken,
}

/// Byte transport abstraction, object-safe for `Box<dyn Link>`.
pub trait Link: Send + 'static {
    fn run(self: Box<Self>, io: LinkIo)
        -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
}

/// Conversion trait so concrete links and `Box<dyn Link>` are accepted
/// interchangeably by the runner.
pub trait Boxed {
    fn boxed(self) -> Box<dyn Link>;
}

impl<T: Link> Boxed for T {
    fn boxed(self) -> Box<dyn Link> {
        Box::new(self)
    }
}

impl Boxed for Box<dyn Link> {
    fn boxed(self) -> Box<dyn Link> {
        self
    }
}

/// Stdio transport: stdin carries the inbound P2 stream, stdout carries the
/// host acknowledgements. The usual deployment pipes a serial device in and
/// out; DTR edges arrive by signal instead (see the runner).
pub struct StdioLink;

impl Link for StdioLink {
    fn run(
        self: Box<Self>,
        mut io: LinkIo,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> {
        Box::pin(async move {
            let mut stdin = tokio::io::stdin();
            let mut stdout = tokio::io::stdout();
            let mut buf = vec![0u8; 16 * 1024];
            let mut inbound_open = true;

            loop {
                tokio::select! {
                    read = stdin.read(&mut buf), if inbound_open => {
                        match read {
                            Ok(0) => {
                                debug!("inbound stream closed");
                                inbound_open = false;
                                io.ingest_done.cancel();
                            }
                            Ok(n) => {
                                // Overflow is counted inside the ring.
                                let _ = io.producer.push(&buf[..n]);
                            }
                            Err(e) => {
                                io.ingest_done.cancel();
                                return Err(e.into());
                            }
                        }
                    }
                    reply = io.reply_rx.recv() => {
                        match reply {
                            Some(bytes) => {
                                stdout.write_all(&bytes).await?;
                                stdout.flush().await?;
                            }
                            // Processor gone; nothing left to serve.
                            None => break,
                        }
                    }
                    _ = io.shutdown.cancelled() => break,
                }
            }
            Ok(())
        })
    }
}

/// In-memory link for embedding and tests: inbound spans and DTR edges
/// arrive on channels, replies are forwarded to a collector.
pub struct ChannelLink {
    pub inbound_rx: mpsc::Receiver<Bytes>,
    pub control_rx: Option<mpsc::Receiver<DtrEdge>>,
    pub reply_out: mpsc::Sender<Bytes>,
}

impl Link for ChannelLink {
    fn run(
        self: Box<Self>,
        mut io: LinkIo,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> {
        let Self { mut inbound_rx, control_rx, reply_out } = *self;
        Box::pin(async move {
            let mut inbound_open = true;
            let mut control_rx = control_rx;
            loop {
                tokio::select! {
                    span = inbound_rx.recv(), if inbound_open => {
                        match span {
                            Some(bytes) => {
                                let _ = io.producer.push(&bytes);
                            }
                            None => {
                                debug!("inbound channel closed");
                                inbound_open = false;
                                io.ingest_done.cancel();
                            }
                        }
                    }
                    edge = recv_control(&mut control_rx), if control_rx.is_some() => {
                        match edge {
                            Some(edge) => {
                                let _ = io.dtr_tx.send(edge).await;
                            }
                            None => control_rx = None,
                        }
                    }
                    reply = io.reply_rx.recv() => {
                        match reply {
                            Some(bytes) => {
                                let _ = reply_out.send(bytes).await;
                            }
                            None => break,
                        }
                    }
                    _ = io.shutdown.cancelled() => break,
                }
            }
            Ok(())
        })
    }
}

async fn recv_control(rx: &mut Option<mpsc::Receiver<DtrEdge>>) -> Option<DtrEdge> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "link_tests.rs"]
mod tests;
