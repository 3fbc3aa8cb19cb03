// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed message log destination.
//!
//! Messages are appended as JSONL to `messages.jsonl` in the log directory.
//! A device reset rotates the active file to a numbered snapshot
//! (`messages.001.jsonl`, …) so each reset sequence starts a fresh log
//! while older captures stay recoverable. With no log directory (tests,
//! embedding) the destination still participates in delivery and drain but
//! writes nothing.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::message::{Message, MessageKind, Metadata};
use crate::pool::PooledMessage;

use super::{DestKind, DestQueue, Destination, DEFAULT_QUEUE_CAPACITY};

pub const LOGGER_ID: &str = "logger";

const ACTIVE_FILE: &str = "messages.jsonl";

/// One serialized log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp_us: u64,
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cog: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cog_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Payload length; only recorded for binary packets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub len: Option<usize>,
}

impl LogEntry {
    pub fn from_message(message: &Message) -> Self {
        let mut entry = Self {
            timestamp_us: message.timestamp_us,
            kind: message.kind,
            cog: None,
            directive: None,
            target: None,
            cog_id: None,
            text: None,
            len: None,
        };
        match &message.meta {
            Metadata::Cog { cog } => entry.cog = Some(*cog),
            Metadata::Backtick { directive, target } => {
                entry.directive = Some(directive.clone());
                entry.target = target.clone();
            }
            Metadata::Debugger { cog_id } => entry.cog_id = Some(*cog_id),
            Metadata::None => {}
        }
        if message.kind == MessageKind::Debugger {
            entry.len = Some(message.payload.len());
        } else {
            entry.text = Some(message.text().into_owned());
        }
        entry
    }
}

/// Append/rotate machinery behind the logger destination.
pub struct MessageLog {
    dir: Option<PathBuf>,
    rotations: AtomicU32,
}

impl MessageLog {
    pub fn new(dir: Option<&Path>) -> Self {
        if let Some(dir) = dir {
            // Ensure dir exists (best-effort).
            let _ = std::fs::create_dir_all(dir);
        }
        Self { dir: dir.map(Path::to_path_buf), rotations: AtomicU32::new(0) }
    }

    pub fn active_path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(ACTIVE_FILE))
    }

    fn append(&self, entries: &[LogEntry]) {
        let Some(path) = self.active_path() else {
            return;
        };
        let mut lines = String::new();
        for entry in entries {
            let Ok(line) = serde_json::to_string(entry) else {
                continue;
            };
            lines.push_str(&line);
            lines.push('\n');
        }
        let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(&path)
        else {
            warn!(path = %path.display(), "message log open failed");
            return;
        };
        let _ = file.write_all(lines.as_bytes());
    }

    /// Move the active file aside and start fresh. Returns the snapshot
    /// number (also counted when there was nothing to move).
    pub fn rotate(&self) -> u32 {
        let number = self.rotations.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(active) = self.active_path() {
            if active.exists() {
                if let Some(dir) = &self.dir {
                    let snapshot = dir.join(format!("messages.{number:03}.jsonl"));
                    if let Err(e) = std::fs::rename(&active, &snapshot) {
                        warn!(number, error = %e, "log rotation rename failed");
                    } else {
                        debug!(number, snapshot = %snapshot.display(), "log rotated");
                    }
                }
            }
        }
        number
    }

    pub fn rotations(&self) -> u32 {
        self.rotations.load(Ordering::Relaxed)
    }
}

/// The logger destination: immediate, so every delivered message hits the
/// file before the next router step.
pub struct LoggerDest {
    queue: DestQueue,
    log: MessageLog,
}

impl LoggerDest {
    pub fn new(dir: Option<&Path>, watermark: usize) -> Self {
        Self { queue: DestQueue::new(DEFAULT_QUEUE_CAPACITY, watermark), log: MessageLog::new(dir) }
    }

    /// Flush anything pending, then rotate the log file.
    pub fn rotate(&self) -> u32 {
        self.flush();
        self.log.rotate()
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }
}

impl Destination for LoggerDest {
    fn id(&self) -> &str {
        LOGGER_ID
    }

    fn kind(&self) -> DestKind {
        DestKind::Logger
    }

    fn immediate(&self) -> bool {
        true
    }

    fn enqueue(&self, record: PooledMessage) {
        self.queue.push(record);
        self.flush();
    }

    fn flush(&self) {
        let records = self.queue.drain_now();
        if records.is_empty() {
            return;
        }
        let entries: Vec<LogEntry> = records
            .iter()
            .filter_map(|record| record.message().as_ref().map(LogEntry::from_message))
            .collect();
        self.log.append(&entries);
        // Records drop here, releasing their pool slots.
    }

    fn drain(&self, ack: &mpsc::Sender<String>) {
        self.flush();
        let _ = ack.try_send(LOGGER_ID.to_owned());
    }
}

#[cfg(test)]
#[path = "logger_tests.rs"]
mod tests;
