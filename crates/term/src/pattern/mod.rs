// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame recognizers for the mixed P2 stream.
//!
//! Several frame shapes coexist on one wire: fixed-size binary debugger
//! packets, backtick window directives, per-cog text lines, and free-form
//! terminal output. Each shape gets a [`Recognizer`]; the [`Registry`] keeps
//! them priority-ordered so the extractor tries the most specific shape
//! first at every scan position.

pub mod backtick;
pub mod cog;
pub mod debugger;
pub mod text;

pub use backtick::BacktickRecognizer;
pub use cog::CogRecognizer;
pub use debugger::{DebuggerPacketRecognizer, PacketPolicy};
pub use text::TerminalRecognizer;

use crate::message::{Metadata, MessageKind, PACKET_LEN};

/// Longest run a text recognizer will scan before declaring the bytes
/// unframeable.
pub const TEXT_SCAN_LIMIT: usize = 1024;

/// Peek size the extractor needs so every recognizer can reach a verdict:
/// the text limit plus a two-byte terminator, or a whole binary packet.
pub const SCAN_WINDOW: usize = if TEXT_SCAN_LIMIT + 2 > PACKET_LEN {
    TEXT_SCAN_LIMIT + 2
} else {
    PACKET_LEN
};

/// A complete frame found at the scan position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Bytes to consume from the ring, terminator included for text kinds.
    pub len: usize,
    pub kind: MessageKind,
    pub meta: Metadata,
}

/// Verdict of a recognizer over the bytes at the scan position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan {
    /// Could become this frame shape, but more bytes are needed.
    Incomplete,
    /// Not this frame shape; the next recognizer gets a turn.
    Invalid,
    Complete(Frame),
}

/// One frame shape.
///
/// `can_start_at` is an O(1) prefilter over the first two stream bytes;
/// `validate` does bounded work and must never read past the window it is
/// given.
pub trait Recognizer: Send + Sync {
    /// Lower value = tried first.
    fn priority(&self) -> u8;

    fn can_start_at(&self, b0: u8, b1: u8) -> bool;

    fn validate(&self, window: &[u8]) -> Scan;
}

/// Priority-ordered recognizer set.
pub struct Registry {
    recognizers: Vec<Box<dyn Recognizer>>,
}

impl Registry {
    /// The four standard recognizers in normative order: debugger packet,
    /// backtick directive, cog line, terminal fallback.
    pub fn standard(policy: PacketPolicy) -> anyhow::Result<Self> {
        let mut registry = Self { recognizers: Vec::new() };
        registry.insert(Box::new(DebuggerPacketRecognizer::new(policy)));
        registry.insert(Box::new(BacktickRecognizer::new()?));
        registry.insert(Box::new(CogRecognizer));
        registry.insert(Box::new(TerminalRecognizer));
        Ok(registry)
    }

    /// Add a recognizer, keeping the set sorted by priority.
    pub fn insert(&mut self, recognizer: Box<dyn Recognizer>) {
        self.recognizers.push(recognizer);
        self.recognizers.sort_by_key(|r| r.priority());
    }

    pub fn recognizers(&self) -> &[Box<dyn Recognizer>] {
        &self.recognizers
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("recognizers", &self.recognizers.len()).finish()
    }
}

/// Where a text line ends within the scan window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineEnd {
    /// No terminator yet (or a trailing CR/LF that may still pair up).
    NotYet,
    /// `limit` bytes without a terminator.
    Overrun,
    /// Terminator found: `content` bytes of line, `total` bytes to consume.
    At { content: usize, total: usize },
}

/// Scan for a CR/LF/CRLF/LFCR terminator within `limit` bytes.
///
/// A lone CR or LF at the very end of the window reports `NotYet` because
/// the complementary byte of a two-byte terminator may still arrive.
pub(crate) fn find_line_end(window: &[u8], limit: usize) -> LineEnd {
    let scan = window.len().min(limit);
    for (i, &b) in window[..scan].iter().enumerate() {
        if !crate::message::is_eol(b) {
            continue;
        }
        let pair = if b == b'\r' { b'\n' } else { b'\r' };
        return match window.get(i + 1) {
            Some(&next) if next == pair => LineEnd::At { content: i, total: i + 2 },
            Some(_) => LineEnd::At { content: i, total: i + 1 },
            None => LineEnd::NotYet,
        };
    }
    if window.len() >= limit {
        LineEnd::Overrun
    } else {
        LineEnd::NotYet
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
