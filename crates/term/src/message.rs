// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed messages extracted from the P2 byte stream.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Wire length of a binary debugger packet.
pub const PACKET_LEN: usize = 416;

/// Wire length of the host acknowledgement sent after each debugger packet.
pub const RESPONSE_LEN: usize = 52;

/// Classification of an extracted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Text line beginning with `Cog<digit> ` — per-core diagnostic output.
    Cog,
    /// Text line beginning with a backtick — window create/update directive.
    Backtick,
    /// Fixed-size binary debugger packet from a core awaiting a host reply.
    Debugger,
    /// Any other printable-dominant text line.
    Terminal,
    /// Reserved; never produced by the extractor.
    Unknown,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cog => "cog",
            Self::Backtick => "backtick",
            Self::Debugger => "debugger",
            Self::Terminal => "terminal",
            Self::Unknown => "unknown",
        }
    }

    /// True for kinds whose payload is a text line (EOL bytes are stripped).
    pub fn is_text(&self) -> bool {
        !matches!(self, Self::Debugger)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auxiliary display surfaces a backtick directive can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    Logic,
    Scope,
    Term,
    Plot,
    /// Per-cog debugger surface; opened by packet traffic, not by directive.
    Debugger,
}

impl WindowType {
    /// Map a directive head to the window type it creates.
    ///
    /// Only the four displayable surfaces are creatable from the wire; the
    /// debugger surface is keyed by cog id instead.
    pub fn from_directive(head: &str) -> Option<Self> {
        match head.to_ascii_uppercase().as_str() {
            "LOGIC" => Some(Self::Logic),
            "SCOPE" => Some(Self::Scope),
            "TERM" => Some(Self::Term),
            "PLOT" => Some(Self::Plot),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Logic => "logic",
            Self::Scope => "scope",
            Self::Term => "term",
            Self::Plot => "plot",
            Self::Debugger => "debugger",
        }
    }
}

/// Per-kind metadata attached to an extracted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Metadata {
    None,
    /// The digit following the `Cog` prefix.
    Cog { cog: u8 },
    /// First token after the backtick, plus the target name when the head is
    /// a window-creation directive.
    Backtick { directive: String, target: Option<String> },
    /// COG id from the duplicated packet header.
    Debugger { cog_id: u32 },
}

/// One extracted message.
///
/// The payload is a cheaply-cloneable handle; fanning a message out to N
/// destinations never copies the bytes again.
#[derive(Debug, Clone)]
pub struct Message {
    pub kind: MessageKind,
    pub payload: Bytes,
    /// Microseconds since the extractor's monotonic epoch.
    pub timestamp_us: u64,
    pub meta: Metadata,
}

impl Message {
    /// Payload as text for display/logging (text kinds only carry ASCII).
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// True for the two EOL bytes (CR, LF).
pub fn is_eol(b: u8) -> bool {
    b == b'\r' || b == b'\n'
}

/// Strip all trailing EOL bytes. Idempotent; handles CR, LF, CRLF, and LFCR.
pub fn strip_eol(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && is_eol(line[end - 1]) {
        end -= 1;
    }
    &line[..end]
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
