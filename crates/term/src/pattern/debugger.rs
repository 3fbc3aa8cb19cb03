// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recognizer for the 416-byte binary debugger packet.
//!
//! A core that hits a breakpoint takes the shared debug lock and emits one
//! packet, then blocks until the host acknowledges. The header carries the
//! cog id twice as little-endian u32; bytes 8..20 hold a non-zero
//! discriminator that separates real packets from idle-line zero runs.

use crate::message::{Metadata, MessageKind, PACKET_LEN};

use super::{Frame, Recognizer, Scan};

/// Sanity policy for packet headers.
///
/// The discriminator heuristic is deliberately a policy object: hardware
/// documents 8 cogs, but the id range stays configurable, and embedders can
/// tighten the content checks without touching the recognizer.
#[derive(Debug, Clone, Copy)]
pub struct PacketPolicy {
    /// Valid cog ids are `1..=cog_count`.
    pub cog_count: u32,
}

impl Default for PacketPolicy {
    fn default() -> Self {
        Self { cog_count: 8 }
    }
}

impl PacketPolicy {
    pub fn id_in_range(&self, id: u32) -> bool {
        id >= 1 && id <= self.cog_count
    }
}

pub struct DebuggerPacketRecognizer {
    policy: PacketPolicy,
}

impl DebuggerPacketRecognizer {
    pub fn new(policy: PacketPolicy) -> Self {
        Self { policy }
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

impl Recognizer for DebuggerPacketRecognizer {
    fn priority(&self) -> u8 {
        10
    }

    /// The id is a small LE u32, so byte 0 is the id and byte 1 must be 0.
    fn can_start_at(&self, b0: u8, b1: u8) -> bool {
        b1 == 0 && b0 >= 1 && u32::from(b0) <= self.policy.cog_count
    }

    fn validate(&self, window: &[u8]) -> Scan {
        if window.len() < 8 {
            return Scan::Incomplete;
        }
        let id = le_u32(&window[0..4]);
        if !self.policy.id_in_range(id) {
            return Scan::Invalid;
        }
        // The header repeats the id; a mismatch is noise, not a packet.
        if le_u32(&window[4..8]) != id {
            return Scan::Invalid;
        }

        if window.len() < 20 {
            return Scan::Incomplete;
        }
        if window[8..20].iter().all(|&b| b == 0) {
            return Scan::Invalid;
        }

        // Guard against idle-line zero runs being framed as a phantom
        // packet: a real packet never opens with 32 zero bytes.
        if window.len() >= 32 && window[..32].iter().all(|&b| b == 0) {
            return Scan::Invalid;
        }

        if window.len() < PACKET_LEN {
            return Scan::Incomplete;
        }

        Scan::Complete(Frame {
            len: PACKET_LEN,
            kind: MessageKind::Debugger,
            meta: Metadata::Debugger { cog_id: id },
        })
    }
}

#[cfg(test)]
#[path = "debugger_tests.rs"]
mod tests;
