// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recognizer for `Cog<digit> ` diagnostic lines.

use crate::message::{Metadata, MessageKind};

use super::{find_line_end, Frame, LineEnd, Recognizer, Scan, TEXT_SCAN_LIMIT};

pub struct CogRecognizer;

impl Recognizer for CogRecognizer {
    fn priority(&self) -> u8 {
        30
    }

    fn can_start_at(&self, b0: u8, b1: u8) -> bool {
        b0 == b'C' && b1 == b'o'
    }

    fn validate(&self, window: &[u8]) -> Scan {
        // Full prefix is `Cog`, a decimal digit, then whitespace.
        const PREFIX_LEN: usize = 5;
        for (i, &expect) in [b'C', b'o', b'g'].iter().enumerate() {
            match window.get(i) {
                Some(&b) if b == expect => {}
                Some(_) => return Scan::Invalid,
                None => return Scan::Incomplete,
            }
        }
        let cog = match window.get(3) {
            Some(&b) if b.is_ascii_digit() => b - b'0',
            Some(_) => return Scan::Invalid,
            None => return Scan::Incomplete,
        };
        match window.get(4) {
            Some(&b' ') | Some(&b'\t') => {}
            Some(_) => return Scan::Invalid,
            None => return Scan::Incomplete,
        }
        debug_assert!(window.len() >= PREFIX_LEN);

        match find_line_end(window, TEXT_SCAN_LIMIT) {
            LineEnd::NotYet => Scan::Incomplete,
            LineEnd::Overrun => Scan::Invalid,
            LineEnd::At { content: _, total } => Scan::Complete(Frame {
                len: total,
                kind: MessageKind::Cog,
                meta: Metadata::Cog { cog },
            }),
        }
    }
}

#[cfg(test)]
#[path = "cog_tests.rs"]
mod tests;
