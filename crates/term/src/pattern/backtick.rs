// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recognizer for backtick window directives.
//!
//! A line opening with 0x60 either creates an auxiliary display surface
//! (`` `LOGIC MyLogic SAMPLES 32 … ``) or feeds an existing one by name
//! (`` `MyLogic 7 ``). Only the head and target are parsed here — the
//! directive body is routed opaquely to its window.

use regex::Regex;

use crate::message::{Metadata, MessageKind, WindowType};

use super::{find_line_end, Frame, LineEnd, Recognizer, Scan, TEXT_SCAN_LIMIT};

pub struct BacktickRecognizer {
    head_re: Regex,
}

impl BacktickRecognizer {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self { head_re: Regex::new(r"^`\s*(\S+)(?:\s+(\S+))?")? })
    }

    /// Split a terminator-free directive line into (head, target).
    ///
    /// The target is only meaningful for creation heads; update lines carry
    /// the window name as their head.
    fn parse(&self, content: &[u8]) -> (String, Option<String>) {
        let line = String::from_utf8_lossy(content);
        let Some(caps) = self.head_re.captures(&line) else {
            return (String::new(), None);
        };
        let head = caps.get(1).map(|m| m.as_str().trim().to_owned()).unwrap_or_default();
        let target = if WindowType::from_directive(&head).is_some() {
            caps.get(2).map(|m| m.as_str().trim().to_owned())
        } else {
            None
        };
        (head, target)
    }
}

impl Recognizer for BacktickRecognizer {
    fn priority(&self) -> u8 {
        20
    }

    fn can_start_at(&self, b0: u8, _b1: u8) -> bool {
        b0 == 0x60
    }

    fn validate(&self, window: &[u8]) -> Scan {
        match find_line_end(window, TEXT_SCAN_LIMIT) {
            LineEnd::NotYet => Scan::Incomplete,
            LineEnd::Overrun => Scan::Invalid,
            LineEnd::At { content, total } => {
                let (directive, target) = self.parse(&window[..content]);
                Scan::Complete(Frame {
                    len: total,
                    kind: MessageKind::Backtick,
                    meta: Metadata::Backtick { directive, target },
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "backtick_tests.rs"]
mod tests;
