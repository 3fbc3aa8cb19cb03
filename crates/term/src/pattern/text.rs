// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fallback recognizer: any printable-dominant text line.

use crate::message::{Metadata, MessageKind};

use super::{find_line_end, Frame, LineEnd, Recognizer, Scan, TEXT_SCAN_LIMIT};

/// Fraction of bytes that must be printable for a run to count as text.
const DOMINANCE: f64 = 0.95;

/// Partial windows at least this long are eligible for early rejection, so
/// binary junk does not stall the scan waiting for a terminator.
const EARLY_REJECT_LEN: usize = 16;

/// TAB, CR, LF, or visible ASCII.
fn is_printable(b: u8) -> bool {
    matches!(b, 0x09 | 0x0A | 0x0D) || (0x20..=0x7E).contains(&b)
}

/// True when ≥ 95% of the run is printable.
fn printable_dominant(run: &[u8]) -> bool {
    if run.is_empty() {
        return true;
    }
    let printable = run.iter().filter(|&&b| is_printable(b)).count();
    (printable as f64) >= DOMINANCE * (run.len() as f64)
}

pub struct TerminalRecognizer;

impl Recognizer for TerminalRecognizer {
    fn priority(&self) -> u8 {
        40
    }

    fn can_start_at(&self, _b0: u8, _b1: u8) -> bool {
        true
    }

    fn validate(&self, window: &[u8]) -> Scan {
        match find_line_end(window, TEXT_SCAN_LIMIT) {
            LineEnd::At { content, total } => {
                if printable_dominant(&window[..content]) {
                    Scan::Complete(Frame {
                        len: total,
                        kind: MessageKind::Terminal,
                        meta: Metadata::None,
                    })
                } else {
                    Scan::Invalid
                }
            }
            LineEnd::Overrun => Scan::Invalid,
            LineEnd::NotYet => {
                // A run opening with a non-printable byte can never become a
                // text line; rejecting now lets the scan advance instead of
                // stalling on byte streams that carry no terminator at all.
                if window.first().is_some_and(|&b| !is_printable(b)) {
                    return Scan::Invalid;
                }
                if window.len() >= EARLY_REJECT_LEN && !printable_dominant(window) {
                    return Scan::Invalid;
                }
                Scan::Incomplete
            }
        }
    }
}

#[cfg(test)]
#[path = "text_tests.rs"]
mod tests;
