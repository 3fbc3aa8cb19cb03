// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transient fault vocabulary for structured warnings and counters.
///
/// None of these abort ingestion: each is absorbed at the layer it occurs
/// and leaves only a counter bump and a log line behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    /// Ring full; the incoming span was dropped.
    Overflow,
    /// No free pooled record after the retry budget.
    PoolExhausted,
    /// A recognizer rejected the bytes at the scan position.
    MalformedFrame,
    /// Destination id unknown or its handle was dropped.
    DestinationLost,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overflow => "OVERFLOW",
            Self::PoolExhausted => "POOL_EXHAUSTED",
            Self::MalformedFrame => "MALFORMED_FRAME",
            Self::DestinationLost => "DESTINATION_LOST",
        }
    }

    /// All current faults are transient; kept explicit so new variants must
    /// take a position.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Overflow | Self::PoolExhausted | Self::MalformedFrame | Self::DestinationLost => {
                true
            }
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
