// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// DTR control-line transition observed by the host side of the link.
///
/// The core never drives DTR; it only reacts to edges. A rising edge is a
/// device-reset request, a falling edge is recorded but triggers nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtrEdge {
    High,
    Low,
}

/// Signal from the router to the response arbiter: a debugger packet was
/// dispatched and the sending core is blocked on the host reply.
#[derive(Debug, Clone, Copy)]
pub struct PacketSignal {
    pub cog_id: u32,
    /// When the packet was extracted; used to flag replies that miss the
    /// response window.
    pub arrived: Instant,
}
