// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Debug terminal ingestion core for the Parallax Propeller 2.
#[derive(Debug, Clone, Parser)]
#[command(name = "p2term", version, about)]
pub struct Config {
    /// Directory for the message log (omit to disable file logging).
    #[arg(long, env = "P2TERM_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Ingest ring capacity in bytes.
    #[arg(long, env = "P2TERM_RING_CAPACITY", default_value = "1048576")]
    pub ring_capacity: usize,

    /// Pre-allocated message pool records.
    #[arg(long, env = "P2TERM_POOL_SIZE", default_value = "100")]
    pub pool_size: usize,

    /// Zero bytes swallowed after a debugger packet.
    #[arg(long, env = "P2TERM_ZERO_SKIP_CAP", default_value = "256")]
    pub zero_skip_cap: usize,

    /// Number of cogs (valid debugger packet ids are 1..=cog-count).
    #[arg(long, env = "P2TERM_COG_COUNT", default_value = "8")]
    pub cog_count: u32,

    /// Minimum gap between debugger acknowledgements, in milliseconds.
    #[arg(long, env = "P2TERM_RESPONSE_DEBOUNCE_MS", default_value = "5")]
    pub response_debounce_ms: u64,

    /// Advisory response window after a debugger packet, in milliseconds.
    #[arg(long, env = "P2TERM_RESPONSE_WINDOW_MS", default_value = "100")]
    pub response_window_ms: u64,

    /// DTR edges within this window coalesce into one reset, milliseconds.
    #[arg(long, env = "P2TERM_RESET_COALESCE_MS", default_value = "250")]
    pub reset_coalesce_ms: u64,

    /// How long a reset waits for destination drain, in milliseconds.
    #[arg(long, env = "P2TERM_DRAIN_TIMEOUT_MS", default_value = "2000")]
    pub drain_timeout_ms: u64,

    /// Fast / mid / slow pacer periods, in milliseconds.
    #[arg(long, env = "P2TERM_PACER_FAST_MS", default_value = "2")]
    pub pacer_fast_ms: u64,

    #[arg(long, env = "P2TERM_PACER_MID_MS", default_value = "5")]
    pub pacer_mid_ms: u64,

    #[arg(long, env = "P2TERM_PACER_SLOW_MS", default_value = "20")]
    pub pacer_slow_ms: u64,

    /// Queued messages that force a non-immediate destination to flush.
    #[arg(long, env = "P2TERM_FLUSH_WATERMARK", default_value = "7")]
    pub flush_watermark: usize,

    /// Messages a typed window retains for snapshots.
    #[arg(long, env = "P2TERM_WINDOW_BACKLOG", default_value = "512")]
    pub window_backlog: usize,

    /// Log format (json or text).
    #[arg(long, env = "P2TERM_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "P2TERM_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ring_capacity < 4096 {
            anyhow::bail!("--ring-capacity must be at least 4096 bytes");
        }
        if self.pool_size == 0 {
            anyhow::bail!("--pool-size must be at least 1");
        }
        if self.cog_count == 0 || self.cog_count > 16 {
            anyhow::bail!("--cog-count must be in 1..=16");
        }
        if self.flush_watermark == 0 {
            anyhow::bail!("--flush-watermark must be at least 1");
        }
        if self.pacer_fast_ms == 0 {
            anyhow::bail!("--pacer-fast-ms must be non-zero");
        }
        if self.pacer_fast_ms > self.pacer_mid_ms || self.pacer_mid_ms > self.pacer_slow_ms {
            anyhow::bail!("pacer periods must satisfy fast <= mid <= slow");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("unknown log format: {other}"),
        }
        Ok(())
    }

    pub fn response_debounce(&self) -> Duration {
        Duration::from_millis(self.response_debounce_ms)
    }

    pub fn response_window(&self) -> Duration {
        Duration::from_millis(self.response_window_ms)
    }

    pub fn reset_coalesce(&self) -> Duration {
        Duration::from_millis(self.reset_coalesce_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn pacer_periods(&self) -> [Duration; 3] {
        [
            Duration::from_millis(self.pacer_fast_ms),
            Duration::from_millis(self.pacer_mid_ms),
            Duration::from_millis(self.pacer_slow_ms),
        ]
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_from(["p2term"])
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
