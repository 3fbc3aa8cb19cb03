// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `p2term` binary with piped stdio: literal byte streams
//! go in on stdin, host acknowledgements come back on stdout, and the
//! JSONL message log lands in a temporary directory.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// Resolve the path to the compiled `p2term` binary.
pub fn p2term_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("p2term")
}

/// A running `p2term` process that is killed on drop.
pub struct TermProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    log_dir: tempfile::TempDir,
}

impl TermProcess {
    /// Spawn with default configuration plus any extra flags.
    pub fn start(extra_args: &[&str]) -> anyhow::Result<Self> {
        let binary = p2term_binary();
        anyhow::ensure!(binary.exists(), "p2term binary not found at {}", binary.display());

        let log_dir = tempfile::tempdir()?;
        let mut child = Command::new(&binary)
            .arg("--log-dir")
            .arg(log_dir.path())
            .args(["--log-format", "text", "--log-level", "warn"])
            .args(extra_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        Ok(Self { child, stdin, stdout, log_dir })
    }

    /// Feed bytes to the inbound stream.
    pub async fn write(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            anyhow::bail!("stdin already closed");
        };
        stdin.write_all(bytes).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Close stdin — the binary treats this as end of the inbound stream,
    /// drains, and exits.
    pub fn close_stdin(&mut self) {
        self.stdin = None;
    }

    /// Read exactly `n` bytes from stdout within `timeout`.
    pub async fn read_exact(&mut self, n: usize, timeout: Duration) -> anyhow::Result<Vec<u8>> {
        let Some(stdout) = self.stdout.as_mut() else {
            anyhow::bail!("stdout already taken");
        };
        let mut buf = vec![0u8; n];
        match tokio::time::timeout(timeout, stdout.read_exact(&mut buf)).await {
            Ok(Ok(_)) => Ok(buf),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => anyhow::bail!("timed out reading {n} bytes from stdout"),
        }
    }

    /// Read whatever remains on stdout until EOF.
    pub async fn read_to_end(&mut self, timeout: Duration) -> anyhow::Result<Vec<u8>> {
        let Some(mut stdout) = self.stdout.take() else {
            anyhow::bail!("stdout already taken");
        };
        let mut buf = Vec::new();
        match tokio::time::timeout(timeout, stdout.read_to_end(&mut buf)).await {
            Ok(Ok(_)) => Ok(buf),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => anyhow::bail!("timed out draining stdout"),
        }
    }

    /// Deliver a signal to the process (e.g. "USR1" for a DTR rising edge).
    pub async fn signal(&self, name: &str) -> anyhow::Result<()> {
        let Some(pid) = self.child.id() else {
            anyhow::bail!("process already exited");
        };
        let status = Command::new("kill")
            .arg(format!("-{name}"))
            .arg(pid.to_string())
            .status()
            .await?;
        anyhow::ensure!(status.success(), "kill -{name} {pid} failed");
        Ok(())
    }

    /// Wait for the process to exit within `timeout`.
    pub async fn wait_exit(&mut self, timeout: Duration) -> anyhow::Result<std::process::ExitStatus> {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => Ok(status?),
            Err(_) => anyhow::bail!("p2term did not exit within {timeout:?}"),
        }
    }

    pub fn log_dir(&self) -> &Path {
        self.log_dir.path()
    }

    /// Parse a JSONL log file from the log directory.
    pub fn read_log(&self, name: &str) -> Vec<serde_json::Value> {
        let contents = std::fs::read_to_string(self.log_dir.path().join(name)).unwrap_or_default();
        contents.lines().filter_map(|line| serde_json::from_str(line).ok()).collect()
    }

    /// Poll until `name` exists in the log directory (or time out).
    pub async fn wait_for_file(&self, name: &str, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let path = self.log_dir.path().join(name);
        loop {
            if path.exists() {
                return Ok(());
            }
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("{name} never appeared in {}", self.log_dir.path().display());
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}
