// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `p2term` binary and exercise
//! the stdio wire: text lines, debugger packets and their acknowledgements,
//! backtick directives, and signal-driven resets.

use std::time::Duration;

use p2term::message::RESPONSE_LEN;
use p2term::test_support::packet_bytes;
use p2term_specs::TermProcess;

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn cog_line_is_logged_without_response() -> anyhow::Result<()> {
    let mut term = TermProcess::start(&[])?;

    term.write(b"Cog0  INIT $0000_0000 $0000_0000 load\r\n").await?;
    term.close_stdin();

    let status = term.wait_exit(TIMEOUT).await?;
    assert!(status.success());

    // No packet, no acknowledgement on the wire.
    let leftover = term.read_to_end(TIMEOUT).await?;
    assert!(leftover.is_empty());

    let entries = term.read_log("messages.jsonl");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["kind"], "cog");
    assert_eq!(entries[0]["cog"], 0);
    assert_eq!(entries[0]["text"], "Cog0  INIT $0000_0000 $0000_0000 load");
    Ok(())
}

#[tokio::test]
async fn debugger_packet_is_acknowledged() -> anyhow::Result<()> {
    let mut term = TermProcess::start(&[])?;

    // A text line split mid-stream, then a full packet from cog 1.
    term.write(b"Cog1 waiting at break").await?;
    let mut rest = b"point\r\n".to_vec();
    rest.extend_from_slice(&packet_bytes(1, 0xAB));
    term.write(&rest).await?;

    let ack = term.read_exact(RESPONSE_LEN, TIMEOUT).await?;
    assert_eq!(ack.len(), RESPONSE_LEN);
    assert!(ack.iter().all(|&b| b == 0));

    term.close_stdin();
    let status = term.wait_exit(TIMEOUT).await?;
    assert!(status.success());

    let entries = term.read_log("messages.jsonl");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["kind"], "cog");
    assert_eq!(entries[1]["kind"], "debugger");
    assert_eq!(entries[1]["cog_id"], 1);
    Ok(())
}

#[tokio::test]
async fn idle_zero_runs_are_not_packets() -> anyhow::Result<()> {
    let mut term = TermProcess::start(&[])?;

    term.write(&[0u8; 512]).await?;
    term.close_stdin();

    let status = term.wait_exit(TIMEOUT).await?;
    assert!(status.success());

    // No phantom packet, no acknowledgement.
    let leftover = term.read_to_end(TIMEOUT).await?;
    assert!(leftover.is_empty());
    assert!(term.read_log("messages.jsonl").is_empty());
    Ok(())
}

#[tokio::test]
async fn sigusr1_rotates_the_message_log() -> anyhow::Result<()> {
    let mut term = TermProcess::start(&[])?;

    term.write(b"Cog0 before reset\r\n").await?;
    term.wait_for_file("messages.jsonl", TIMEOUT).await?;
    // Give the line time to be extracted and appended.
    tokio::time::sleep(Duration::from_millis(100)).await;

    term.signal("USR1").await?;
    term.wait_for_file("messages.001.jsonl", TIMEOUT).await?;

    term.write(b"Cog0 after reset\r\n").await?;
    term.close_stdin();
    let status = term.wait_exit(TIMEOUT).await?;
    assert!(status.success());

    let rotated = term.read_log("messages.001.jsonl");
    assert_eq!(rotated.len(), 1);
    assert_eq!(rotated[0]["text"], "Cog0 before reset");

    let active = term.read_log("messages.jsonl");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["text"], "Cog0 after reset");
    Ok(())
}

#[tokio::test]
async fn backtick_directives_are_classified() -> anyhow::Result<()> {
    let mut term = TermProcess::start(&[])?;

    term.write(b"`LOGIC MyLogic SAMPLES 32 'Low' 3 'Mid' 2 'High'\r\n").await?;
    term.write(b"`MyLogic 7\r\n").await?;
    term.close_stdin();

    let status = term.wait_exit(TIMEOUT).await?;
    assert!(status.success());

    let entries = term.read_log("messages.jsonl");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["kind"], "backtick");
    assert_eq!(entries[0]["directive"], "LOGIC");
    assert_eq!(entries[0]["target"], "MyLogic");
    assert_eq!(entries[1]["directive"], "MyLogic");
    assert!(entries[1].get("target").is_none());
    Ok(())
}

#[tokio::test]
async fn back_to_back_packets_get_two_acks() -> anyhow::Result<()> {
    let mut term = TermProcess::start(&[])?;

    let mut stream = packet_bytes(2, 0x11);
    stream.extend_from_slice(&packet_bytes(3, 0x22));
    term.write(&stream).await?;

    // Two debounced acknowledgements, 104 bytes total.
    let acks = term.read_exact(RESPONSE_LEN * 2, TIMEOUT).await?;
    assert!(acks.iter().all(|&b| b == 0));

    term.close_stdin();
    let status = term.wait_exit(TIMEOUT).await?;
    assert!(status.success());

    let entries = term.read_log("messages.jsonl");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["cog_id"], 2);
    assert_eq!(entries[1]["cog_id"], 3);
    Ok(())
}

#[tokio::test]
async fn sigterm_shuts_down() -> anyhow::Result<()> {
    let mut term = TermProcess::start(&[])?;
    term.write(b"still alive\r\n").await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    term.signal("TERM").await?;
    let status = term.wait_exit(TIMEOUT).await?;
    // Clean shutdown path, not a signal death.
    assert_eq!(status.code(), Some(0));
    Ok(())
}

#[tokio::test]
async fn mixed_stream_keeps_order() -> anyhow::Result<()> {
    let mut term = TermProcess::start(&[])?;

    let mut stream = Vec::new();
    stream.extend_from_slice(b"boot banner\r\n");
    stream.extend_from_slice(b"`TERM Console SIZE 40 20\r\n");
    stream.extend_from_slice(&packet_bytes(5, 0x55));
    stream.extend_from_slice(b"Cog5 breakpoint hit\r\n");
    term.write(&stream).await?;

    let _ack = term.read_exact(RESPONSE_LEN, TIMEOUT).await?;
    term.close_stdin();
    let status = term.wait_exit(TIMEOUT).await?;
    assert!(status.success());

    let kinds: Vec<String> = term
        .read_log("messages.jsonl")
        .iter()
        .filter_map(|e| e["kind"].as_str().map(str::to_owned))
        .collect();
    assert_eq!(kinds, vec!["terminal", "backtick", "debugger", "cog"]);
    Ok(())
}
