// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::Ordering;

use proptest::prelude::*;

use super::*;
use crate::message::{Metadata, PACKET_LEN};
use crate::test_support::{ingest_harness, packet_bytes, IngestHarness};

#[test]
fn single_cog_line() {
    let IngestHarness { producer, mut extractor, .. } = ingest_harness();
    assert!(producer.push(b"Cog0  INIT $0000_0000 $0000_0000 load\r\n").is_ok());

    let messages = extractor.poll();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].kind, MessageKind::Cog);
    assert_eq!(&messages[0].payload[..], b"Cog0  INIT $0000_0000 $0000_0000 load");
    assert_eq!(messages[0].meta, Metadata::Cog { cog: 0 });
    assert_eq!(extractor.consumer().available(), 0);
}

#[test]
fn partial_line_completes_before_packet() {
    let IngestHarness { producer, mut extractor, .. } = ingest_harness();

    // First push ends mid-line: nothing can be framed yet.
    assert!(producer.push(b"Cog1 loading image, part").is_ok());
    assert!(extractor.poll().is_empty());

    // Completion plus a full debugger packet arrive together.
    let mut rest = b" two done\r\n".to_vec();
    rest.extend_from_slice(&packet_bytes(1, 0xAA));
    assert!(producer.push(&rest).is_ok());

    let messages = extractor.poll();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].kind, MessageKind::Cog);
    assert_eq!(&messages[0].payload[..], b"Cog1 loading image, part two done");
    assert_eq!(messages[1].kind, MessageKind::Debugger);
    assert_eq!(messages[1].meta, Metadata::Debugger { cog_id: 1 });
    assert_eq!(messages[1].payload.len(), PACKET_LEN);
    assert!(extractor.just_processed_packet());
}

#[test]
fn idle_zeros_after_packet_are_swallowed() {
    let h = ingest_harness();
    let IngestHarness { producer, mut extractor, stats } = h;

    assert!(producer.push(&packet_bytes(2, 0x11)).is_ok());
    assert_eq!(extractor.poll().len(), 1);

    let mut tail = vec![0u8; 100];
    tail.extend_from_slice(b"Cog2 resumed\r\n");
    assert!(producer.push(&tail).is_ok());

    let messages = extractor.poll();
    assert_eq!(messages.len(), 1);
    assert_eq!(&messages[0].payload[..], b"Cog2 resumed");
    assert_eq!(stats.bytes_skipped_zero.load(Ordering::Relaxed), 100);
}

#[test]
fn zero_skip_is_capped() {
    let h = ingest_harness();
    let IngestHarness { producer, mut extractor, stats } = h;

    let mut stream = packet_bytes(1, 0x11);
    stream.extend(vec![0u8; 300]);
    stream.extend_from_slice(&packet_bytes(2, 0x22));
    assert!(producer.push(&stream).is_ok());

    let messages = extractor.poll();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].meta, Metadata::Debugger { cog_id: 2 });
    // Only the capped run is charged to the filter; the remainder is shed
    // byte-by-byte by the scan loop.
    assert_eq!(stats.bytes_skipped_zero.load(Ordering::Relaxed), 256);
    assert_eq!(extractor.consumer().available(), 0);
}

#[test]
fn zero_runs_without_a_packet_never_frame() {
    let h = ingest_harness();
    let IngestHarness { producer, mut extractor, stats } = h;

    assert!(producer.push(&vec![0u8; 512]).is_ok());
    let messages = extractor.poll();

    assert!(messages.is_empty());
    assert_eq!(extractor.consumer().available(), 0);
    assert_eq!(stats.debugger_packets.load(Ordering::Relaxed), 0);
    assert_eq!(stats.bytes_skipped_zero.load(Ordering::Relaxed), 0);
}

#[test]
fn back_to_back_packets() {
    let IngestHarness { producer, mut extractor, .. } = ingest_harness();

    let mut stream = packet_bytes(3, 0x33);
    stream.extend_from_slice(&packet_bytes(4, 0x44));
    assert!(producer.push(&stream).is_ok());

    let messages = extractor.poll();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].meta, Metadata::Debugger { cog_id: 3 });
    assert_eq!(messages[1].meta, Metadata::Debugger { cog_id: 4 });
    assert!(extractor.just_processed_packet());
}

#[yare::parameterized(
    crlf = { "\r\n" },
    lfcr = { "\n\r" },
    cr = { "\r" },
    lf = { "\n" },
)]
fn trailing_eol_is_stripped(eol: &str) {
    let IngestHarness { producer, mut extractor, .. } = ingest_harness();
    // The trailing byte pins the final terminator down: a lone CR or LF at
    // the very end of the buffer would otherwise wait for a possible pair.
    let line = format!("status ok{eol}next line{eol}Z");
    assert!(producer.push(line.as_bytes()).is_ok());

    let messages = extractor.poll();
    assert_eq!(messages.len(), 2);
    for message in &messages {
        assert!(!message.payload.last().is_some_and(|&b| b == b'\r' || b == b'\n'));
    }
    assert_eq!(&messages[0].payload[..], b"status ok");
    assert_eq!(&messages[1].payload[..], b"next line");
    // Only the pinning byte remains.
    assert_eq!(extractor.consumer().available(), 1);
}

#[test]
fn backtick_directive_metadata() {
    let IngestHarness { producer, mut extractor, .. } = ingest_harness();
    assert!(producer.push(b"`LOGIC MyLogic SAMPLES 32 'Low' 3 'Mid' 2 'High'\r\n").is_ok());

    let messages = extractor.poll();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].kind, MessageKind::Backtick);
    assert_eq!(
        messages[0].meta,
        Metadata::Backtick { directive: "LOGIC".to_owned(), target: Some("MyLogic".to_owned()) }
    );
    assert_eq!(&messages[0].payload[..], b"`LOGIC MyLogic SAMPLES 32 'Low' 3 'Mid' 2 'High'");
}

#[test]
fn repolling_without_new_bytes_emits_nothing() {
    let IngestHarness { producer, mut extractor, .. } = ingest_harness();
    assert!(producer.push(b"line one\r\npartial tail").is_ok());

    assert_eq!(extractor.poll().len(), 1);
    assert!(extractor.poll().is_empty());
    assert!(extractor.poll().is_empty());
}

#[test]
fn clear_drops_partial_bytes_and_packet_flag() {
    let IngestHarness { producer, mut extractor, .. } = ingest_harness();

    assert!(producer.push(&packet_bytes(1, 0x11)).is_ok());
    assert_eq!(extractor.poll().len(), 1);
    assert!(extractor.just_processed_packet());

    assert!(producer.push(b"partial line without end").is_ok());
    extractor.clear();

    assert!(!extractor.just_processed_packet());
    assert_eq!(extractor.consumer().available(), 0);
    assert!(extractor.poll().is_empty());
}

#[test]
fn junk_prefix_is_shed_one_byte_at_a_time() {
    let IngestHarness { producer, mut extractor, .. } = ingest_harness();
    assert!(producer.push(b"ab\x00cd\r\n").is_ok());

    let messages = extractor.poll();
    assert_eq!(messages.len(), 1);
    assert_eq!(&messages[0].payload[..], b"cd");
}

#[test]
fn mixed_stream_preserves_byte_order() {
    let IngestHarness { producer, mut extractor, .. } = ingest_harness();

    let mut stream = Vec::new();
    stream.extend_from_slice(b"boot banner\r\n");
    stream.extend_from_slice(b"`TERM Console SIZE 40 20\r\n");
    stream.extend_from_slice(&packet_bytes(5, 0x55));
    stream.extend_from_slice(b"Cog5 breakpoint hit\r\n");
    assert!(producer.push(&stream).is_ok());

    let kinds: Vec<MessageKind> = extractor.poll().iter().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        vec![MessageKind::Terminal, MessageKind::Backtick, MessageKind::Debugger, MessageKind::Cog]
    );
}

proptest! {
    /// Arbitrary bytes never panic the extractor, and the cursor only moves
    /// forward.
    #[test]
    fn arbitrary_bytes_are_safe(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let IngestHarness { producer, mut extractor, .. } = ingest_harness();
        let _ = producer.push(&data);
        let _ = extractor.poll();
        prop_assert!(extractor.consumer().total_consumed() <= extractor.consumer().total_written());
    }

    /// Well-formed cog lines always round-trip in order.
    #[test]
    fn cog_lines_round_trip(bodies in proptest::collection::vec("[ -~]{0,40}", 0..16)) {
        let IngestHarness { producer, mut extractor, .. } = ingest_harness();
        let mut stream = Vec::new();
        let mut expected = Vec::new();
        for body in &bodies {
            let line = format!("Cog3 {body}");
            stream.extend_from_slice(line.as_bytes());
            stream.extend_from_slice(b"\r\n");
            expected.push(line);
        }
        prop_assume!(producer.push(&stream).is_ok());

        let messages = extractor.poll();
        prop_assert_eq!(messages.len(), expected.len());
        for (message, want) in messages.iter().zip(&expected) {
            prop_assert_eq!(message.kind, MessageKind::Cog);
            prop_assert_eq!(&message.payload[..], want.as_bytes());
        }
    }
}
