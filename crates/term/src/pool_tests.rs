// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::text_message;

fn acquire(pool: &MessagePool, text: &str, consumers: u32) -> Vec<PooledMessage> {
    match pool.try_acquire(text_message(text), consumers) {
        Ok(handles) => handles,
        Err(_) => panic!("pool unexpectedly exhausted"),
    }
}

#[test]
fn acquire_mints_one_handle_per_consumer() {
    let pool = MessagePool::new(4);
    let handles = acquire(&pool, "hello", 3);

    assert_eq!(handles.len(), 3);
    assert_eq!(handles[0].consumer_total(), 3);
    assert_eq!(handles[0].consumers_remaining(), 3);
    assert_eq!(pool.free_slots(), 3);

    for handle in &handles {
        assert_eq!(&handle.payload()[..], b"hello");
    }
}

#[test]
fn slot_recycles_after_last_release() {
    let pool = MessagePool::new(1);
    let mut handles = acquire(&pool, "one", 2);
    assert_eq!(pool.free_slots(), 0);

    drop(handles.pop());
    assert_eq!(pool.free_slots(), 0);

    drop(handles.pop());
    assert_eq!(pool.free_slots(), 1);

    // The slot is usable again.
    assert!(pool.try_acquire(text_message("two"), 1).is_ok());
}

#[test]
fn exhaustion_returns_message_without_blocking() {
    let pool = MessagePool::new(2);
    let a = acquire(&pool, "a", 1);
    let _b = acquire(&pool, "b", 1);

    let refused = pool.try_acquire(text_message("c"), 1);
    match refused {
        Err(message) => assert_eq!(&message.payload[..], b"c"),
        Ok(_) => panic!("expected exhaustion"),
    }

    drop(a);
    assert!(pool.try_acquire(text_message("c"), 1).is_ok());
}

#[test]
fn zero_consumers_takes_no_slot() {
    let pool = MessagePool::new(1);
    let handles = pool.try_acquire(text_message("x"), 0);
    assert_eq!(handles.map(|h| h.len()).ok(), Some(0));
    assert_eq!(pool.free_slots(), 1);
}

#[test]
fn payload_is_shared_not_copied() {
    let pool = MessagePool::new(2);
    let message = text_message("shared payload bytes");
    let payload = message.payload.clone();
    let handles = match pool.try_acquire(message, 2) {
        Ok(handles) => handles,
        Err(_) => panic!("pool unexpectedly exhausted"),
    };

    // Same backing allocation on every handle.
    assert_eq!(handles[0].payload().as_ptr(), payload.as_ptr());
    assert_eq!(handles[1].payload().as_ptr(), payload.as_ptr());
}

#[test]
fn handles_released_across_threads() {
    let pool = MessagePool::new(8);
    let handles = acquire(&pool, "threaded", 4);

    let joins: Vec<_> = handles
        .into_iter()
        .map(|handle| {
            std::thread::spawn(move || {
                assert_eq!(&handle.payload()[..], b"threaded");
            })
        })
        .collect();
    for join in joins {
        assert!(join.join().is_ok());
    }
    assert_eq!(pool.free_slots(), 8);
}

#[test]
fn record_accessors_reflect_the_stored_message() {
    let pool = MessagePool::new(1);
    let handles = acquire(&pool, "status", 1);

    assert_eq!(handles[0].kind(), crate::message::MessageKind::Terminal);
    assert_eq!(handles[0].meta(), crate::message::Metadata::None);
    assert!(handles[0].message().is_some());
}
