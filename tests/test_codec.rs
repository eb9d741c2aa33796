// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Codec round-trip and sticky-status properties (§8 invariants 1, 7, 8),
// exercised through the public API rather than `#[cfg(test)]` internals.

use erpc_rs::buffer::MessageBuffer;
use erpc_rs::codec::{Codec, MessageType};
use erpc_rs::error::Error;

#[test]
fn e1_single_integer_round_trip() {
    let mut w = Codec::new();
    w.set_buffer(MessageBuffer::with_capacity(64));
    w.start_write_message(MessageType::Invocation, 2, 5, 7);
    w.write_i32(-123456);
    assert!(w.is_ok());

    let mut r = Codec::new();
    r.set_buffer(w.buffer().clone());
    let (ty, service, method, sequence) = r.start_read_message().unwrap();
    assert_eq!(ty, MessageType::Invocation);
    assert_eq!((service, method, sequence), (2, 5, 7));
    assert_eq!(r.read_i32(), Some(-123456));
}

#[test]
fn mixed_aggregate_round_trip() {
    let mut w = Codec::new();
    w.set_buffer(MessageBuffer::with_capacity(128));
    w.start_write_message(MessageType::Invocation, 1, 1, 1);
    w.write_string("hello erpc");
    w.write_list_header(3);
    for v in [1u32, 2, 3] {
        w.write_u32(v);
    }
    w.write_null_flag(true);
    w.write_union_discriminant(-1);
    assert!(w.is_ok());

    let mut r = Codec::new();
    r.set_buffer(w.buffer().clone());
    r.start_read_message().unwrap();
    assert_eq!(r.read_string(), Some("hello erpc".to_owned()));
    let len = r.read_list_header().unwrap();
    let items: Vec<u32> = (0..len).map(|_| r.read_u32().unwrap()).collect();
    assert_eq!(items, vec![1, 2, 3]);
    assert_eq!(r.read_null_flag(), Some(true));
    assert_eq!(r.read_union_discriminant(), Some(-1));
    assert!(r.is_ok());
}

#[test]
fn write_after_error_does_not_advance_used() {
    let mut c = Codec::new();
    c.set_buffer(MessageBuffer::with_capacity(4));
    c.write_u64(1); // overruns immediately
    assert!(!c.is_ok());
    let used_before = c.buffer().used();
    c.write_u8(9);
    c.write_string("ignored");
    assert_eq!(c.buffer().used(), used_before);
    assert_eq!(c.status(), Err(Error::BufferOverrun));
}

#[test]
fn reset_is_idempotent_and_reads_start_at_offset() {
    let mut c = Codec::new();
    c.set_buffer(MessageBuffer::with_capacity(32));
    c.reset(8);
    c.write_u32(42);
    let after_first_reset = (c.buffer().used(),);
    c.reset(8);
    assert_eq!((c.buffer().used(),), after_first_reset);

    c.write_u32(42);
    let mut r = Codec::new();
    r.set_buffer(c.buffer().clone());
    r.start_read_at(8);
    assert_eq!(r.read_u32(), Some(42));
}
