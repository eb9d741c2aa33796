// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// CRC-16/CCITT properties independent of framing (§8 invariants 3, 4).

use erpc_rs::crc16::Crc16;

#[test]
fn known_vector_matches_ccitt_reference() {
    // "123456789" is the standard CRC-16/CCITT-FALSE conformance vector
    // for seed 0xFFFF.
    let crc = Crc16::new(0xFFFF);
    assert_eq!(crc.compute(b"123456789"), 0x29B1);
}

#[test]
fn every_single_bit_flip_in_a_message_is_detected() {
    let crc = Crc16::new(0xEF4A);
    let message = b"the arbitrator demultiplexes replies by sequence".to_vec();
    let base = crc.compute(&message);

    for byte_index in 0..message.len() {
        for bit in 0..8 {
            let mut flipped = message.clone();
            flipped[byte_index] ^= 1 << bit;
            assert_ne!(
                crc.compute(&flipped),
                base,
                "undetected flip at byte {byte_index} bit {bit}"
            );
        }
    }
}

#[test]
fn seed_acts_as_a_build_fingerprint() {
    let payload = b"invocation";
    let a = Crc16::new(0x1234).compute(payload);
    let b = Crc16::new(0x5678).compute(payload);
    assert_ne!(a, b, "two builds with different IDL fingerprints must diverge");
}
