// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Adds a 6-byte CRC-protected frame header on top of a raw byte channel:
// crc_header(u16) | message_size(u16) | crc_body(u16), all little-endian.
// crc_header lets the receiver validate message_size before trusting it
// enough to read that many bytes — a corrupted length field would otherwise
// desynchronize the stream.

use super::raw::RawChannel;
use super::Transport;
use crate::buffer::MessageBuffer;
use crate::crc16::Crc16;
use crate::error::{Error, Result};

const HEADER_SIZE: usize = 6;

/// Wraps a [`RawChannel`] with CRC-framed message boundaries.
pub struct FramedTransport<C: RawChannel> {
    channel: C,
    crc: Crc16,
}

impl<C: RawChannel> FramedTransport<C> {
    /// The CRC is mandatory at construction — there is no way to end up
    /// with a framed transport that has "forgotten" to set one.
    pub fn new(channel: C, crc: Crc16) -> Self {
        Self { channel, crc }
    }

    /// Bytes a caller must reserve at the front of a buffer before encoding
    /// the payload, so the frame header can be filled in afterward.
    pub fn reserve_header_size() -> usize {
        HEADER_SIZE
    }

    pub fn into_inner(self) -> C {
        self.channel
    }
}

impl<C: RawChannel> Transport for FramedTransport<C> {
    fn receive(&mut self, message: &mut MessageBuffer) -> Result<()> {
        if message.capacity() < HEADER_SIZE {
            return Err(Error::MemoryError);
        }

        let mut header = [0u8; HEADER_SIZE];
        self.channel.raw_receive(&mut header)?;

        let crc_header = u16::from_le_bytes([header[0], header[1]]);
        let message_size = u16::from_le_bytes([header[2], header[3]]);
        let crc_body = u16::from_le_bytes([header[4], header[5]]);

        let expected_header_crc = self
            .crc
            .compute(&header[2..4])
            .wrapping_add(self.crc.compute(&header[4..6]));
        if expected_header_crc != crc_header {
            log::warn!("erpc: frame header CRC mismatch");
            return Err(Error::CrcCheckFailed);
        }

        let message_size = message_size as usize;
        if message_size + HEADER_SIZE > message.capacity() {
            return Err(Error::ReceiveFailed);
        }

        message.storage_mut()[..HEADER_SIZE].copy_from_slice(&header);
        message.set_used(HEADER_SIZE)?;

        let mut payload = vec![0u8; message_size];
        self.channel.raw_receive(&mut payload)?;
        message.storage_mut()[HEADER_SIZE..HEADER_SIZE + message_size].copy_from_slice(&payload);
        message.set_used(HEADER_SIZE + message_size)?;

        let computed_body_crc = self.crc.compute(&payload);
        if computed_body_crc != crc_body {
            log::warn!("erpc: frame body CRC mismatch, {message_size} byte payload");
            return Err(Error::CrcCheckFailed);
        }

        Ok(())
    }

    fn send(&mut self, message: &MessageBuffer) -> Result<()> {
        if message.used() < HEADER_SIZE {
            return Err(Error::MemoryError);
        }
        let payload = &message.payload()[HEADER_SIZE..];
        let message_size = payload.len() as u16;
        let crc_body = self.crc.compute(payload);
        let crc_header = self
            .crc
            .compute(&message_size.to_le_bytes())
            .wrapping_add(self.crc.compute(&crc_body.to_le_bytes()));

        let mut header = [0u8; HEADER_SIZE];
        header[0..2].copy_from_slice(&crc_header.to_le_bytes());
        header[2..4].copy_from_slice(&message_size.to_le_bytes());
        header[4..6].copy_from_slice(&crc_body.to_le_bytes());

        self.channel.raw_send(&header)?;
        self.channel.raw_send(payload)?;
        log::trace!("erpc: sent frame, {} byte payload", payload.len());
        Ok(())
    }

    fn has_message(&mut self) -> Result<bool> {
        self.channel.has_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::DuplexPipe;

    fn codec_payload(bytes: &[u8]) -> MessageBuffer {
        let mut buf = MessageBuffer::with_capacity(HEADER_SIZE + bytes.len());
        buf.storage_mut()[HEADER_SIZE..].copy_from_slice(bytes);
        buf.set_used(HEADER_SIZE + bytes.len()).unwrap();
        buf
    }

    #[test]
    fn round_trip_over_loopback() {
        let (a, b) = DuplexPipe::pair();
        let mut sender = FramedTransport::new(a, Crc16::new(0xEF4A));
        let mut receiver = FramedTransport::new(b, Crc16::new(0xEF4A));

        let payload = b"hello world";
        sender.send(&codec_payload(payload)).unwrap();

        let mut rx = MessageBuffer::with_capacity(64);
        receiver.receive(&mut rx).unwrap();
        assert_eq!(&rx.payload()[HEADER_SIZE..], payload);
    }

    #[test]
    fn mismatched_seed_fails_crc() {
        // Two builds whose IDL fingerprint (CRC seed) diverges must fail
        // closed on the very first frame rather than silently desync.
        let (a, b) = DuplexPipe::pair();
        let mut sender = FramedTransport::new(a, Crc16::new(0xEF4A));
        let mut receiver = FramedTransport::new(b, Crc16::new(0x0000));

        sender.send(&codec_payload(b"integrity")).unwrap();
        let mut rx = MessageBuffer::with_capacity(64);
        assert_eq!(receiver.receive(&mut rx), Err(Error::CrcCheckFailed));
    }

    #[test]
    fn oversized_message_rejected() {
        let (a, b) = DuplexPipe::pair();
        let mut sender = FramedTransport::new(a, Crc16::new(0xEF4A));
        let mut receiver = FramedTransport::new(b, Crc16::new(0xEF4A));

        sender.send(&codec_payload(b"this payload is too big for the receiver")).unwrap();
        let mut rx = MessageBuffer::with_capacity(HEADER_SIZE + 4);
        assert_eq!(receiver.receive(&mut rx), Err(Error::ReceiveFailed));
    }
}
