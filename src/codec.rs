// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Stateful encoder/decoder over a MessageBuffer cursor, with a sticky
// first-error status: once non-success, every subsequent write/read is a
// no-op until `reset`. Lets call sites emit a long sequence of encode/decode
// steps and inspect status once at a natural boundary.

use crate::buffer::{Cursor, MessageBuffer};
use crate::error::{Error, Result};

/// Message kinds carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Invocation = 0,
    Oneway = 1,
    Reply = 2,
    Notification = 3,
}

impl TryFrom<u32> for MessageType {
    type Error = Error;

    fn try_from(v: u32) -> Result<Self> {
        match v {
            0 => Ok(MessageType::Invocation),
            1 => Ok(MessageType::Oneway),
            2 => Ok(MessageType::Reply),
            3 => Ok(MessageType::Notification),
            _ => Err(Error::InvalidMessageVersion),
        }
    }
}

const CODEC_VERSION: u32 = 1;

fn pack_header(msg_type: MessageType, service: u32, method: u32) -> Result<u32> {
    if service > 0xFF || method > 0xFF {
        return Err(Error::InvalidArgument);
    }
    Ok((CODEC_VERSION & 0x3F)
        | ((msg_type as u32 & 0xFF) << 6)
        | ((service & 0xFF) << 14)
        | ((method & 0xFF) << 22))
}

/// Parse a message header sitting at `skip` bytes into `buf`'s payload
/// without disturbing any codec's cursor. Used by the transport arbitrator
/// to peek at an incoming frame's routing fields before deciding whether it
/// is a reply to demultiplex or an invocation to hand to the server.
pub(crate) fn peek_message_header(buf: &MessageBuffer, skip: usize) -> Result<(MessageType, u32, u32, u32)> {
    let payload = buf.payload();
    if payload.len() < skip + 8 {
        return Err(Error::BufferOverrun);
    }
    let word = u32::from_le_bytes(payload[skip..skip + 4].try_into().unwrap());
    let sequence = u32::from_le_bytes(payload[skip + 4..skip + 8].try_into().unwrap());
    let (msg_type, service, method) = unpack_header(word)?;
    Ok((msg_type, service, method, sequence))
}

fn unpack_header(word: u32) -> Result<(MessageType, u32, u32)> {
    let version = word & 0x3F;
    if version != CODEC_VERSION {
        return Err(Error::InvalidMessageVersion);
    }
    let msg_type = MessageType::try_from((word >> 6) & 0xFF)?;
    let service = (word >> 14) & 0xFF;
    let method = (word >> 22) & 0xFF;
    Ok((msg_type, service, method))
}

/// `(cursor, status)` over a borrowed message buffer.
///
/// Every `write_*`/`read_*` is a no-op once [`Codec::is_ok`] is false. The
/// first error to occur is the one retained; call `reset` to clear it.
pub struct Codec {
    buffer: MessageBuffer,
    cursor: Cursor,
    status: Result<()>,
}

impl Codec {
    pub fn new() -> Self {
        Self {
            buffer: MessageBuffer::default(),
            cursor: Cursor::new(),
            status: Ok(()),
        }
    }

    /// Attach a new buffer, replacing whatever this codec previously held,
    /// and clear status.
    pub fn set_buffer(&mut self, buf: MessageBuffer) {
        self.buffer = buf;
        self.cursor = Cursor::new();
        self.status = Ok(());
    }

    /// Detach the buffer this codec holds, leaving an empty one in its place.
    pub fn take_buffer(&mut self) -> MessageBuffer {
        std::mem::take(&mut self.buffer)
    }

    pub fn buffer(&self) -> &MessageBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut MessageBuffer {
        &mut self.buffer
    }

    /// Exchange the buffer at the field level (zero-copy). Used by the
    /// arbitrator to hand a received reply to the requester's codec.
    pub fn swap_buffer(&mut self, other: &mut MessageBuffer) {
        self.buffer.swap(other);
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    pub fn status(&self) -> Result<()> {
        self.status
    }

    /// Only takes hold when the current status is success, so the *first*
    /// error is the one reported.
    fn update_status(&mut self, err: Error) {
        if self.status.is_ok() {
            self.status = Err(err);
        }
    }

    /// Re-seat the cursor `skip` bytes past the base (room for a frame
    /// prefix) and clear status. For a buffer about to be freshly written.
    pub fn reset(&mut self, skip: usize) {
        if let Err(e) = self.cursor.reset(&mut self.buffer, skip) {
            self.status = Err(e);
            return;
        }
        self.status = Ok(());
    }

    /// Re-seat the cursor `skip` bytes past the base and clear status,
    /// without touching the buffer's `used` mark. Use this instead of
    /// [`reset`](Self::reset) after attaching a buffer a transport just
    /// filled in, to skip past its framing prefix without losing track of
    /// how much payload follows it.
    pub fn start_read_at(&mut self, skip: usize) {
        if let Err(e) = self.cursor.seek_for_read(&self.buffer, skip) {
            self.status = Err(e);
            return;
        }
        self.status = Ok(());
    }

    // --- header ---

    pub fn start_write_message(
        &mut self,
        msg_type: MessageType,
        service: u32,
        method: u32,
        sequence: u32,
    ) {
        if !self.is_ok() {
            return;
        }
        match pack_header(msg_type, service, method) {
            Ok(word) => {
                self.write_u32(word);
                self.write_u32(sequence);
            }
            Err(e) => self.update_status(e),
        }
    }

    pub fn start_read_message(&mut self) -> Option<(MessageType, u32, u32, u32)> {
        if !self.is_ok() {
            return None;
        }
        let word = self.read_u32()?;
        let sequence = self.read_u32()?;
        if !self.is_ok() {
            return None;
        }
        match unpack_header(word) {
            Ok((msg_type, service, method)) => Some((msg_type, service, method, sequence)),
            Err(e) => {
                self.update_status(e);
                None
            }
        }
    }

    // --- primitive writes ---

    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(if v { 1 } else { 0 });
    }

    pub fn write_i8(&mut self, v: i8) {
        self.write_raw(&v.to_le_bytes());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.write_raw(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write_raw(&v.to_le_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.write_raw(&v.to_le_bytes());
    }

    pub fn write_u8(&mut self, v: u8) {
        self.write_raw(&v.to_le_bytes());
    }

    pub fn write_u16(&mut self, v: u16) {
        self.write_raw(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_raw(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write_raw(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.write_raw(&v.to_le_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.write_raw(&v.to_le_bytes());
    }

    /// Strings/binaries: `uint32 length` then `length` raw bytes.
    pub fn write_data(&mut self, data: &[u8]) {
        self.write_u32(data.len() as u32);
        self.write_raw(data);
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_data(s.as_bytes());
    }

    /// List header: `uint32 length`; caller encodes each element afterward.
    pub fn write_list_header(&mut self, len: u32) {
        self.write_u32(len);
    }

    /// Union discriminator; caller encodes the selected arm's fields afterward.
    pub fn write_union_discriminant(&mut self, discriminant: i32) {
        self.write_i32(discriminant);
    }

    /// One-byte present/null flag for nullable values.
    pub fn write_null_flag(&mut self, is_null: bool) {
        self.write_u8(if is_null { 1 } else { 0 });
    }

    /// One-byte index into a shared, build-time callback table.
    pub fn write_callback(&mut self, index: u8) {
        self.write_u8(index);
    }

    fn write_raw(&mut self, bytes: &[u8]) {
        if !self.is_ok() {
            return;
        }
        if let Err(e) = self.cursor.write(&mut self.buffer, bytes) {
            self.update_status(e);
        }
    }

    // --- primitive reads ---

    pub fn read_bool(&mut self) -> Option<bool> {
        self.read_u8().map(|v| v != 0)
    }

    pub fn read_i8(&mut self) -> Option<i8> {
        self.read_raw::<1>().map(i8::from_le_bytes)
    }

    pub fn read_i16(&mut self) -> Option<i16> {
        self.read_raw::<2>().map(i16::from_le_bytes)
    }

    pub fn read_i32(&mut self) -> Option<i32> {
        self.read_raw::<4>().map(i32::from_le_bytes)
    }

    pub fn read_i64(&mut self) -> Option<i64> {
        self.read_raw::<8>().map(i64::from_le_bytes)
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        self.read_raw::<1>().map(u8::from_le_bytes)
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        self.read_raw::<2>().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        self.read_raw::<4>().map(u32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> Option<u64> {
        self.read_raw::<8>().map(u64::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> Option<f32> {
        self.read_raw::<4>().map(f32::from_le_bytes)
    }

    pub fn read_f64(&mut self) -> Option<f64> {
        self.read_raw::<8>().map(f64::from_le_bytes)
    }

    pub fn read_data(&mut self) -> Option<Vec<u8>> {
        let len = self.read_u32()? as usize;
        if !self.is_ok() {
            return None;
        }
        let mut out = vec![0u8; len];
        if let Err(e) = self.cursor.read(&self.buffer, &mut out) {
            self.update_status(e);
            return None;
        }
        Some(out)
    }

    pub fn read_string(&mut self) -> Option<String> {
        let bytes = self.read_data()?;
        match String::from_utf8(bytes) {
            Ok(s) => Some(s),
            Err(_) => {
                self.update_status(Error::Fail);
                None
            }
        }
    }

    pub fn read_list_header(&mut self) -> Option<u32> {
        self.read_u32()
    }

    pub fn read_union_discriminant(&mut self) -> Option<i32> {
        self.read_i32()
    }

    pub fn read_null_flag(&mut self) -> Option<bool> {
        self.read_u8().map(|v| v != 0)
    }

    pub fn read_callback(&mut self) -> Option<u8> {
        self.read_u8()
    }

    fn read_raw<const N: usize>(&mut self) -> Option<[u8; N]> {
        if !self.is_ok() {
            return None;
        }
        let mut out = [0u8; N];
        if let Err(e) = self.cursor.read(&self.buffer, &mut out) {
            self.update_status(e);
            return None;
        }
        Some(out)
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_header_and_primitives() {
        let mut c = Codec::new();
        c.set_buffer(MessageBuffer::with_capacity(64));
        c.start_write_message(MessageType::Invocation, 3, 7, 42);
        c.write_u32(0xDEADBEEF);
        c.write_string("hello");
        assert!(c.is_ok());

        let mut r = Codec::new();
        r.set_buffer(c.buffer().clone());
        let (ty, service, method, seq) = r.start_read_message().unwrap();
        assert_eq!(ty, MessageType::Invocation);
        assert_eq!(service, 3);
        assert_eq!(method, 7);
        assert_eq!(seq, 42);
        assert_eq!(r.read_u32(), Some(0xDEADBEEF));
        assert_eq!(r.read_string(), Some("hello".to_owned()));
        assert!(r.is_ok());
    }

    #[test]
    fn sticky_status_short_circuits() {
        let mut c = Codec::new();
        c.set_buffer(MessageBuffer::with_capacity(2));
        c.write_u32(1); // overruns a 2-byte buffer
        assert!(!c.is_ok());
        let used_before = c.buffer().used();
        c.write_u32(2); // no-op: status already sticky
        assert_eq!(c.buffer().used(), used_before);
    }

    #[test]
    fn reset_clears_status() {
        let mut c = Codec::new();
        c.set_buffer(MessageBuffer::with_capacity(2));
        c.write_u32(1);
        assert!(!c.is_ok());
        c.reset(0);
        assert!(c.is_ok());
    }

    #[test]
    fn invalid_version_rejected() {
        let mut c = Codec::new();
        c.set_buffer(MessageBuffer::with_capacity(16));
        c.write_u32(0); // version field 0, never valid (current version is 1)
        c.write_u32(0);
        let mut r = Codec::new();
        r.set_buffer(c.buffer().clone());
        assert!(r.start_read_message().is_none());
        assert_eq!(r.status(), Err(Error::InvalidMessageVersion));
    }
}
