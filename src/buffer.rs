// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// MessageBuffer + Cursor: a fixed-capacity byte region plus a read/write
// position into it. Grounded in the teacher's `IpcBuffer` (same swap-based
// ownership transfer for zero-copy handoff), generalized with an explicit
// `used` high-water mark and a bounds-checked cursor on top.

use crate::error::{Error, Result};

/// A byte region with a fixed capacity and a high-water mark of bytes
/// written (send direction) or received (receive direction) so far.
///
/// `used` never exceeds `capacity()`. Two buffers can be [`swap`](Self::swap)ed
/// at the field level — this is how the arbitrator hands a received frame to
/// the thread that requested it without copying.
#[derive(Clone)]
pub struct MessageBuffer {
    data: Vec<u8>,
    used: usize,
}

impl MessageBuffer {
    /// Allocate a zero-filled buffer of exactly `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { data: vec![0u8; capacity], used: 0 }
    }

    /// Wrap an existing `Vec<u8>` as a buffer whose capacity is its length
    /// and whose `used` is the full length (read direction: already filled).
    pub fn from_vec_filled(data: Vec<u8>) -> Self {
        let used = data.len();
        Self { data, used }
    }

    /// Wrap an existing `Vec<u8>` as a buffer whose capacity is its length
    /// and whose `used` starts at zero (send direction: freshly reclaimed
    /// storage, e.g. from a static buffer pool slot).
    pub fn from_vec_capacity(data: Vec<u8>) -> Self {
        Self { data, used: 0 }
    }

    /// Consume the buffer, returning its backing storage.
    pub fn into_storage(self) -> Vec<u8> {
        self.data
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Directly set the high-water mark, e.g. after an underlying transport
    /// read fills the backing storage out of band of the cursor.
    pub fn set_used(&mut self, used: usize) -> Result<()> {
        if used > self.capacity() {
            return Err(Error::BufferOverrun);
        }
        self.used = used;
        Ok(())
    }

    /// The written prefix.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.used]
    }

    /// The full backing storage, written and unwritten.
    pub fn storage(&self) -> &[u8] {
        &self.data
    }

    pub fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Swap backing storage and high-water marks with `other` at the field
    /// level. Used by the arbitrator to hand a received reply to the client
    /// codec waiting for it without a memcpy.
    pub fn swap(&mut self, other: &mut MessageBuffer) {
        std::mem::swap(&mut self.data, &mut other.data);
        std::mem::swap(&mut self.used, &mut other.used);
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl std::fmt::Debug for MessageBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBuffer")
            .field("capacity", &self.capacity())
            .field("used", &self.used)
            .finish()
    }
}

/// A read/write position into a [`MessageBuffer`].
///
/// Reads past `capacity` fail with [`Error::BufferOverrun`]; reads past
/// `used` but still within `capacity` fail with [`Error::Fail`] (a receive
/// underrun — the storage exists but hasn't been filled that far). Writes
/// past `capacity` fail with `BufferOverrun`. There is no seek-to-arbitrary-
/// position API in the write direction — only [`Cursor::reset`], which
/// re-seats both the position and the buffer's `used` mark together. This
/// makes the "writes are append-only" invariant a property of the API
/// surface rather than something checked at each call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cursor {
    position: usize,
}

impl Cursor {
    pub fn new() -> Self {
        Self { position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Re-seat the cursor `skip` bytes past the base and forget everything
    /// written/read before it — used to leave room for a framing prefix
    /// before the codec starts writing the payload.
    pub fn reset(&mut self, buf: &mut MessageBuffer, skip: usize) -> Result<()> {
        if skip > buf.capacity() {
            return Err(Error::BufferOverrun);
        }
        self.position = skip;
        buf.used = skip;
        Ok(())
    }

    /// Re-seat the cursor `skip` bytes past the base *without* disturbing
    /// `used` — unlike [`reset`](Self::reset), which is for a buffer about
    /// to be freshly written. This is for a buffer a transport has just
    /// filled in: `used` already marks the end of the received payload, and
    /// skipping past a framing prefix to start reading must not collapse it.
    pub fn seek_for_read(&mut self, buf: &MessageBuffer, skip: usize) -> Result<()> {
        if skip > buf.used() {
            return Err(Error::BufferOverrun);
        }
        self.position = skip;
        Ok(())
    }

    pub fn remaining_to_capacity(&self, buf: &MessageBuffer) -> usize {
        buf.capacity().saturating_sub(self.position)
    }

    pub fn remaining_to_used(&self, buf: &MessageBuffer) -> usize {
        buf.used().saturating_sub(self.position)
    }

    /// Read `dst.len()` bytes from the current position and advance it.
    ///
    /// Past `capacity` this is `BufferOverrun` (the read could never be
    /// satisfied by this buffer at all); past `used` but within `capacity`
    /// it is `Fail` — a receive underrun, e.g. a truncated reply body —
    /// since the storage exists but hasn't been filled that far yet.
    pub fn read(&mut self, buf: &MessageBuffer, dst: &mut [u8]) -> Result<()> {
        let n = dst.len();
        if self.position + n > buf.capacity() {
            return Err(Error::BufferOverrun);
        }
        if self.position + n > buf.used {
            return Err(Error::Fail);
        }
        dst.copy_from_slice(&buf.data[self.position..self.position + n]);
        self.position += n;
        Ok(())
    }

    /// Write `src` at the current position, advance it, and extend the
    /// buffer's `used` mark to match (append-only).
    pub fn write(&mut self, buf: &mut MessageBuffer, src: &[u8]) -> Result<()> {
        let n = src.len();
        if self.position + n > buf.capacity() {
            return Err(Error::BufferOverrun);
        }
        buf.data[self.position..self.position + n].copy_from_slice(src);
        self.position += n;
        if self.position > buf.used {
            buf.used = self.position;
        }
        Ok(())
    }
}
