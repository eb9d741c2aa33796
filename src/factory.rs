// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Buffer and codec factories. A codec never owns storage, so one
// `CodecFactory` serves both allocation policies; only the buffer factory
// varies between `DynamicBufferFactory` (heap, `Vec<u8>` per buffer) and
// `StaticBufferFactory` (fixed pool, `slab_pool` feature).
//
// The teacher's own `slab_pool` feature (`mem.rs::SlabPool`) wraps
// `slab::Slab`, keyed so a caller can hand a stable index back to `remove`.
// That shape doesn't fit here: `BufferFactory::dispose` takes a
// `MessageBuffer` by value with no slot key riding along (the wire-level
// contract in §6 has nowhere to carry one), so this is grounded instead on
// `chunk_storage::ChunkInfo`'s free-list-over-fixed-array allocator — a
// bound on concurrently-live buffers plus reuse of their storage, addressed
// by identity rather than by key. See DESIGN.md for why `slab` itself isn't
// a dependency here despite sharing the feature name with the teacher.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::buffer::MessageBuffer;
use crate::codec::Codec;
use crate::error::{Error, Result};

/// Creates and disposes of [`MessageBuffer`]s. An implementer promises that
/// a buffer returned by `create` is at least `default_buffer_size` bytes.
pub trait BufferFactory: Send + Sync {
    fn create(&self) -> Result<MessageBuffer>;
    fn dispose(&self, buf: MessageBuffer);

    /// Whether `Server::run_once` should allocate the receive buffer itself
    /// before calling `Transport::receive`. A factory backing a zero-copy
    /// transport (e.g. one that hands back a buffer it owns from inside its
    /// own `receive`) returns `false` so the server doesn't allocate one
    /// that would just be discarded. Defaults to `true`, the ordinary case.
    fn create_server_buffer(&self) -> bool {
        true
    }

    /// Called on the buffer the server is about to send as a reply, after
    /// dispatch and before `Transport::send`. A factory may reallocate or
    /// otherwise prepare the buffer for the send path here; the default is
    /// a no-op.
    fn prepare_server_buffer_for_send(&self, buf: MessageBuffer) -> Result<MessageBuffer> {
        Ok(buf)
    }
}

/// Each `create()` is a fresh heap allocation; `dispose` simply drops it.
pub struct DynamicBufferFactory {
    buffer_size: usize,
}

impl DynamicBufferFactory {
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size }
    }
}

impl BufferFactory for DynamicBufferFactory {
    fn create(&self) -> Result<MessageBuffer> {
        Ok(MessageBuffer::with_capacity(self.buffer_size))
    }

    fn dispose(&self, _buf: MessageBuffer) {}
}

/// A fixed-capacity pool of `buffer_size`-byte buffers. `create` fails with
/// [`Error::MemoryError`] once `buffers_count` are concurrently live, rather
/// than growing or falling back to the heap — this is what makes the policy
/// usable in a no-heap environment. Reclaimed storage is pushed onto a
/// spares list and reused by the next `create`, so steady-state operation
/// does no further allocation once the pool has filled once.
#[cfg(feature = "slab_pool")]
pub struct StaticBufferFactory {
    buffer_size: usize,
    buffers_count: usize,
    live: AtomicUsize,
    spares: Mutex<Vec<Vec<u8>>>,
}

#[cfg(feature = "slab_pool")]
impl StaticBufferFactory {
    pub fn new(buffer_size: usize, buffers_count: usize) -> Self {
        let spares = (0..buffers_count).map(|_| vec![0u8; buffer_size]).collect();
        Self { buffer_size, buffers_count, live: AtomicUsize::new(0), spares: Mutex::new(spares) }
    }

    pub fn buffers_count(&self) -> usize {
        self.buffers_count
    }
}

#[cfg(feature = "slab_pool")]
impl BufferFactory for StaticBufferFactory {
    fn create(&self) -> Result<MessageBuffer> {
        let mut live = self.live.load(Ordering::Acquire);
        loop {
            if live >= self.buffers_count {
                return Err(Error::MemoryError);
            }
            match self.live.compare_exchange_weak(live, live + 1, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => break,
                Err(observed) => live = observed,
            }
        }
        let storage = self.spares.lock().unwrap().pop().unwrap_or_else(|| vec![0u8; self.buffer_size]);
        Ok(MessageBuffer::from_vec_capacity(storage))
    }

    fn dispose(&self, buf: MessageBuffer) {
        let mut storage = buf.into_storage();
        storage.resize(self.buffer_size, 0);
        self.spares.lock().unwrap().push(storage);
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Codec construction/disposal. A codec never owns storage itself, so this
/// is the same regardless of buffer allocation policy.
pub struct CodecFactory;

impl CodecFactory {
    pub fn create(&self) -> Codec {
        Codec::new()
    }

    pub fn dispose(&self, _codec: Codec) {}
}

impl Default for CodecFactory {
    fn default() -> Self {
        Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_server_buffer_hooks_are_ordinary_pass_through() {
        let factory = DynamicBufferFactory::new(32);
        assert!(factory.create_server_buffer());
        let buf = factory.create().unwrap();
        let prepared = factory.prepare_server_buffer_for_send(buf).unwrap();
        assert_eq!(prepared.capacity(), 32);
    }
}
