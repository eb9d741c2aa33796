// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Static queue (§2 component 16): a bounded ring for handing a
// `MessageBuffer` from one task to another without the handoff itself
// allocating — the arbitrator's reader role and a server's dispatch task
// can sit on opposite ends of one of these instead of sharing a single
// inline call stack. Grounded in the teacher's ring-buffer head/tail
// bookkeeping (`channel.rs`'s `RingHeader`), replacing the shared-memory
// slot array with a `VecDeque` of fixed maximum length guarded by the same
// `Semaphore` used elsewhere in this crate for blocking waits.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::buffer::MessageBuffer;
use crate::error::{Error, Result};
use crate::thread::Semaphore;

/// A fixed-capacity FIFO of [`MessageBuffer`]s. `push` fails closed with
/// [`Error::MemoryError`] once `capacity` is reached rather than growing —
/// the point of a static queue is a hard upper bound on outstanding buffers.
pub struct StaticQueue {
    capacity: usize,
    items: Mutex<VecDeque<MessageBuffer>>,
    filled: Semaphore,
}

impl StaticQueue {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, items: Mutex::new(VecDeque::with_capacity(capacity)), filled: Semaphore::new(0) }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueue `buf`. Fails without blocking if the queue is full.
    pub fn push(&self, buf: MessageBuffer) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        if items.len() >= self.capacity {
            return Err(Error::MemoryError);
        }
        items.push_back(buf);
        drop(items);
        self.filled.put();
        Ok(())
    }

    /// Block (up to `timeout`, or forever if `None`) until a buffer is
    /// available, then dequeue it.
    pub fn pop(&self, timeout: Option<std::time::Duration>) -> Result<MessageBuffer> {
        self.filled.get(timeout)?;
        let mut items = self.items.lock().unwrap();
        items.pop_front().ok_or(Error::Fail)
    }

    /// Non-blocking pop: `None` if nothing is queued right now.
    pub fn try_pop(&self) -> Option<MessageBuffer> {
        if self.filled.get_nonblocking().is_err() {
            return None;
        }
        self.items.lock().unwrap().pop_front()
    }
}
