// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Threading primitives: a counting semaphore and a recursive mutex. Grounded
// in the teacher's `Waiter` (condition + mutex + predicate-loop wait) and
// `spin_lock`'s adaptive backoff, generalized from shared-memory,
// cross-process primitives to plain in-process ones — this runtime never
// shares these across processes, only across threads of one program.
//
// The `threading` feature selects between this module's real
// Condvar-backed `Semaphore` and an inline variant that never actually
// blocks, appropriate only for the single-threaded `Server::poll` path on
// bare metal where nothing else is running concurrently.

use std::sync::{Condvar, Mutex as StdMutex};
use std::time::Duration;

use crate::error::{Error, Result};

/// A classic counting semaphore: `put` increments the count and wakes one
/// waiter; `get` blocks until the count is positive, then decrements it.
pub struct Semaphore {
    count: StdMutex<i32>,
    cv: Condvar,
}

impl Semaphore {
    pub fn new(initial: i32) -> Self {
        Self { count: StdMutex::new(initial), cv: Condvar::new() }
    }

    /// Increment the count and wake one waiter.
    pub fn put(&self) {
        let mut count = self.count.lock().unwrap();
        *count += 1;
        self.cv.notify_one();
    }

    /// Block until the count is positive, then consume one unit.
    #[cfg(feature = "threading")]
    pub fn get(&self, timeout: Option<Duration>) -> Result<()> {
        let mut count = self.count.lock().unwrap();
        loop {
            if *count > 0 {
                *count -= 1;
                return Ok(());
            }
            match timeout {
                Some(t) => {
                    let (guard, result) = self.cv.wait_timeout(count, t).unwrap();
                    count = guard;
                    if result.timed_out() && *count <= 0 {
                        return Err(Error::Timeout);
                    }
                }
                None => {
                    count = self.cv.wait(count).unwrap();
                }
            }
        }
    }

    /// Inline backend: there is never another thread to block on, so a
    /// pending count of zero is itself the signal that nothing is owed.
    #[cfg(not(feature = "threading"))]
    pub fn get(&self, _timeout: Option<Duration>) -> Result<()> {
        self.get_nonblocking()
    }

    /// Consume one unit if available without waiting; never blocks.
    pub fn get_nonblocking(&self) -> Result<()> {
        let mut count = self.count.lock().unwrap();
        if *count > 0 {
            *count -= 1;
            Ok(())
        } else {
            Err(Error::Timeout)
        }
    }
}

/// A mutex that the same thread may lock more than once without deadlocking.
/// `std::sync::Mutex` deadlocks on reentry; this wrapper tracks the owning
/// thread and a reentry depth on top of it.
pub struct RecursiveMutex<T> {
    inner: StdMutex<RecursiveState<T>>,
    cv: Condvar,
}

struct RecursiveState<T> {
    owner: Option<std::thread::ThreadId>,
    depth: u32,
    value: T,
}

/// RAII guard releasing one level of recursion on drop.
pub struct RecursiveGuard<'a, T> {
    mutex: &'a RecursiveMutex<T>,
}

impl<T> RecursiveMutex<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: StdMutex::new(RecursiveState { owner: None, depth: 0, value }),
            cv: Condvar::new(),
        }
    }

    pub fn lock(&self) -> RecursiveGuard<'_, T> {
        let this_thread = std::thread::current().id();
        let mut state = self.inner.lock().unwrap();
        loop {
            match state.owner {
                Some(owner) if owner == this_thread => {
                    state.depth += 1;
                    break;
                }
                None => {
                    state.owner = Some(this_thread);
                    state.depth = 1;
                    break;
                }
                Some(_) => {
                    state = self.cv.wait(state).unwrap();
                }
            }
        }
        RecursiveGuard { mutex: self }
    }

    fn unlock_one(&self) {
        let mut state = self.inner.lock().unwrap();
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.cv.notify_one();
        }
    }

    /// Access the protected value. Only callable while holding a guard, so
    /// this takes the guard rather than `&self` directly.
    pub fn with<'a, R>(guard: &RecursiveGuard<'a, T>, f: impl FnOnce(&T) -> R) -> R {
        let state = guard.mutex.inner.lock().unwrap();
        f(&state.value)
    }

    pub fn with_mut<'a, R>(guard: &RecursiveGuard<'a, T>, f: impl FnOnce(&mut T) -> R) -> R {
        let mut state = guard.mutex.inner.lock().unwrap();
        f(&mut state.value)
    }
}

impl<'a, T> Drop for RecursiveGuard<'a, T> {
    fn drop(&mut self) {
        self.mutex.unlock_one();
    }
}
