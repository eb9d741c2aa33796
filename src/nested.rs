// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Nested-call plumbing: thread-local state a ClientManager consults to
// decide whether `perform_request` is being called from an ordinary
// application thread or from inside a server handler running on the same
// thread that is pumping the shared transport. Grounded in the spec's
// "weakly-linked global boolean" source idiom, reimplemented as thread-local
// state per the design notes' explicit guidance.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use crate::buffer::MessageBuffer;
use crate::error::Result;

/// Implemented by a `Server` so a nested client call issued from inside one
/// of its handlers can pump the same reader role it is already running on,
/// rather than blocking on a fresh semaphore nothing would ever signal.
pub trait NestedPump: Send + Sync {
    /// Drive the shared transport, dispatching any ordinary invocations
    /// encountered, until the reply for `sequence` arrives.
    fn pump_until_reply(&self, sequence: u32) -> Result<MessageBuffer>;
}

thread_local! {
    static ACTIVE_SERVER: RefCell<Option<Arc<dyn NestedPump>>> = RefCell::new(None);
    static IN_FLIGHT: Cell<bool> = Cell::new(false);
}

/// Marks this thread as "currently running a server dispatch loop pumping
/// `server`" for the duration of the guard. `Server::run` holds one across
/// each `handle_invocation` call.
pub struct ServerThreadGuard {
    previous: Option<Arc<dyn NestedPump>>,
}

impl ServerThreadGuard {
    pub fn enter(server: Arc<dyn NestedPump>) -> Self {
        let previous = ACTIVE_SERVER.with(|s| s.borrow_mut().replace(server));
        ServerThreadGuard { previous }
    }
}

impl Drop for ServerThreadGuard {
    fn drop(&mut self) {
        ACTIVE_SERVER.with(|s| *s.borrow_mut() = self.previous.take());
    }
}

/// The server pump this thread is currently inside a dispatch call for, if
/// any. `None` on an ordinary application thread.
pub fn current_server() -> Option<Arc<dyn NestedPump>> {
    ACTIVE_SERVER.with(|s| s.borrow().clone())
}

/// RAII marker recording "a client call is in flight on this thread",
/// independent of whether a nested-call path is available to service it.
pub struct InFlightGuard {
    already_in_flight: bool,
}

impl InFlightGuard {
    /// Enter the guarded region. `already_in_flight()` reports whether this
    /// thread was already inside another call when this one started.
    pub fn enter() -> Self {
        let already_in_flight = IN_FLIGHT.with(|f| f.replace(true));
        InFlightGuard { already_in_flight }
    }

    pub fn already_in_flight(&self) -> bool {
        self.already_in_flight
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        // Only the outermost guard clears the flag; an inner (nested) guard
        // leaves it set for the call it is nested inside of.
        if !self.already_in_flight {
            IN_FLIGHT.with(|f| f.set(false));
        }
    }
}
