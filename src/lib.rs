// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// erpc-rs: an embedded RPC runtime. A stateful codec over a borrowed byte
// buffer encodes/decodes calls; a CRC-framed transport carries them across
// a narrow byte pipe; a client manager and server coordinate request/reply
// matching; and a transport arbitrator demultiplexes a single shared
// transport between interleaved client requests and server invocations,
// including the nested-call case where a server handler issues its own
// client call from inside `receive`.
//
// Feature flags:
//   threading              — real thread-backed Semaphore/Mutex (default).
//                             Disable for the single-threaded, poll-driven
//                             bare-metal path.
//   nested_calls           — let a server handler issue client calls on the
//                             arbitrated transport it is itself dispatched
//                             from.
//   nested_calls_detection — reentrancy guard flagging two ordinary calls
//                             overlapping on one thread with no server loop
//                             to pump, independent of `nested_calls`.
//   message_logging        — mirror every sent/received frame to a chain of
//                             side-channel transports.
//   pre_post_hooks         — pre/post call hooks, including the default
//                             watchdog timer.
//   slab_pool              — fixed-capacity pool-backed buffer allocation
//                             instead of the heap.

pub mod buffer;
pub mod client;
pub mod codec;
pub mod config;
pub mod crc16;
pub mod error;
pub mod factory;
pub mod nested;
pub mod queue;
pub mod server;
pub mod service;
pub mod thread;
pub mod transport;

mod arbitrator;
pub use arbitrator::{Arbitrator, PendingToken, PumpOutcome};

#[cfg(feature = "message_logging")]
pub mod logger;

#[cfg(feature = "pre_post_hooks")]
pub mod hooks;

pub use buffer::{Cursor, MessageBuffer};
pub use client::{ClientManager, ClientTransport, RequestContext};
pub use codec::{Codec, MessageType};
pub use config::RuntimeConfig;
pub use crc16::Crc16;
pub use error::{Error, Result};
pub use factory::{BufferFactory, CodecFactory, DynamicBufferFactory};
pub use queue::StaticQueue;
pub use server::Server;
pub use service::{Service, ServiceRegistry};
pub use transport::Transport;

#[cfg(feature = "slab_pool")]
pub use factory::StaticBufferFactory;
