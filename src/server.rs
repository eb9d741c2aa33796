// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Server: the invocation side of the runtime. Reads a frame, finds the
// matching service in a registry, dispatches, and (unless oneway) writes
// the reply back. Grounded in the spec's `run`/`poll` loop (§4.7): each
// iteration is one receive-dispatch-reply cycle, receive/dispatch errors
// tear down just that request and the loop keeps going, and `stop()` flips
// an `AtomicBool` the next iteration observes — the same shape as the
// teacher's quit-flag-on-`Waiter` servers.
//
// A server either owns its transport outright (`Direct`) or reads through
// a `Transport Arbitrator`'s reader role (`Arbitrated`) when that transport
// is shared with client traffic on the same link. Only the arbitrated case
// can see a nested client call: `Server<T>` implements `NestedPump` so a
// handler that itself issues a client request gets that request's wait
// serviced by pumping the same reader it is already running on, rather
// than blocking on a semaphore nothing would ever signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::arbitrator::{Arbitrator, PumpOutcome};
use crate::buffer::MessageBuffer;
use crate::codec::MessageType;
use crate::error::{Error, Result};
use crate::factory::{BufferFactory, CodecFactory};
use crate::nested::{NestedPump, ServerThreadGuard};
use crate::service::ServiceRegistry;
use crate::transport::Transport;

#[cfg(feature = "message_logging")]
use crate::logger::LoggerChain;
#[cfg(feature = "pre_post_hooks")]
use crate::hooks::PrePostHooks;

enum ServerReader<T: Transport> {
    Direct(Mutex<T>),
    Arbitrated(Arc<Arbitrator<T>>),
}

/// Dispatches inbound invocations from a transport to a [`ServiceRegistry`].
pub struct Server<T: Transport + Send> {
    reader: ServerReader<T>,
    registry: ServiceRegistry,
    buffer_factory: Box<dyn BufferFactory>,
    codec_factory: CodecFactory,
    /// Bytes to skip before the message header — the framing prefix
    /// reserved by whatever `Transport` impl this server reads, e.g.
    /// `FramedTransport::reserve_header_size()`.
    header_skip: usize,
    enabled: AtomicBool,
    #[cfg(feature = "message_logging")]
    loggers: Mutex<LoggerChain>,
    #[cfg(feature = "pre_post_hooks")]
    hooks: Mutex<Option<PrePostHooks>>,
}

impl<T: Transport + Send> Server<T> {
    /// Build a server that owns `transport` outright — no client traffic
    /// shares this link, so there is no need for an arbitrator.
    pub fn direct(
        transport: T,
        registry: ServiceRegistry,
        buffer_factory: Box<dyn BufferFactory>,
        header_skip: usize,
    ) -> Self {
        Self::new(ServerReader::Direct(Mutex::new(transport)), registry, buffer_factory, header_skip)
    }

    /// Build a server that reads through a shared transport's arbitrator,
    /// so client calls issued on the same link don't race the server's own
    /// receives.
    pub fn arbitrated(
        arbitrator: Arc<Arbitrator<T>>,
        registry: ServiceRegistry,
        buffer_factory: Box<dyn BufferFactory>,
        header_skip: usize,
    ) -> Self {
        Self::new(ServerReader::Arbitrated(arbitrator), registry, buffer_factory, header_skip)
    }

    fn new(
        reader: ServerReader<T>,
        registry: ServiceRegistry,
        buffer_factory: Box<dyn BufferFactory>,
        header_skip: usize,
    ) -> Self {
        Self {
            reader,
            registry,
            buffer_factory,
            codec_factory: CodecFactory,
            header_skip,
            enabled: AtomicBool::new(true),
            #[cfg(feature = "message_logging")]
            loggers: Mutex::new(LoggerChain::new()),
            #[cfg(feature = "pre_post_hooks")]
            hooks: Mutex::new(None),
        }
    }

    #[cfg(feature = "message_logging")]
    pub fn loggers_mut(&mut self) -> &mut LoggerChain {
        self.loggers.get_mut().unwrap()
    }

    #[cfg(feature = "pre_post_hooks")]
    pub fn set_hooks(&mut self, hooks: PrePostHooks) {
        *self.hooks.get_mut().unwrap() = Some(hooks);
    }

    /// Flip the running flag; the next loop iteration in [`Self::run`]
    /// observes it and returns.
    pub fn stop(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Run until [`Self::stop`] is called. Receive/dispatch errors are
    /// logged and the loop continues — a server is best kept alive rather
    /// than torn down by one bad frame.
    pub fn run(self: &Arc<Self>) -> Result<()> {
        while self.is_running() {
            if let Err(e) = self.run_once() {
                log::warn!("erpc: server iteration failed: {e}");
            }
        }
        Ok(())
    }

    /// Poll-gated single iteration, for a bare-metal main loop that must
    /// stay responsive to other work: does nothing if no message is
    /// waiting.
    pub fn poll(self: &Arc<Self>) -> Result<()> {
        if !self.has_message()? {
            return Ok(());
        }
        self.run_once()
    }

    fn has_message(&self) -> Result<bool> {
        match &self.reader {
            ServerReader::Direct(transport) => transport.lock().unwrap().has_message(),
            ServerReader::Arbitrated(arb) => arb.has_message(),
        }
    }

    /// One receive-dispatch-reply cycle.
    pub fn run_once(self: &Arc<Self>) -> Result<()> {
        match &self.reader {
            ServerReader::Direct(transport) => {
                // Some factories (e.g. a zero-copy transport's own buffer
                // pool) allocate the receive buffer themselves inside
                // `Transport::receive` rather than handing the server one
                // up front; `create_server_buffer` is how a factory opts
                // out of the ordinary pre-allocation.
                let mut buf = if self.buffer_factory.create_server_buffer() {
                    self.buffer_factory.create()?
                } else {
                    MessageBuffer::default()
                };
                if let Err(e) = transport.lock().unwrap().receive(&mut buf) {
                    self.buffer_factory.dispose(buf);
                    return Err(e);
                }
                self.dispatch_one(buf)
            }
            ServerReader::Arbitrated(arb) => {
                let pump = Arc::clone(self) as Arc<dyn NestedPump>;
                let guard = ServerThreadGuard::enter(pump);
                let outcome = arb.pump();
                drop(guard);
                match outcome? {
                    PumpOutcome::Invocation(buf) => self.dispatch_one(buf),
                    PumpOutcome::NoAction => Ok(()),
                }
            }
        }
    }

    /// Parse the header, dispatch to the matching service, and (unless
    /// oneway) send the reply the handler wrote back into the same codec.
    fn dispatch_one(&self, buf: MessageBuffer) -> Result<()> {
        #[cfg(feature = "message_logging")]
        self.loggers.lock().unwrap().log_receive(&buf)?;

        let mut codec = self.codec_factory.create();
        codec.set_buffer(buf);
        codec.start_read_at(self.header_skip);

        let (msg_type, service_id, method_id, sequence) = match codec.start_read_message() {
            Some(header) => header,
            None => {
                let status = codec.status();
                let buf = codec.take_buffer();
                self.buffer_factory.dispose(buf);
                self.codec_factory.dispose(codec);
                return status.and(Err(Error::Fail));
            }
        };
        let oneway = matches!(msg_type, MessageType::Oneway);

        let dispatch_result =
            self.registry.dispatch(service_id, method_id, sequence, oneway, &mut codec, self.buffer_factory.as_ref());

        let reply_result = if dispatch_result.is_ok() && !oneway {
            self.send_prepared_reply(&mut codec)
        } else {
            Ok(())
        };

        let buf = codec.take_buffer();
        self.buffer_factory.dispose(buf);
        self.codec_factory.dispose(codec);

        dispatch_result.and(reply_result)
    }

    /// Run the reply buffer the handler wrote through
    /// `prepare_server_buffer_for_send` (a factory may reallocate it here)
    /// before logging and sending it, then hand the (possibly replaced)
    /// buffer back to `codec` so the caller's cleanup still finds it there.
    fn send_prepared_reply(&self, codec: &mut crate::codec::Codec) -> Result<()> {
        let reply_buf = codec.take_buffer();
        let reply_buf = self.buffer_factory.prepare_server_buffer_for_send(reply_buf)?;

        #[cfg(feature = "message_logging")]
        let logged = self.loggers.lock().unwrap().log_send(&reply_buf);
        #[cfg(not(feature = "message_logging"))]
        let logged: Result<()> = Ok(());
        let result = logged.and_then(|_| self.send_reply(&reply_buf));

        codec.set_buffer(reply_buf);
        result
    }

    fn send_reply(&self, buf: &MessageBuffer) -> Result<()> {
        match &self.reader {
            ServerReader::Direct(transport) => transport.lock().unwrap().send(buf),
            ServerReader::Arbitrated(arb) => arb.send(buf),
        }
    }
}

/// Lets a handler running inside [`Self::dispatch_one`] issue its own
/// client call on the same arbitrated transport: the nested request is
/// serviced by pumping this same reader role rather than blocking on a
/// second semaphore nothing else would signal. A `Direct` server has no
/// shared transport to pump this way, so nested calls on one are a
/// programming error.
impl<T: Transport + Send> NestedPump for Server<T> {
    fn pump_until_reply(&self, sequence: u32) -> Result<MessageBuffer> {
        match &self.reader {
            ServerReader::Arbitrated(arb) => {
                let token = arb.prepare_client_receive(sequence);
                arb.pump_until_reply(token, |buf| self.dispatch_one(buf))
            }
            ServerReader::Direct(_) => Err(Error::Fail),
        }
    }
}
