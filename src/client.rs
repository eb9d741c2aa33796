// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// ClientManager: builds requests, performs send/receive, verifies reply
// headers. Grounded in rpc_protocol's `do_rpc_call`/`read_reply_from_stream`
// (sequence verification against the echoed header) generalized to this
// runtime's sticky-status codec and CRC-framed transport.
//
// Generic over `ClientTransport` rather than `Transport` directly so the
// same request/verify/release plumbing serves both a plain point-to-point
// transport and an `Arc<Arbitrator<T>>` (§4.8), which needs to register a
// pending-client record before the send happens rather than just blocking
// on `receive` afterward.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::buffer::MessageBuffer;
use crate::codec::{Codec, MessageType};
use crate::error::{Error, Result};
use crate::factory::{BufferFactory, CodecFactory};
use crate::transport::Transport;

#[cfg(feature = "pre_post_hooks")]
use crate::hooks::PrePostHooks;
#[cfg(feature = "message_logging")]
use crate::logger::LoggerChain;

/// What a `ClientManager` sends requests over and receives replies from.
///
/// Implemented directly (via the blanket impl below) by anything that is a
/// plain [`Transport`], and separately by `Arc<Arbitrator<T>>` so the
/// arbitrated case can interpose a per-request token between `send` and
/// `receive`.
pub trait ClientTransport: Send {
    type Token: Send;

    /// Called after a sequence number is assigned but before the request is
    /// sent, so a reply racing ahead of `receive` is never missed.
    fn begin(&self, sequence: u32) -> Self::Token;
    fn send(&mut self, buf: &MessageBuffer) -> Result<()>;
    fn receive(&mut self, token: Self::Token, buf: &mut MessageBuffer) -> Result<()>;
}

impl<T: Transport> ClientTransport for T {
    type Token = ();

    fn begin(&self, _sequence: u32) {}

    fn send(&mut self, buf: &MessageBuffer) -> Result<()> {
        Transport::send(self, buf)
    }

    fn receive(&mut self, _token: (), buf: &mut MessageBuffer) -> Result<()> {
        Transport::receive(self, buf)
    }
}

/// One in-flight client call: the sequence number it was assigned plus the
/// codec/buffer pair it is using to build the request and read the reply.
pub struct RequestContext {
    sequence: u32,
    codec: Codec,
    oneway: bool,
}

impl RequestContext {
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn is_oneway(&self) -> bool {
        self.oneway
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn codec_mut(&mut self) -> &mut Codec {
        &mut self.codec
    }
}

/// Function called with the infrastructure error (if any) after a request
/// completes, mirroring the source's `client_error_handler_t`.
pub type ErrorHandler = Box<dyn Fn(Error, u32) + Send + Sync>;

/// Builds requests, sends them, and verifies replies against a shared
/// transport.
pub struct ClientManager<C: ClientTransport> {
    buffer_factory: Box<dyn BufferFactory>,
    codec_factory: CodecFactory,
    transport: C,
    sequence: AtomicU32,
    error_handler: Option<ErrorHandler>,
    #[cfg(feature = "message_logging")]
    loggers: LoggerChain,
    #[cfg(feature = "pre_post_hooks")]
    hooks: Option<PrePostHooks>,
}

impl<C: ClientTransport> ClientManager<C> {
    pub fn new(transport: C, buffer_factory: Box<dyn BufferFactory>) -> Self {
        Self {
            buffer_factory,
            codec_factory: CodecFactory,
            transport,
            sequence: AtomicU32::new(0),
            error_handler: None,
            #[cfg(feature = "message_logging")]
            loggers: LoggerChain::new(),
            #[cfg(feature = "pre_post_hooks")]
            hooks: None,
        }
    }

    pub fn set_error_handler(&mut self, handler: ErrorHandler) {
        self.error_handler = Some(handler);
    }

    #[cfg(feature = "message_logging")]
    pub fn loggers_mut(&mut self) -> &mut LoggerChain {
        &mut self.loggers
    }

    #[cfg(feature = "pre_post_hooks")]
    pub fn set_hooks(&mut self, hooks: PrePostHooks) {
        self.hooks = Some(hooks);
    }

    /// Allocate a buffer and codec, stamped with a freshly incremented
    /// sequence number.
    pub fn create_request(&self, oneway: bool) -> Result<RequestContext> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let buf = self.buffer_factory.create()?;
        let mut codec = self.codec_factory.create();
        codec.set_buffer(buf);
        codec.reset(6); // leave room for the frame header
        Ok(RequestContext { sequence, codec, oneway })
    }

    /// Return the request's buffer and codec to their factories.
    pub fn release_request(&self, request: RequestContext) {
        let mut codec = request.codec;
        let buf = codec.take_buffer();
        self.buffer_factory.dispose(buf);
        self.codec_factory.dispose(codec);
    }

    /// Write the message header into the request's codec. Call after
    /// `create_request` and before encoding arguments.
    pub fn start_request(&self, request: &mut RequestContext, service: u32, method: u32) {
        let msg_type = if request.oneway { MessageType::Oneway } else { MessageType::Invocation };
        request.codec.start_write_message(msg_type, service, method, request.sequence);
    }

    /// Send the request and, unless oneway, block for and verify the reply.
    ///
    /// If nested calls are enabled and this thread is itself inside a
    /// server dispatch call (i.e. the arbitrator's reader role), this
    /// performs `performNestedClientRequest` instead: the wait is driven by
    /// pumping the same reader rather than blocking on a second semaphore
    /// nothing would ever signal. The infrastructure status (not any
    /// application-level error encoded in the reply body) is handed to the
    /// installed error handler.
    pub fn perform_request(&mut self, request: &mut RequestContext) {
        let result = self.perform_client_request(request);
        if let Err(e) = result {
            log::warn!("erpc: request seq={} failed: {e}", request.sequence());
            if let Some(handler) = &self.error_handler {
                handler(e, request.sequence());
            }
        }
    }

    fn perform_client_request(&mut self, request: &mut RequestContext) -> Result<()> {
        #[cfg(feature = "nested_calls_detection")]
        let _in_flight = {
            let guard = crate::nested::InFlightGuard::enter();
            if guard.already_in_flight() && !self.has_nested_path() {
                return Err(Error::NestedCallFailure);
            }
            guard
        };

        #[cfg(feature = "pre_post_hooks")]
        if let Some(hooks) = &mut self.hooks {
            hooks.pre();
        }

        #[cfg(feature = "nested_calls")]
        let nested_server = crate::nested::current_server();
        #[cfg(feature = "nested_calls")]
        let result = match nested_server {
            Some(server) => self.perform_nested_client_request(&server, request),
            None => self.perform_ordinary_client_request(request),
        };
        #[cfg(not(feature = "nested_calls"))]
        let result = self.perform_ordinary_client_request(request);

        #[cfg(feature = "pre_post_hooks")]
        if let Some(hooks) = &mut self.hooks {
            hooks.post();
        }

        result
    }

    #[cfg(feature = "nested_calls_detection")]
    fn has_nested_path(&self) -> bool {
        #[cfg(feature = "nested_calls")]
        {
            crate::nested::current_server().is_some()
        }
        #[cfg(not(feature = "nested_calls"))]
        {
            false
        }
    }

    fn perform_ordinary_client_request(&mut self, request: &mut RequestContext) -> Result<()> {
        request.codec.status()?;
        let token = self.transport.begin(request.sequence);

        #[cfg(feature = "message_logging")]
        self.loggers.log_send(request.codec.buffer())?;
        self.transport.send(request.codec.buffer())?;

        if request.oneway {
            return Ok(());
        }

        let mut reply_buf = MessageBuffer::with_capacity(request.codec.buffer().capacity());
        self.transport.receive(token, &mut reply_buf)?;
        #[cfg(feature = "message_logging")]
        self.loggers.log_receive(&reply_buf)?;
        request.codec.set_buffer(reply_buf);
        request.codec.start_read_at(6);
        self.verify_reply(request)
    }

    /// Issue the request normally but have a server's own pump loop drive
    /// the wait, dispatching any ordinary invocations it sees along the way.
    #[cfg(feature = "nested_calls")]
    fn perform_nested_client_request(
        &mut self,
        server: &std::sync::Arc<dyn crate::nested::NestedPump>,
        request: &mut RequestContext,
    ) -> Result<()> {
        request.codec.status()?;
        #[cfg(feature = "message_logging")]
        self.loggers.log_send(request.codec.buffer())?;
        self.transport.send(request.codec.buffer())?;

        if request.oneway {
            return Ok(());
        }

        let reply_buf = server.pump_until_reply(request.sequence)?;
        #[cfg(feature = "message_logging")]
        self.loggers.log_receive(&reply_buf)?;
        request.codec.set_buffer(reply_buf);
        request.codec.start_read_at(6);
        self.verify_reply(request)
    }

    /// Reset the codec past the frame prefix, read the reply header, and
    /// check that it is a reply carrying this request's sequence number.
    fn verify_reply(&self, request: &mut RequestContext) -> Result<()> {
        match request.codec.start_read_message() {
            Some((MessageType::Reply, _service, _method, sequence)) if sequence == request.sequence => {
                Ok(())
            }
            Some(_) => Err(Error::ExpectedReply),
            None => request.codec.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc16::Crc16;
    use crate::factory::DynamicBufferFactory;
    use crate::transport::{DuplexPipe, FramedTransport};

    fn paired_clients() -> (
        ClientManager<FramedTransport<DuplexPipe>>,
        FramedTransport<DuplexPipe>,
    ) {
        let (a, b) = DuplexPipe::pair();
        let client_transport = FramedTransport::new(a, Crc16::new(0xEF4A));
        let peer_transport = FramedTransport::new(b, Crc16::new(0xEF4A));
        let client = ClientManager::new(client_transport, Box::new(DynamicBufferFactory::new(128)));
        (client, peer_transport)
    }

    #[test]
    fn oneway_request_has_no_reply_wait() {
        let (mut client, mut peer) = paired_clients();
        let mut req = client.create_request(true).unwrap();
        client.start_request(&mut req, 1, 2);
        req.codec_mut().write_u32(7);
        client.perform_request(&mut req);

        let mut rx = MessageBuffer::with_capacity(128);
        peer.receive(&mut rx).unwrap();
        assert_eq!(rx.used() > 0, true);
    }

    #[test]
    fn invocation_round_trip_verifies_sequence() {
        let (mut client, mut peer) = paired_clients();
        let mut req = client.create_request(false).unwrap();
        client.start_request(&mut req, 1, 2);
        req.codec_mut().write_u32(0xDEADBEEF);

        let handle = std::thread::spawn(move || {
            let mut rx = MessageBuffer::with_capacity(128);
            peer.receive(&mut rx).unwrap();
            let mut codec = Codec::new();
            codec.set_buffer(rx);
            codec.start_read_at(6);
            let (_, _, _, sequence) = codec.start_read_message().unwrap();
            let arg = codec.read_u32().unwrap();

            let mut reply = Codec::new();
            reply.set_buffer(MessageBuffer::with_capacity(128));
            reply.reset(6);
            reply.start_write_message(MessageType::Reply, 1, 2, sequence);
            reply.write_u32(arg + 1);
            peer.send(reply.buffer()).unwrap();
        });

        client.perform_request(&mut req);
        handle.join().unwrap();
        assert!(req.codec().is_ok());
        assert_eq!(req.codec_mut().read_u32(), Some(0xDEADBEF0));
    }
}
