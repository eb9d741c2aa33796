// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Transport arbitrator: demultiplexes a single shared transport between
// outbound client requests and inbound server invocations. Grounded in the
// spec's pending-client-record model (§4.8/§3): a mutex-guarded active/free
// list of records, each holding a semaphore a client thread blocks on until
// the reader role — typically the server's own run loop — sees a reply
// whose sequence number matches and hands the buffer over.
//
// The source keeps separate send/receive mutexes so a full-duplex line can
// send and receive concurrently. This crate's `Transport` is a single
// `&mut self` value per link, which cannot itself be split without the
// underlying channel supporting it; `Arbitrator` instead serializes all
// access to the shared transport through one mutex (see DESIGN.md). A
// client's `send` may therefore wait behind an in-flight `receive` poll —
// exactly the behavior a half-duplex line would exhibit anyway, and the
// spec explicitly anticipates half-duplex transports (§1).

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::buffer::MessageBuffer;
use crate::client::ClientTransport;
use crate::codec::{peek_message_header, MessageType};
use crate::error::{Error, Result};
use crate::thread::Semaphore;
use crate::transport::Transport;

struct PendingRecord {
    sequence: AtomicU32,
    /// True while linked into the active list — "the reader may signal me".
    valid: AtomicBool,
    sem: Semaphore,
    reply: Mutex<Option<MessageBuffer>>,
}

impl PendingRecord {
    fn fresh(sequence: u32) -> Arc<Self> {
        Arc::new(Self {
            sequence: AtomicU32::new(sequence),
            valid: AtomicBool::new(true),
            sem: Semaphore::new(0),
            reply: Mutex::new(None),
        })
    }

    fn reuse(self: &Arc<Self>, sequence: u32) {
        self.sequence.store(sequence, Ordering::Release);
        self.valid.store(true, Ordering::Release);
        *self.reply.lock().unwrap() = None;
    }
}

/// Opaque handle returned by [`Arbitrator::prepare_client_receive`]; pass it
/// to [`Arbitrator::client_receive`] to collect the reply.
pub struct PendingToken(Arc<PendingRecord>);

impl PendingToken {
    pub fn sequence(&self) -> u32 {
        self.0.sequence.load(Ordering::Acquire)
    }
}

/// What the reader role saw on its most recent poll of the shared transport.
pub enum PumpOutcome {
    /// An invocation or oneway message arrived for the local server to
    /// dispatch.
    Invocation(MessageBuffer),
    /// A reply was routed to a waiting client, or the frame was a
    /// notification/unrecognized type and was discarded. The caller should
    /// poll again.
    NoAction,
}

struct ArbitratorState<T> {
    shared: T,
    active: Vec<Arc<PendingRecord>>,
    free: Vec<Arc<PendingRecord>>,
}

/// Interposes on a shared [`Transport`], demultiplexing inbound replies to
/// the client thread waiting for them and surfacing inbound invocations to
/// whoever is pumping it (usually a [`crate::server::Server`]).
pub struct Arbitrator<T: Transport> {
    state: Mutex<ArbitratorState<T>>,
    /// Bytes to skip before the message header when peeking a frame — the
    /// framed transport's 6-byte prefix, if the shared transport is framed.
    header_skip: usize,
    scratch_capacity: usize,
}

impl<T: Transport> Arbitrator<T> {
    pub fn new(shared: T, header_skip: usize, scratch_capacity: usize) -> Self {
        Self {
            state: Mutex::new(ArbitratorState { shared, active: Vec::new(), free: Vec::new() }),
            header_skip,
            scratch_capacity,
        }
    }

    /// Register a pending-client record for `sequence` before sending the
    /// request, so a reply racing ahead of the caller reaching
    /// `client_receive` is never missed.
    pub fn prepare_client_receive(&self, sequence: u32) -> PendingToken {
        let mut state = self.state.lock().unwrap();
        let record = match state.free.pop() {
            Some(r) => {
                r.reuse(sequence);
                r
            }
            None => PendingRecord::fresh(sequence),
        };
        state.active.push(record.clone());
        PendingToken(record)
    }

    pub fn send(&self, buf: &MessageBuffer) -> Result<()> {
        self.state.lock().unwrap().shared.send(buf)
    }

    /// Whether the shared transport reports a message waiting, for a
    /// poll-driven server loop built on top of this arbitrator.
    pub fn has_message(&self) -> Result<bool> {
        self.state.lock().unwrap().shared.has_message()
    }

    /// Block until `token`'s reply arrives (or the wait is abandoned by a
    /// shared-receive timeout waking every pending client).
    pub fn client_receive(&self, token: PendingToken, timeout: Option<Duration>) -> Result<MessageBuffer> {
        token.0.sem.get(timeout)?;
        self.retire(&token.0);
        self.take_reply(&token.0)
    }

    /// Non-blocking check used by a nested wait: has `token`'s reply arrived
    /// yet? Dispatches its own bookkeeping the same as `client_receive`.
    fn try_take(&self, token: &PendingToken) -> Option<MessageBuffer> {
        if token.0.sem.get_nonblocking().is_err() {
            return None;
        }
        self.retire(&token.0);
        self.take_reply(&token.0)
    }

    fn retire(&self, record: &Arc<PendingRecord>) {
        let mut state = self.state.lock().unwrap();
        state.active.retain(|r| !Arc::ptr_eq(r, record));
        record.valid.store(false, Ordering::Release);
        state.free.push(record.clone());
    }

    fn take_reply(&self, record: &Arc<PendingRecord>) -> Result<MessageBuffer> {
        // Woken with no reply means a shared-receive timeout fired while we
        // were pending: surface that as the call's own timeout.
        record.reply.lock().unwrap().take().ok_or(Error::Timeout)
    }

    /// Reader role: poll the shared transport once. On a reply, route it to
    /// the matching pending client (if any) and report `NoAction`; on an
    /// invocation/oneway, return it for the caller to dispatch; on a
    /// receive timeout, wake every pending client so none deadlocks
    /// waiting on a peer that has gone away.
    pub fn pump(&self) -> Result<PumpOutcome> {
        let mut local = MessageBuffer::with_capacity(self.scratch_capacity);
        let recv_result = {
            let mut state = self.state.lock().unwrap();
            state.shared.receive(&mut local)
        };
        match recv_result {
            Err(Error::Timeout) => {
                self.wake_all_pending();
                Err(Error::Timeout)
            }
            Err(e) => Err(e),
            Ok(()) => match peek_message_header(&local, self.header_skip) {
                Ok((MessageType::Invocation, ..)) | Ok((MessageType::Oneway, ..)) => {
                    Ok(PumpOutcome::Invocation(local))
                }
                Ok((MessageType::Reply, _service, _method, sequence)) => {
                    self.route_reply(sequence, local);
                    Ok(PumpOutcome::NoAction)
                }
                // Notifications have no request context to route against at
                // this layer, and a header parse failure means the frame
                // can't be trusted: both are discarded without disturbing
                // pending clients, matching the "unrecognized" path.
                Ok((MessageType::Notification, ..)) | Err(_) => Ok(PumpOutcome::NoAction),
            },
        }
    }

    fn route_reply(&self, sequence: u32, buf: MessageBuffer) {
        let mut state = self.state.lock().unwrap();
        let found = state
            .active
            .iter()
            .find(|r| r.valid.load(Ordering::Acquire) && r.sequence.load(Ordering::Acquire) == sequence)
            .cloned();
        drop(state);
        if let Some(record) = found {
            *record.reply.lock().unwrap() = Some(buf);
            record.sem.put();
        }
        // No matching record: a stray or already-abandoned reply. Dropped.
    }

    fn wake_all_pending(&self) {
        let state = self.state.lock().unwrap();
        for record in state.active.iter() {
            if record.valid.load(Ordering::Acquire) {
                record.sem.put();
            }
        }
    }

    /// Drive the shared transport, dispatching each invocation it sees via
    /// `dispatch`, until `token`'s reply arrives.
    pub fn pump_until_reply(
        &self,
        token: PendingToken,
        mut dispatch: impl FnMut(MessageBuffer) -> Result<()>,
    ) -> Result<MessageBuffer> {
        loop {
            if let Some(reply) = self.try_take(&token) {
                return Ok(reply);
            }
            match self.pump() {
                Ok(PumpOutcome::Invocation(buf)) => dispatch(buf)?,
                Ok(PumpOutcome::NoAction) => {}
                // The shared receive timed out; `wake_all_pending` already
                // ran, so our own token will show up on the next `try_take`
                // if it was among those woken. Keep polling regardless.
                Err(Error::Timeout) => {}
                Err(e) => return Err(e),
            }
        }
    }
}

/// Lets a `ClientManager<Arc<Arbitrator<T>>>` route requests through the
/// arbitrator instead of a plain transport: `begin` registers the pending
/// record before send, and `receive` blocks on it rather than on a raw
/// `Transport::receive`.
impl<T: Transport> ClientTransport for Arc<Arbitrator<T>> {
    type Token = PendingToken;

    fn begin(&self, sequence: u32) -> PendingToken {
        self.prepare_client_receive(sequence)
    }

    fn send(&mut self, buf: &MessageBuffer) -> Result<()> {
        Arbitrator::send(self, buf)
    }

    fn receive(&mut self, token: PendingToken, buf: &mut MessageBuffer) -> Result<()> {
        *buf = self.client_receive(token, None)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, MessageType as MT};
    use crate::crc16::Crc16;
    use crate::transport::{DuplexPipe, FramedTransport};
    use std::thread;

    fn framed_pair() -> (FramedTransport<DuplexPipe>, FramedTransport<DuplexPipe>) {
        let (a, b) = DuplexPipe::pair();
        (FramedTransport::new(a, Crc16::new(0xEF4A)), FramedTransport::new(b, Crc16::new(0xEF4A)))
    }

    fn reply_frame(sequence: u32, payload: u32) -> MessageBuffer {
        let mut codec = Codec::new();
        codec.set_buffer(MessageBuffer::with_capacity(64));
        codec.reset(FramedTransport::<DuplexPipe>::reserve_header_size());
        codec.start_write_message(MT::Reply, 1, 1, sequence);
        codec.write_u32(payload);
        assert!(codec.is_ok());
        codec.take_buffer()
    }

    #[test]
    fn demuxes_out_of_order_replies_to_the_right_caller() {
        let (client_side, peer_side) = framed_pair();
        let arb = Arc::new(Arbitrator::new(client_side, FramedTransport::<DuplexPipe>::reserve_header_size(), 128));

        let arb1 = arb.clone();
        let arb2 = arb.clone();
        let t1 = thread::spawn(move || {
            let token = arb1.prepare_client_receive(1);
            arb1.client_receive(token, Some(Duration::from_secs(5)))
        });
        let t2 = thread::spawn(move || {
            let token = arb2.prepare_client_receive(2);
            arb2.client_receive(token, Some(Duration::from_secs(5)))
        });

        // Give both threads a chance to register before replies arrive.
        std::thread::sleep(Duration::from_millis(20));

        let mut peer = peer_side;
        peer.send(&reply_frame(2, 0xAAAA)).unwrap();
        peer.send(&reply_frame(1, 0xBBBB)).unwrap();

        // One thread must pump to deliver both frames to the arbitrator.
        for _ in 0..2 {
            arb.pump().unwrap();
        }

        let r1 = t1.join().unwrap().unwrap();
        let r2 = t2.join().unwrap().unwrap();

        let mut c1 = Codec::new();
        c1.set_buffer(r1);
        c1.start_read_at(FramedTransport::<DuplexPipe>::reserve_header_size());
        let (_, _, _, seq1) = c1.start_read_message().unwrap();
        assert_eq!(seq1, 1);
        assert_eq!(c1.read_u32(), Some(0xBBBB));

        let mut c2 = Codec::new();
        c2.set_buffer(r2);
        c2.start_read_at(FramedTransport::<DuplexPipe>::reserve_header_size());
        let (_, _, _, seq2) = c2.start_read_message().unwrap();
        assert_eq!(seq2, 2);
        assert_eq!(c2.read_u32(), Some(0xAAAA));
    }

    #[test]
    fn timeout_wakes_all_pending_without_deadlock() {
        let (client_side, _peer_side) = framed_pair();
        let mut client_side = client_side;
        // DuplexPipe's receive blocks forever without a timeout; give it one
        // so the arbitrator's reader role can observe a timeout.
        // (FramedTransport doesn't expose the inner channel's timeout knob
        // directly, so this test drives `pump` error handling via a manual
        // timeout-shaped transport instead.)
        struct AlwaysTimesOut;
        impl Transport for AlwaysTimesOut {
            fn send(&mut self, _buf: &MessageBuffer) -> Result<()> {
                Ok(())
            }
            fn receive(&mut self, _buf: &mut MessageBuffer) -> Result<()> {
                Err(Error::Timeout)
            }
            fn has_message(&mut self) -> Result<bool> {
                Ok(false)
            }
        }
        let _ = client_side.has_message();
        let arb = Arbitrator::new(AlwaysTimesOut, 6, 64);
        let token = arb.prepare_client_receive(9);
        assert_eq!(arb.pump().unwrap_err(), Error::Timeout);
        assert_eq!(arb.client_receive(token, Some(Duration::from_millis(100))), Err(Error::Timeout));
    }
}
