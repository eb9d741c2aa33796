// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Nested call over an arbitrated link (§8 invariant 6, scenario E5): a
// server handler for method A issues its own client call for method B on
// the same shared transport it is being dispatched from. The reply for B
// must reach the nested call before the outer dispatch of A resumes and
// sends A's own reply, all while the physical link carries only one frame
// at a time.

use std::sync::Arc;
use std::thread;

use erpc_rs::codec::{Codec, MessageType};
use erpc_rs::crc16::Crc16;
use erpc_rs::error::{Error, Result};
use erpc_rs::factory::{BufferFactory, DynamicBufferFactory};
use erpc_rs::service::{Service, ServiceRegistry};
use erpc_rs::transport::{DuplexPipe, FramedTransport};
use erpc_rs::{Arbitrator, ClientManager, MessageBuffer, Server, Transport};

const HEADER: usize = 6;
const SERVICE: u32 = 1;
const METHOD_A: u32 = 10;
const METHOD_B: u32 = 20;

/// Service A's handler issues a nested client call to method B over the
/// same arbitrated transport it was dispatched from, then folds B's result
/// into A's own reply.
struct ForwardingService {
    nested_client: Arc<std::sync::Mutex<ClientManager<Arc<Arbitrator<FramedTransport<DuplexPipe>>>>>>,
}

impl Service for ForwardingService {
    fn service_id(&self) -> u32 {
        SERVICE
    }

    fn dispatch(
        &self,
        method_id: u32,
        sequence: u32,
        oneway: bool,
        codec: &mut Codec,
        _buffer_factory: &dyn BufferFactory,
    ) -> Result<()> {
        assert_eq!(method_id, METHOD_A, "only method A is invoked from outside in this test");
        let a_arg = codec.read_i32().ok_or(Error::Fail)?;

        let mut client = self.nested_client.lock().unwrap();
        let mut nested_req = client.create_request(false)?;
        client.start_request(&mut nested_req, SERVICE, METHOD_B);
        nested_req.codec_mut().write_i32(a_arg);
        client.perform_request(&mut nested_req);
        assert!(nested_req.codec().is_ok(), "nested call B must complete before A's dispatch resumes");
        let b_result = nested_req.codec_mut().read_i32().ok_or(Error::Fail)?;
        client.release_request(nested_req);
        drop(client);

        if oneway {
            return Ok(());
        }
        codec.reset(HEADER);
        codec.start_write_message(MessageType::Reply, SERVICE, method_id, sequence);
        codec.write_i32(b_result + 1);
        Ok(())
    }
}

#[test]
fn e5_nested_call_resolves_before_outer_dispatch_resumes() {
    let (server_side, peer_side) = DuplexPipe::pair();
    let crc = Crc16::new(0xEF4A);
    let header_skip = FramedTransport::<DuplexPipe>::reserve_header_size();

    let arb = Arc::new(Arbitrator::new(FramedTransport::new(server_side, crc), header_skip, 256));
    let nested_client = Arc::new(std::sync::Mutex::new(ClientManager::new(
        arb.clone(),
        Box::new(DynamicBufferFactory::new(256)) as Box<dyn BufferFactory>,
    )));

    let mut registry = ServiceRegistry::new();
    registry.add_service(Box::new(ForwardingService { nested_client }));
    let server = Arc::new(Server::arbitrated(
        arb,
        registry,
        Box::new(DynamicBufferFactory::new(256)),
        header_skip,
    ));

    // The peer plays both roles from the other end of the link: the
    // outside caller of A, and the server for the nested call B.
    let peer_handle = thread::spawn(move || {
        let mut peer = FramedTransport::new(peer_side, crc);

        // Issue invocation A, sequence 100, argument 41.
        let mut codec = Codec::new();
        codec.set_buffer(MessageBuffer::with_capacity(256));
        codec.reset(HEADER);
        codec.start_write_message(MessageType::Invocation, SERVICE, METHOD_A, 100);
        codec.write_i32(41);
        peer.send(codec.buffer()).unwrap();

        // The nested call for B arrives next, carrying its own sequence
        // (the nested client manager's independent counter starting at 0).
        let mut rx = MessageBuffer::with_capacity(256);
        peer.receive(&mut rx).unwrap();
        let mut in_codec = Codec::new();
        in_codec.set_buffer(rx);
        in_codec.start_read_at(HEADER);
        let (msg_type, service, method, seq_b) = in_codec.start_read_message().unwrap();
        assert_eq!(msg_type, MessageType::Invocation);
        assert_eq!((service, method), (SERVICE, METHOD_B));
        let b_arg = in_codec.read_i32().unwrap();

        // Reply to B before A's completion is observable: this is the
        // crux of the nested-call invariant under test.
        let mut reply_b = Codec::new();
        reply_b.set_buffer(MessageBuffer::with_capacity(256));
        reply_b.reset(HEADER);
        reply_b.start_write_message(MessageType::Reply, SERVICE, method, seq_b);
        reply_b.write_i32(b_arg * 2);
        peer.send(reply_b.buffer()).unwrap();

        // Only now does A's own reply arrive, carrying sequence 100.
        let mut rx2 = MessageBuffer::with_capacity(256);
        peer.receive(&mut rx2).unwrap();
        let mut reply_codec = Codec::new();
        reply_codec.set_buffer(rx2);
        reply_codec.start_read_at(HEADER);
        let (msg_type, _service, _method, seq_a) = reply_codec.start_read_message().unwrap();
        assert_eq!(msg_type, MessageType::Reply);
        assert_eq!(seq_a, 100);
        reply_codec.read_i32().unwrap()
    });

    // One `run_once` on the arbitrated server pumps both the outer
    // invocation and, from inside the handler it dispatches, the nested
    // call's reply — the arbitrator's reader role is reentered rather than
    // needing a second thread to service it.
    server.run_once().unwrap();

    let a_result = peer_handle.join().unwrap();
    // a_arg=41 -> B computes 41*2=82 -> A's handler replies with 82+1=83.
    assert_eq!(a_result, 83);
}
