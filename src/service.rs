// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Service dispatch (§3, §4.7): a service owns a service id and a dispatch
// function that reads the argument tuple from the codec, invokes user code,
// and (unless the call is oneway) writes a reply header and result back
// into the same codec. The spec models the registry as an intrusive
// singly-linked list; a `Vec` gives the same "find by id, dispatch" lookup
// without hand-rolled link bookkeeping and is the idiomatic choice here.

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::factory::BufferFactory;

/// One registered service: a stable id plus the dispatch function user code
/// (typically generated from an IDL) implements.
pub trait Service: Send + Sync {
    fn service_id(&self) -> u32;

    /// Read the method's arguments from `codec`, run the handler, and write
    /// the reply (unless `oneway`). `codec`'s buffer may have been swapped
    /// out from under it by the caller for zero-copy reasons — operate only
    /// through the codec, never by holding onto a buffer reference.
    fn dispatch(
        &self,
        method_id: u32,
        sequence: u32,
        oneway: bool,
        codec: &mut Codec,
        buffer_factory: &dyn BufferFactory,
    ) -> Result<()>;
}

/// Looks services up by id and dispatches into them.
#[derive(Default)]
pub struct ServiceRegistry {
    services: Vec<Box<dyn Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self { services: Vec::new() }
    }

    pub fn add_service(&mut self, service: Box<dyn Service>) {
        self.services.push(service);
    }

    pub fn find(&self, service_id: u32) -> Option<&dyn Service> {
        self.services.iter().find(|s| s.service_id() == service_id).map(|b| b.as_ref())
    }

    /// Dispatch an invocation/oneway message to the matching service.
    pub fn dispatch(
        &self,
        service_id: u32,
        method_id: u32,
        sequence: u32,
        oneway: bool,
        codec: &mut Codec,
        buffer_factory: &dyn BufferFactory,
    ) -> Result<()> {
        match self.find(service_id) {
            Some(service) => service.dispatch(method_id, sequence, oneway, codec, buffer_factory),
            None => Err(Error::InvalidArgument),
        }
    }
}
