// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Abstract transport surface plus concrete transports. The core is
// oblivious to how `send`/`receive` move bytes; framing, CRC protection and
// arbitration are layered on top of whatever implements this trait.

mod duplex;
mod framed;
mod raw;
mod tcp;

pub use duplex::DuplexPipe;
pub use framed::FramedTransport;
pub use raw::RawChannel;
pub use tcp::TcpTransport;

use crate::buffer::MessageBuffer;
use crate::error::Result;

/// The minimal contract every message-level byte pipe must satisfy.
///
/// `send` must transmit exactly `buf.used()` bytes. `receive` must fill
/// `buf` with one complete message and set its `used` mark. `has_message` is
/// a non-blocking poll used by the bare-metal `Server::poll` path.
pub trait Transport: Send {
    fn send(&mut self, buf: &MessageBuffer) -> Result<()>;
    fn receive(&mut self, buf: &mut MessageBuffer) -> Result<()>;
    fn has_message(&mut self) -> Result<bool>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, buf: &MessageBuffer) -> Result<()> {
        (**self).send(buf)
    }

    fn receive(&mut self, buf: &mut MessageBuffer) -> Result<()> {
        (**self).receive(buf)
    }

    fn has_message(&mut self) -> Result<bool> {
        (**self).has_message()
    }
}
