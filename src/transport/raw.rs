// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The byte-level primitive concrete hardware/socket transports implement.
// `FramedTransport` is built on top of this, not on `Transport` itself —
// the wire framing it adds is what turns a raw stream into message-level
// send/receive.

use crate::error::Result;

/// A raw, unframed byte pipe: exactly the primitive a UART, SPI slave, or
/// TCP stream driver exposes.
pub trait RawChannel: Send {
    /// Write all of `data`.
    fn raw_send(&mut self, data: &[u8]) -> Result<()>;
    /// Fill `buf` completely, blocking until it is full.
    fn raw_receive(&mut self, buf: &mut [u8]) -> Result<()>;
    /// Non-blocking poll for whether at least one byte is available.
    fn has_data(&mut self) -> Result<bool>;
}
