// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Blocking TCP stream transport: one concrete wiring of `RawChannel` to a
// real OS socket, demonstrating the abstract interface against hardware.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use super::raw::RawChannel;
use crate::error::Result;

/// Wraps a connected `TcpStream` as a raw byte channel.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub fn connect(addr: impl std::net::ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true).ok();
        Ok(Self { stream })
    }

    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_read_timeout(timeout)?;
        Ok(())
    }
}

impl RawChannel for TcpTransport {
    fn raw_send(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data)?;
        Ok(())
    }

    fn raw_receive(&mut self, buf: &mut [u8]) -> Result<()> {
        self.stream.read_exact(buf)?;
        Ok(())
    }

    fn has_data(&mut self) -> Result<bool> {
        // A blocking stream has no portable non-consuming peek; pairing this
        // transport with `Server::poll` requires a non-blocking socket and a
        // `peek` call, left to a future transport variant. The plain `run`
        // loop (which only needs blocking `receive`) works unmodified.
        Ok(true)
    }
}
