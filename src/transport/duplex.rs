// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// In-process loopback byte pipe for tests and demos. Grounded in
// rpc_protocol's socketpair-backed `pipe::Endpoint`, reimplemented over
// `std::sync::mpsc` so the whole client/server/arbitrator stack is
// exercisable without real hardware or OS sockets.

use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, Sender};
use std::time::Duration;

use super::raw::RawChannel;
use crate::error::{Error, Result};

/// One end of an in-process duplex byte pipe. Use [`DuplexPipe::pair`] to
/// build both ends at once.
pub struct DuplexPipe {
    tx: Sender<u8>,
    rx: Receiver<u8>,
    /// Bytes pulled out by `has_data`'s `try_recv` peek but not yet consumed
    /// by a `raw_receive` call.
    pending: VecDeque<u8>,
    recv_timeout: Option<Duration>,
}

impl DuplexPipe {
    /// Build a connected pair: bytes sent on one end arrive, in order, on
    /// the other.
    pub fn pair() -> (DuplexPipe, DuplexPipe) {
        let (tx_a, rx_a) = std::sync::mpsc::channel();
        let (tx_b, rx_b) = std::sync::mpsc::channel();
        (
            DuplexPipe { tx: tx_a, rx: rx_b, pending: VecDeque::new(), recv_timeout: None },
            DuplexPipe { tx: tx_b, rx: rx_a, pending: VecDeque::new(), recv_timeout: None },
        )
    }

    /// Bound how long `raw_receive` will wait for each byte before failing
    /// with [`Error::Timeout`]. Unset by default (blocks forever).
    pub fn set_recv_timeout(&mut self, timeout: Option<Duration>) {
        self.recv_timeout = timeout;
    }

    fn next_byte(&mut self) -> Result<u8> {
        if let Some(b) = self.pending.pop_front() {
            return Ok(b);
        }
        match self.recv_timeout {
            Some(t) => self.rx.recv_timeout(t).map_err(|e| match e {
                std::sync::mpsc::RecvTimeoutError::Timeout => Error::Timeout,
                std::sync::mpsc::RecvTimeoutError::Disconnected => Error::ConnectionClosed,
            }),
            None => self.rx.recv().map_err(|_| Error::ConnectionClosed),
        }
    }
}

impl RawChannel for DuplexPipe {
    fn raw_send(&mut self, data: &[u8]) -> Result<()> {
        for &b in data {
            self.tx.send(b).map_err(|_| Error::ConnectionClosed)?;
        }
        Ok(())
    }

    fn raw_receive(&mut self, buf: &mut [u8]) -> Result<()> {
        for slot in buf.iter_mut() {
            *slot = self.next_byte()?;
        }
        Ok(())
    }

    fn has_data(&mut self) -> Result<bool> {
        if !self.pending.is_empty() {
            return Ok(true);
        }
        match self.rx.try_recv() {
            Ok(b) => {
                self.pending.push_back(b);
                Ok(true)
            }
            Err(std::sync::mpsc::TryRecvError::Empty) => Ok(false),
            Err(std::sync::mpsc::TryRecvError::Disconnected) => Err(Error::ConnectionClosed),
        }
    }
}
