// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Message loggers (§4.9): an ordered chain of side-channel transports each
// sent/received buffer is mirrored to, after CRC validation and before the
// buffer reaches the application. The first logger to fail short-circuits
// the chain and its error becomes the codec status; loggers never touch
// buffer contents.

use crate::buffer::MessageBuffer;
use crate::error::Result;
use crate::transport::Transport;

/// An ordered list of transports every sent/received message is mirrored to.
pub struct LoggerChain {
    loggers: Vec<Box<dyn Transport>>,
}

impl LoggerChain {
    pub fn new() -> Self {
        Self { loggers: Vec::new() }
    }

    pub fn add(&mut self, logger: Box<dyn Transport>) {
        self.loggers.push(logger);
    }

    pub fn log_send(&mut self, buf: &MessageBuffer) -> Result<()> {
        for logger in &mut self.loggers {
            logger.send(buf)?;
        }
        Ok(())
    }

    pub fn log_receive(&mut self, buf: &MessageBuffer) -> Result<()> {
        for logger in &mut self.loggers {
            logger.send(buf)?;
        }
        Ok(())
    }
}

impl Default for LoggerChain {
    fn default() -> Self {
        Self::new()
    }
}
