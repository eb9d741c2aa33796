// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Runtime configuration (§6): the values that are legitimately runtime data
// rather than compile-time shape — buffer sizing and the IDL-fingerprint
// CRC seed — bundled in one place so setup code builds a `Crc16` and a
// buffer factory consistently instead of scattering magic numbers. Cargo
// features (`threading`, `nested_calls`, `message_logging`,
// `pre_post_hooks`, `slab_pool`) cover the compile-time half of
// configuration; this struct covers the runtime half.

use crate::crc16::Crc16;
use crate::factory::{BufferFactory, DynamicBufferFactory};

/// Runtime-tunable parameters shared by a client manager and server built
/// over the same link.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Build-time IDL fingerprint both ends of a link must agree on.
    pub crc_seed: u16,
    pub default_buffer_size: usize,
    pub default_buffers_count: usize,
    pub clients_threads_amount: usize,
    pub nested_calls_detection: bool,
}

impl RuntimeConfig {
    /// Sane defaults for everything except the CRC seed, which has no safe
    /// default — it must be supplied explicitly, same as [`Crc16::new`].
    pub fn new(crc_seed: u16) -> Self {
        Self {
            crc_seed,
            default_buffer_size: 256,
            default_buffers_count: 8,
            clients_threads_amount: 1,
            nested_calls_detection: false,
        }
    }

    pub fn crc(&self) -> Crc16 {
        Crc16::new(self.crc_seed)
    }

    pub fn dynamic_buffer_factory(&self) -> Box<dyn BufferFactory> {
        Box::new(DynamicBufferFactory::new(self.default_buffer_size))
    }

    #[cfg(feature = "slab_pool")]
    pub fn static_buffer_factory(&self) -> Box<dyn BufferFactory> {
        Box::new(crate::factory::StaticBufferFactory::new(
            self.default_buffer_size,
            self.default_buffers_count,
        ))
    }
}
