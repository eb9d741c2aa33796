// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Error taxonomy for the RPC runtime. One variant per erpc_status_t kind;
// `Status` is an alias for the same type rather than a distinct success/error
// split, since `Result<(), Error>` already carries that distinction.

use std::fmt;

/// Every way a call through this runtime can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Generic unspecified failure.
    Fail,
    /// An argument passed to a runtime API was invalid (e.g. unknown service id).
    InvalidArgument,
    /// A blocking operation exceeded its deadline.
    Timeout,
    /// The message header carried an unsupported codec version.
    InvalidMessageVersion,
    /// A client expected a reply message but got something else.
    ExpectedReply,
    /// A CRC-16 check (header or body) failed.
    CrcCheckFailed,
    /// A read or write exceeded the bounds of the underlying buffer.
    BufferOverrun,
    /// A callback index had no corresponding entry in the callback table.
    UnknownCallback,
    /// A requested resource (buffer, codec, pending-client slot) has no name match.
    UnknownName,
    /// The underlying transport could not establish a connection.
    ConnectionFailure,
    /// The underlying transport's connection was closed.
    ConnectionClosed,
    /// A buffer or codec could not be allocated.
    MemoryError,
    /// The server is not running (stopped or never started).
    ServerIsDown,
    /// Initialization of a runtime component failed.
    InitFailed,
    /// The transport failed to receive a message.
    ReceiveFailed,
    /// The transport failed to send a message.
    SendFailed,
    /// A client call was attempted from inside another in-flight call on the
    /// same thread, and nested calls are not enabled.
    NestedCallFailure,
    /// An address/scale computation overflowed or underflowed.
    BadAddressScale,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Error::Fail => "generic failure",
            Error::InvalidArgument => "invalid argument",
            Error::Timeout => "operation timed out",
            Error::InvalidMessageVersion => "unsupported message version",
            Error::ExpectedReply => "expected a reply message",
            Error::CrcCheckFailed => "CRC-16 check failed",
            Error::BufferOverrun => "buffer overrun",
            Error::UnknownCallback => "unknown callback index",
            Error::UnknownName => "unknown name",
            Error::ConnectionFailure => "connection failure",
            Error::ConnectionClosed => "connection closed",
            Error::MemoryError => "memory allocation failure",
            Error::ServerIsDown => "server is down",
            Error::InitFailed => "initialization failed",
            Error::ReceiveFailed => "receive failed",
            Error::SendFailed => "send failed",
            Error::NestedCallFailure => "nested call not permitted",
            Error::BadAddressScale => "bad address/scale computation",
        };
        f.write_str(s)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut => Error::Timeout,
            std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe => {
                Error::ConnectionClosed
            }
            std::io::ErrorKind::NotConnected | std::io::ErrorKind::ConnectionRefused => {
                Error::ConnectionFailure
            }
            _ => Error::Fail,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Alias kept distinct in name from [`Error`] only at the API boundary where
/// the source spoke of a "status" rather than an error — the type is the
/// same, since `Result<(), Status>` already distinguishes success from
/// failure without a separate zero variant.
pub type Status = Error;
