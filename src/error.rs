//! Error types for the framing codec and the event loop / command handler.
//!
//! `CodecError` covers everything that can go wrong encoding or decoding a
//! single frame; `SwcError` wraps it plus the fatal I/O and invariant failures
//! that abort the event loop, replacing the original's `bailOut()`-and-exit
//! convention with ordinary error propagation.

use std::io;
use thiserror::Error;

/// Errors from `crate::codec`.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A fixed-length opcode was encoded with a payload of the wrong size.
    #[error("payload length {actual} does not match fixed length {expected} for opcode {opcode}")]
    LengthMismatch {
        opcode: u8,
        expected: u8,
        actual: usize,
    },
    /// The first byte read was not in the opcode table.
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
    /// The underlying byte stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors from the event loop and command handlers.
#[derive(Debug, Error)]
pub enum SwcError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The debugger emitted a sentinel-bracketed command this coordinator
    /// doesn't recognize — treated as fatal per spec.md §7.
    #[error("debugger protocol violation: {0}")]
    DebuggerProtocol(String),
    /// A `waitpid`/`fork`/`pipe`/`poll` syscall failed.
    #[error("syscall {call} failed: {source}")]
    Syscall {
        call: &'static str,
        #[source]
        source: io::Error,
    },
}
