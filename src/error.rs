//! # Error Types
//!
//! Error handling for the server framework.
//!
//! This module defines all error variants that can occur while running a
//! server, from low-level I/O failures to wire-protocol violations.
//!
//! ## Error Categories
//! - **I/O Errors**: socket read/write failures and premature close
//! - **Protocol Errors**: malformed headers, oversized frames
//! - **Connection Errors**: sends to a stopped connection, full send queues
//! - **Configuration Errors**: invalid or unloadable configuration
//!
//! All errors implement `std::error::Error` for interoperability.
//!
//! Faults local to one connection (protocol or I/O) never affect other
//! connections or the process; only startup faults and an explicit `stop`
//! affect the whole server.

use std::io;
use thiserror::Error;

/// WireError is the primary error type for all framework operations.
#[derive(Error, Debug)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid frame header")]
    InvalidHeader,

    #[error("Frame payload too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Send queue full")]
    SendQueueFull,

    #[error("Worker pool not started")]
    WorkersNotStarted,

    #[error("No connection with id {0}")]
    ConnectionNotFound(u64),

    #[error("No property named {0:?}")]
    PropertyNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using WireError
pub type Result<T> = std::result::Result<T, WireError>;
