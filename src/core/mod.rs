//! # Core Protocol Components
//!
//! Low-level message framing over TCP byte streams.
//!
//! ## Components
//! - **Message**: one logical unit of the protocol (message id + payload)
//! - **Codec**: Tokio codec for framing messages over byte streams
//!
//! ## Wire Format
//! ```text
//! [PayloadLen(4, BE)] [MsgId(4, BE)] [Payload(N)]
//! ```
//!
//! TCP delivers a byte stream, not message boundaries: one send may arrive as
//! several reads, and several sends may coalesce into one. The length prefix
//! is what lets the decoder reassemble logical messages from that stream.
//!
//! Payload length is validated against the configured maximum before any
//! payload byte is read, so an oversized claim never causes an allocation.

pub mod codec;
pub mod message;
