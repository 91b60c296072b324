//! Logical protocol message: a numeric message id plus an opaque payload.
//!
//! The message id is what routers are registered against; the payload is
//! application-defined bytes, untouched by the framework.

use bytes::Bytes;

/// One decoded (or to-be-encoded) protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: u32,
    payload: Bytes,
}

impl Message {
    /// Build a message from an id and payload bytes.
    pub fn new(id: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }

    /// Message id used for router lookup.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Borrow the payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take the payload without copying.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}
