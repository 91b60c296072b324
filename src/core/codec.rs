//! Length-prefixed frame codec.
//!
//! Implements [`Encoder`] and [`Decoder`] so a connection can run the wire
//! format through `FramedRead`/`FramedWrite`. The header is two fixed-width
//! big-endian (network byte order) `u32` fields: payload length, then message
//! id. Byte order is part of the wire contract.
//!
//! A declared payload length above `max_packet_size` is a protocol fault, not
//! a recoverable condition: the decoder errors out before consuming a single
//! payload byte and no resynchronization is attempted.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::message::Message;
use crate::error::WireError;

/// Fixed header length: payload length (4) + message id (4).
pub const HEADER_LEN: usize = 8;

/// Codec for the length-prefixed wire format.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_packet_size: usize,
}

impl FrameCodec {
    /// Build a codec enforcing the given maximum payload size. The header's
    /// length field is a `u32`, so a larger maximum is clamped to `u32::MAX`.
    pub fn new(max_packet_size: usize) -> Self {
        Self {
            max_packet_size: max_packet_size.min(u32::MAX as usize),
        }
    }

    /// Maximum payload size this codec accepts, in bytes.
    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = WireError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if msg.len() > self.max_packet_size {
            return Err(WireError::OversizedFrame(msg.len()));
        }

        dst.reserve(HEADER_LEN + msg.len());
        dst.put_u32(msg.len() as u32);
        dst.put_u32(msg.id());
        dst.extend_from_slice(msg.payload());
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Message;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            // Not enough for a header yet; wait for more bytes.
            return Ok(None);
        }

        // Peek the header without consuming it so a partial payload can stay
        // buffered across reads.
        let payload_len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if payload_len > self.max_packet_size {
            return Err(WireError::OversizedFrame(payload_len));
        }

        if src.len() < HEADER_LEN + payload_len {
            src.reserve(HEADER_LEN + payload_len - src.len());
            return Ok(None);
        }

        src.advance(4);
        let id = src.get_u32();
        let payload = src.split_to(payload_len).freeze();
        Ok(Some(Message::new(id, payload)))
    }
}
