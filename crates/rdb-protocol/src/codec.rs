//! Handshake codec for the driver port.
//!
//! Client -> server (little-endian):
//!   u32 version magic | u32 auth key length | auth key | u32 protocol magic
//! Server -> client: message bytes terminated by a single NUL.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{ProtocolError, JSON_PROTOCOL_MAGIC, SUCCESS_REPLY, VERSION_MAGIC};

/// Maximum reply size before the NUL terminator.
const MAX_REPLY_SIZE: usize = 64 * 1024;

/// Client handshake carrying the (possibly empty) auth key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Handshake {
    pub auth_key: String,
}

impl Handshake {
    pub fn new(auth_key: impl Into<String>) -> Self {
        Self {
            auth_key: auth_key.into(),
        }
    }
}

/// Server reply to a handshake. Only the first line of the message is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeReply {
    pub message: String,
}

impl HandshakeReply {
    pub fn is_success(&self) -> bool {
        self.message == SUCCESS_REPLY
    }

    /// Turn a non-SUCCESS reply into `ProtocolError::Rejected`.
    pub fn into_result(self) -> crate::Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(ProtocolError::Rejected(self.message))
        }
    }
}

/// Codec for writing a handshake and reading the NUL-terminated reply.
pub struct HandshakeCodec;

impl Decoder for HandshakeCodec {
    type Item = HandshakeReply;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(nul) = src.iter().position(|b| *b == 0) else {
            if src.len() > MAX_REPLY_SIZE {
                return Err(ProtocolError::ReplyTooLarge {
                    size: src.len(),
                    max: MAX_REPLY_SIZE,
                });
            }
            return Ok(None);
        };

        if nul > MAX_REPLY_SIZE {
            return Err(ProtocolError::ReplyTooLarge {
                size: nul,
                max: MAX_REPLY_SIZE,
            });
        }

        let frame = src.split_to(nul + 1);
        let text = String::from_utf8_lossy(&frame[..nul]);
        let message = text.split('\n').next().unwrap_or_default().to_string();
        tracing::trace!(reply = %message, "handshake reply decoded");
        Ok(Some(HandshakeReply { message }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(reply) => Ok(Some(reply)),
            None if src.is_empty() => Ok(None),
            None => Err(ProtocolError::Closed),
        }
    }
}

impl Encoder<Handshake> for HandshakeCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Handshake, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let key = item.auth_key.as_bytes();
        let key_len =
            u32::try_from(key.len()).map_err(|_| ProtocolError::AuthKeyTooLong(key.len()))?;

        dst.reserve(12 + key.len());
        dst.put_u32_le(VERSION_MAGIC);
        dst.put_u32_le(key_len);
        dst.extend_from_slice(key);
        dst.put_u32_le(JSON_PROTOCOL_MAGIC);

        Ok(())
    }
}
