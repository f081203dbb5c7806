//! RDB Protocol -- client handshake for the driver port.
//!
//! Only the connection handshake lives here. Query framing is the concern
//! of real drivers (and of the companion scripts that use them).

pub mod codec;

pub use codec::{Handshake, HandshakeCodec, HandshakeReply};

/// Protocol version magic: V0_4.
pub const VERSION_MAGIC: u32 = 0x400c_2d20;

/// Wire protocol magic: JSON.
pub const JSON_PROTOCOL_MAGIC: u32 = 0x7e69_70c7;

/// Reply message sent by the server when the handshake is accepted.
pub const SUCCESS_REPLY: &str = "SUCCESS";

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("server dropped connection with message: \"{0}\"")]
    Rejected(String),
    #[error("handshake reply too large: {size} bytes (max {max})")]
    ReplyTooLarge { size: usize, max: usize },
    #[error("auth key too long: {0} bytes")]
    AuthKeyTooLong(usize),
    #[error("connection closed during handshake")]
    Closed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
