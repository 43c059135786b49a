use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Protocol level failures while decoding frames.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame header truncated: need {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },
    #[error("frame declares {declared} payload bytes but only {available} are present")]
    LengthMismatch { declared: u64, available: usize },
    #[error("invalid opcode {0:#X}")]
    InvalidOpcode(u8),
    #[error("continuation frame without a pending message")]
    UnexpectedContinuation,
    #[error("close frame payload of {0} byte(s) cannot carry a status code")]
    InvalidClosePayload(usize),
    #[error("frame payload of {length} bytes exceeds the limit of {limit}")]
    TooLarge { length: u64, limit: u64 },
}

/// Failures of the byte-moving layer underneath a connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("transport closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("unsupported websocket version {0:?}, need 13 or above")]
    UnsupportedVersion(String),
    #[error("missing Sec-WebSocket-Key")]
    MissingKey,
    #[error("Sec-WebSocket-Accept does not match the client key")]
    AcceptMismatch,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    #[error("connection is not open")]
    NotOpen,
}

impl Error {
    /// Whether the error came from the peer violating the protocol.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Frame(_))
    }
}
