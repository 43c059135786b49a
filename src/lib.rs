//! WebSocket (RFC 6455) protocol engine: frame codec, fragment reassembly,
//! control frame policy and the connection state machine, with a blocking
//! socket transport and an async tokio transport.

pub mod config;
pub mod error;
pub mod ws;

pub use config::WebSocketConfig;
pub use error::{Error, FrameError, HandshakeError, Result, TransportError};
