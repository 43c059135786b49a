pub mod connection;
pub mod consts;
pub mod decoding;
pub mod encoding;
pub mod event;
pub mod fragment;
pub mod frame;
pub mod handler;
pub mod handshake;
pub mod message;
pub mod opcode;
pub mod read;
pub mod reassemble;
pub mod transport;

pub use connection::{Connection, ConnectionInfo, ConnectionState, Role};
pub use decoding::{decode_frame, decode_header, FrameHeader};
pub use encoding::encode_frame;
pub use event::{ChannelHandler, Event, EventKind};
pub use frame::{apply_mask, Frame, Headers};
pub use handler::Handler;
pub use message::{ClosingInfo, Message, MessageKind};
pub use opcode::Opcode;
pub use read::*;
pub use transport::Transport;
