use std::time::Duration;

use super::opcode::Opcode;
use crate::error::TransportError;

pub mod blocking;
pub mod stream;

pub use blocking::{spawn_listener, BlockingTransport, ListenerHandle};
pub use stream::{split, StreamTasks, StreamTransport};

/// The byte-moving side of a connection.
///
/// Frames arrive fully encoded; `opcode` and `fin` are informational. Reading is
/// driven by the transport's own listener, which feeds `Connection::receive`.
pub trait Transport: Send + Sync {
    fn write(&self, frame: Vec<u8>, opcode: Opcode, fin: bool) -> Result<(), TransportError>;

    /// Our close frame went out; tear down if the peer has not answered within `timeout`.
    fn closing(&self, _timeout: Duration) {}

    /// Tear down. Must be idempotent and unblock a pending read.
    fn close(&self);
}
