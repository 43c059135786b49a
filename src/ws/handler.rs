use super::connection::Connection;
use super::message::{ClosingInfo, Message};

/// Application callbacks. Invoked outside the connection lock, so handlers may
/// send on or close the connection they are given.
///
/// `on_open` and `on_close` fire at most once per connection.
pub trait Handler: Send + Sync {
    fn on_open(&self, _connection: &Connection) {}

    /// A complete text message.
    fn on_message(&self, _connection: &Connection, _message: Message) {}

    /// One binary fragment, `message.last` marks the end of the binary message.
    fn on_binary(&self, _connection: &Connection, _message: Message) {}

    fn on_error(&self, _connection: &Connection, _error: &str) {}

    fn on_close(&self, _connection: &Connection, _info: &ClosingInfo) {}
}
