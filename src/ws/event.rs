use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use super::connection::Connection;
use super::handler::Handler;
use super::message::{ClosingInfo, Message};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Open,
    Message(Message),
    Binary(Message),
    Error(String),
    Close(ClosingInfo),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub source: Uuid,
    pub kind: EventKind,
}

pub type Receiver = UnboundedReceiver<Event>;
pub type Sender = UnboundedSender<Event>;

/// Handler that turns callbacks into events for the owner's loop to drain.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    sender: Sender,
}

impl ChannelHandler {
    pub fn new(sender: Sender) -> Self {
        ChannelHandler { sender }
    }

    fn forward(&self, connection: &Connection, kind: EventKind) {
        let event = Event {
            source: connection.info().id,
            kind,
        };
        if self.sender.send(event).is_err() {
            tracing::debug!(id = %connection.info().id, "event receiver dropped");
        }
    }
}

impl Handler for ChannelHandler {
    fn on_open(&self, connection: &Connection) {
        self.forward(connection, EventKind::Open);
    }
    fn on_message(&self, connection: &Connection, message: Message) {
        self.forward(connection, EventKind::Message(message));
    }
    fn on_binary(&self, connection: &Connection, message: Message) {
        self.forward(connection, EventKind::Binary(message));
    }
    fn on_error(&self, connection: &Connection, error: &str) {
        self.forward(connection, EventKind::Error(error.to_string()));
    }
    fn on_close(&self, connection: &Connection, info: &ClosingInfo) {
        self.forward(connection, EventKind::Close(info.clone()));
    }
}
