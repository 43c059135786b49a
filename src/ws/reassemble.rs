use super::frame::Frame;
use super::message::{ClosingInfo, Message, MessageKind};
use super::opcode::Opcode;
use crate::error::FrameError;

/// What the connection has to do with one incoming frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Hand a message to the application.
    Dispatch(Message),
    /// Fragment buffered, nothing to do yet.
    Pending,
    /// Answer a ping with this payload.
    Pong(Vec<u8>),
    /// The peer answered our ping.
    Alive,
    /// The peer started or answered the closing handshake.
    Close(ClosingInfo),
}

#[derive(Debug)]
enum Pending {
    Text(Vec<u8>),
    Binary,
}

/// Inbound fragment policy: text is collected until the final fragment,
/// binary fragments go straight through.
#[derive(Debug, Default)]
pub struct Reassembler {
    pending: Option<Pending>,
}

impl Reassembler {
    pub fn new() -> Self {
        Reassembler::default()
    }

    /// Whether a fragmented message is in progress.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn push(&mut self, frame: Frame) -> Result<Action, FrameError> {
        let fin = frame.fin();
        match frame.opcode {
            Opcode::Text => Ok(self.push_text(frame.payload, fin)),
            Opcode::Binary => {
                if !matches!(self.pending, Some(Pending::Text(_))) {
                    self.pending = if fin { None } else { Some(Pending::Binary) };
                }
                Ok(Action::Dispatch(Message::binary(frame.payload, fin)))
            }
            Opcode::Continuation => match self.pending {
                Some(Pending::Text(_)) => Ok(self.push_text(frame.payload, fin)),
                Some(Pending::Binary) => {
                    if fin {
                        self.pending = None;
                    }
                    Ok(Action::Dispatch(Message::binary(frame.payload, fin)))
                }
                None => Err(FrameError::UnexpectedContinuation),
            },
            Opcode::Ping => Ok(Action::Pong(frame.payload)),
            Opcode::Pong => Ok(Action::Alive),
            Opcode::Close => Ok(Action::Close(ClosingInfo::decode(&frame.payload)?)),
        }
    }

    // a text frame while text is pending is read as its continuation,
    // peers repeat the message opcode on every fragment
    fn push_text(&mut self, payload: Vec<u8>, fin: bool) -> Action {
        let buffer = match self.pending.take() {
            Some(Pending::Text(mut buffer)) => {
                buffer.extend_from_slice(&payload);
                buffer
            }
            _ => payload,
        };
        if fin {
            Action::Dispatch(Message {
                kind: MessageKind::Text,
                payload: buffer,
                last: true,
            })
        } else {
            self.pending = Some(Pending::Text(buffer));
            Action::Pending
        }
    }
}

#[cfg(test)]
#[path = "reassemble_test.rs"]
mod tests;
