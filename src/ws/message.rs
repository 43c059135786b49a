use std::str::Utf8Error;

use super::consts::*;
use crate::error::FrameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Binary,
}

/// What the application receives. Text is always complete (`last == true`),
/// binary arrives one fragment per message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub payload: Vec<u8>,
    pub last: bool,
}

impl Message {
    pub fn text(payload: Vec<u8>) -> Self {
        Message {
            kind: MessageKind::Text,
            payload,
            last: true,
        }
    }

    pub fn binary(payload: Vec<u8>, last: bool) -> Self {
        Message {
            kind: MessageKind::Binary,
            payload,
            last,
        }
    }

    pub fn as_text(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(&self.payload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosingInfo {
    pub code: u16,
    pub reason: String,
}

impl ClosingInfo {
    pub fn new(code: u16, reason: &str) -> Self {
        ClosingInfo {
            code,
            reason: truncate_reason(reason).to_string(),
        }
    }

    /// Close frame payload: big-endian status code followed by the reason.
    pub fn encode(&self) -> Vec<u8> {
        let reason = truncate_reason(&self.reason);
        [&self.code.to_be_bytes()[..], reason.as_bytes()].concat()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, FrameError> {
        match payload.len() {
            0 => Ok(ClosingInfo {
                code: CLOSE_NO_STATUS,
                reason: String::new(),
            }),
            1 => Err(FrameError::InvalidClosePayload(1)),
            _ => {
                let code = u16::from_be_bytes([payload[0], payload[1]]);
                let reason = String::from_utf8_lossy(&payload[2..]);
                Ok(ClosingInfo::new(code, &reason))
            }
        }
    }

    pub fn description(&self) -> &'static str {
        describe_close_code(self.code)
    }
}

// cut at the last char boundary within the limit
fn truncate_reason(reason: &str) -> &str {
    if reason.len() <= CLOSE_REASON_MAXIMUM {
        return reason;
    }
    let mut end = CLOSE_REASON_MAXIMUM;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    &reason[..end]
}

pub fn describe_close_code(code: u16) -> &'static str {
    match code {
        CLOSE_NORMAL => "Normal closing of the connection",
        CLOSE_GOING_AWAY => "Going away",
        CLOSE_PROTOCOL_ERROR => "Protocol error",
        CLOSE_UNSUPPORTED => "Unacceptable data",
        CLOSE_RESERVED => "Reserved",
        CLOSE_NO_STATUS => "No status code received",
        CLOSE_ABNORMAL => "Abnormal closure, no closing frame",
        CLOSE_INVALID_DATA => "Invalid payload data",
        CLOSE_POLICY => "Policy violation",
        CLOSE_TOO_BIG => "Message too big",
        CLOSE_NO_EXTENSION => "Missing extension",
        CLOSE_INTERNAL => "Internal server error",
        CLOSE_TLS => "TLS handshake failure",
        1000..=CLOSE_MAX_PROTOCOL => "Reserved for the WebSocket protocol",
        3000..=CLOSE_MAX_IANA => "Registered at IANA",
        4000..=CLOSE_MAX_PRIVATE => "Application defined",
        _ => "Unknown status code",
    }
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
