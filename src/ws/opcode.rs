use super::consts::OPCODE_MASK;
use crate::error::FrameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}
impl Opcode {
    // create a new opcode from unchanged input byte,
    // reserved values 0x3-0x7 and 0xB-0xF are rejected
    pub fn decode(byte: u8) -> Result<Self, FrameError> {
        use Opcode::*;
        match byte & OPCODE_MASK {
            0x0 => Ok(Continuation),
            0x1 => Ok(Text),
            0x2 => Ok(Binary),
            0x8 => Ok(Close),
            0x9 => Ok(Ping),
            0xA => Ok(Pong),
            value => Err(FrameError::InvalidOpcode(value)),
        }
    }
    pub fn encode(&self) -> u8 {
        use Opcode::*;
        match self {
            Continuation => 0x0,
            Text => 0x1,
            Binary => 0x2,
            Close => 0x8,
            Ping => 0x9,
            Pong => 0xA,
        }
    }
    pub fn is_control(&self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }
}

#[cfg(test)]
#[path = "opcode_test.rs"]
mod tests;
