use super::consts::*;
use super::frame::{apply_mask, Frame, Headers};
use super::opcode::Opcode;
use crate::error::FrameError;

/// Everything in front of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub headers: Headers,
    pub opcode: Opcode,
    pub mask: Option<[u8; 4]>,
    pub payload_length: u64,
    pub header_length: usize,
}

impl FrameHeader {
    /// Header plus payload, the number of bytes this frame occupies on the wire.
    pub fn frame_length(&self) -> u64 {
        self.header_length as u64 + self.payload_length
    }
}

/// Size of the full header announced by the second header byte: 2, 4 or 10, plus 4 when masked.
pub fn header_length(length_byte: u8) -> usize {
    let extended = match length_byte & LENGTH_MASK {
        LENGTH_U16 => 2,
        LENGTH_U64 => 8,
        _ => 0,
    };
    let mask = if is_mask(length_byte) { MASK_KEY_LENGTH } else { 0 };
    MIN_HEADER + extended + mask
}

pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader, FrameError> {
    if bytes.len() < MIN_HEADER {
        return Err(FrameError::Truncated {
            needed: MIN_HEADER,
            available: bytes.len(),
        });
    }
    let header_length = header_length(bytes[1]);
    if bytes.len() < header_length {
        return Err(FrameError::Truncated {
            needed: header_length,
            available: bytes.len(),
        });
    }

    let headers = Headers::decode(bytes[0]);
    let opcode = Opcode::decode(bytes[0])?;

    let (payload_length, offset) = match bytes[1] & LENGTH_MASK {
        LENGTH_U16 => {
            let mut buf = [0u8; 2];
            buf.copy_from_slice(&bytes[2..4]);
            (u16::from_be_bytes(buf) as u64, 4)
        }
        LENGTH_U64 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[2..10]);
            (u64::from_be_bytes(buf), 10)
        }
        value => (value as u64, 2),
    };
    let mask = if is_mask(bytes[1]) {
        let mut key = [0u8; 4];
        key.copy_from_slice(&bytes[offset..offset + MASK_KEY_LENGTH]);
        Some(key)
    } else {
        None
    };

    Ok(FrameHeader {
        headers,
        opcode,
        mask,
        payload_length,
        header_length,
    })
}

/// Decode one frame from the front of `bytes`, unmasking the payload.
///
/// Bytes after the declared payload are left alone; use
/// [`FrameHeader::frame_length`] to advance past the frame.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, FrameError> {
    let header = decode_header(bytes)?;
    let available = bytes.len() - header.header_length;
    if header.payload_length > available as u64 {
        return Err(FrameError::LengthMismatch {
            declared: header.payload_length,
            available,
        });
    }

    let end = header.header_length + header.payload_length as usize;
    let mut payload = bytes[header.header_length..end].to_vec();
    if let Some(key) = header.mask {
        apply_mask(&mut payload, key);
    }

    Ok(Frame {
        headers: header.headers,
        opcode: header.opcode,
        mask: header.mask,
        payload,
    })
}

#[cfg(test)]
#[path = "decoding_test.rs"]
mod tests;
