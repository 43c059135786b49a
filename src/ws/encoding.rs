use super::consts::*;
use super::frame::apply_mask;
use super::opcode::Opcode;

pub fn encode_length(length: usize, masked: bool) -> Vec<u8> {
    let mask_bit = if masked { MASKED_MASK } else { 0 };
    if length <= 125 {
        // the first byte is the length
        vec![length as u8 | mask_bit]
    } else if length <= 65535 {
        // the first byte is 126, read the next 2 bytes as u16 for a length
        [&[LENGTH_U16 | mask_bit][..], &(length as u16).to_be_bytes()].concat()
    } else {
        // the first byte is 127, read the next 8 bytes as u64 for a length
        [&[LENGTH_U64 | mask_bit][..], &(length as u64).to_be_bytes()].concat()
    }
}

pub fn encode_frame(payload: &[u8], opcode: Opcode, fin: bool, mask: Option<[u8; 4]>) -> Vec<u8> {
    let first_byte = opcode.encode() | if fin { FIN_MASK } else { 0 };
    let length = encode_length(payload.len(), mask.is_some());

    let mut buffer = Vec::with_capacity(1 + length.len() + MASK_KEY_LENGTH + payload.len());
    buffer.push(first_byte);
    buffer.extend_from_slice(&length);
    match mask {
        Some(key) => {
            buffer.extend_from_slice(&key);
            let start = buffer.len();
            buffer.extend_from_slice(payload);
            apply_mask(&mut buffer[start..], key);
        }
        None => buffer.extend_from_slice(payload),
    }
    buffer
}

#[cfg(test)]
#[path = "encoding_test.rs"]
mod tests;
