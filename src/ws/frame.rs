use super::consts::*;
use super::encoding::encode_frame;
use super::opcode::Opcode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Headers {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
}
impl Headers {
    pub fn decode(byte: u8) -> Self {
        Headers {
            fin: is_fin(byte),
            rsv1: is_rsv1(byte),
            rsv2: is_rsv2(byte),
            rsv3: is_rsv3(byte),
        }
    }
    pub fn encode(&self) -> u8 {
        let mut byte = 0;
        if self.fin {
            byte |= FIN_MASK;
        }
        if self.rsv1 {
            byte |= RSV1_MASK;
        }
        if self.rsv2 {
            byte |= RSV2_MASK;
        }
        if self.rsv3 {
            byte |= RSV3_MASK;
        }
        byte
    }
}

/// One RFC 6455 frame with its payload already unmasked.
///
/// `mask` records the key the frame travelled with, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub headers: Headers,
    pub opcode: Opcode,
    pub mask: Option<[u8; 4]>,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(opcode: Opcode, fin: bool, payload: Vec<u8>) -> Self {
        Frame {
            headers: Headers {
                fin,
                ..Headers::default()
            },
            opcode,
            mask: None,
            payload,
        }
    }

    pub fn fin(&self) -> bool {
        self.headers.fin
    }

    pub fn masked(&self) -> bool {
        self.mask.is_some()
    }

    pub fn payload_length(&self) -> u64 {
        self.payload.len() as u64
    }

    /// Wire bytes for this frame, masked with `self.mask` when set.
    pub fn encode(&self) -> Vec<u8> {
        encode_frame(&self.payload, self.opcode, self.headers.fin, self.mask)
    }
}

/// XOR `payload` with the 4-byte key in place. Applying it twice restores the input.
pub fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}
