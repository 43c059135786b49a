pub const FIN_MASK: u8 = 0b1000_0000;
pub const RSV1_MASK: u8 = 0b0100_0000;
pub const RSV2_MASK: u8 = 0b0010_0000;
pub const RSV3_MASK: u8 = 0b0001_0000;
pub const OPCODE_MASK: u8 = 0b0000_1111;
pub const LENGTH_MASK: u8 = 0b0111_1111;
pub const MASKED_MASK: u8 = 0b1000_0000;

// 7-bit length markers for the extended length fields
pub const LENGTH_U16: u8 = 126;
pub const LENGTH_U64: u8 = 127;

pub const MIN_HEADER: usize = 2;
pub const MAX_HEADER: usize = 14;
pub const MASK_KEY_LENGTH: usize = 4;

// Close reason is limited by the 125 byte control frame payload minus the code
pub const CLOSE_REASON_MAXIMUM: usize = 123;

pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_GOING_AWAY: u16 = 1001;
pub const CLOSE_PROTOCOL_ERROR: u16 = 1002;
pub const CLOSE_UNSUPPORTED: u16 = 1003;
pub const CLOSE_RESERVED: u16 = 1004;
pub const CLOSE_NO_STATUS: u16 = 1005;
pub const CLOSE_ABNORMAL: u16 = 1006;
pub const CLOSE_INVALID_DATA: u16 = 1007;
pub const CLOSE_POLICY: u16 = 1008;
pub const CLOSE_TOO_BIG: u16 = 1009;
pub const CLOSE_NO_EXTENSION: u16 = 1010;
pub const CLOSE_INTERNAL: u16 = 1011;
pub const CLOSE_TLS: u16 = 1015;

pub const CLOSE_MAX_PROTOCOL: u16 = 2999;
pub const CLOSE_MAX_IANA: u16 = 3999;
pub const CLOSE_MAX_PRIVATE: u16 = 4999;

// Payload of the keepalive ping
pub const PING_PAYLOAD: &[u8] = b"ping";

pub const fn is_fin(byte: u8) -> bool {
    (byte & FIN_MASK) == FIN_MASK
}
pub const fn is_rsv1(byte: u8) -> bool {
    (byte & RSV1_MASK) == RSV1_MASK
}
pub const fn is_rsv2(byte: u8) -> bool {
    (byte & RSV2_MASK) == RSV2_MASK
}
pub const fn is_rsv3(byte: u8) -> bool {
    (byte & RSV3_MASK) == RSV3_MASK
}
pub const fn is_mask(byte: u8) -> bool {
    (byte & MASKED_MASK) == MASKED_MASK
}
