use rand::Rng;
use sha1::{Digest, Sha1};

use crate::error::HandshakeError;

const WS_MAGIC_CONST: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

pub const MIN_VERSION: u32 = 13;

pub const SEC_WEBSOCKET_KEY: &str = "sec-websocket-key";
pub const SEC_WEBSOCKET_ACCEPT: &str = "sec-websocket-accept";
pub const SEC_WEBSOCKET_VERSION: &str = "sec-websocket-version";
pub const SEC_WEBSOCKET_PROTOCOL: &str = "sec-websocket-protocol";
pub const SEC_WEBSOCKET_EXTENSIONS: &str = "sec-websocket-extensions";

fn sha1(msg: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(msg);
    hasher.finalize().into()
}

/// `Sec-WebSocket-Accept` value for a client's `Sec-WebSocket-Key`.
pub fn server_accept_key(client_key: &str) -> String {
    let concatenated = [client_key.as_bytes(), WS_MAGIC_CONST].concat();
    let hash = sha1(&concatenated);
    base64::encode(&hash)
}

/// Fresh `Sec-WebSocket-Key`: 16 bytes from the thread-local CSPRNG, base64 encoded.
pub fn generate_client_key() -> String {
    let nonce: [u8; 16] = rand::rng().random();
    base64::encode(&nonce)
}

/// Server side checks of an upgrade request. Returns the accept key to answer with.
pub fn accept_upgrade(version: &str, client_key: &str) -> Result<String, HandshakeError> {
    let supported = version
        .trim()
        .parse::<u32>()
        .map(|v| v >= MIN_VERSION)
        .unwrap_or(false);
    if !supported {
        return Err(HandshakeError::UnsupportedVersion(version.to_string()));
    }
    let client_key = client_key.trim();
    if client_key.is_empty() {
        return Err(HandshakeError::MissingKey);
    }
    Ok(server_accept_key(client_key))
}

/// Client side check of the server's answer.
pub fn verify_accept(client_key: &str, accept: &str) -> Result<(), HandshakeError> {
    if server_accept_key(client_key) == accept.trim() {
        Ok(())
    } else {
        Err(HandshakeError::AcceptMismatch)
    }
}

#[cfg(test)]
#[path = "handshake_test.rs"]
mod tests;
