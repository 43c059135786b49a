//! Connection tuning, clamped to fixed bounds and loadable from the environment.

use std::time::Duration;

use crate::ws::consts::MAX_HEADER;

// Fragments leave room for the largest header inside a 4 KiB multiple
pub const FRAGMENT_MINIMUM: usize = 4096 - MAX_HEADER;
pub const FRAGMENT_DEFAULT: usize = 2 * 4096 - MAX_HEADER;
pub const FRAGMENT_MAXIMUM: usize = 256 * 4096 - MAX_HEADER;

pub const KEEPALIVE_DEFAULT_MS: u64 = 30_000;
pub const KEEPALIVE_MINIMUM_MS: u64 = 15_000;
pub const KEEPALIVE_MAXIMUM_MS: u64 = 120_000;

pub const CLOSING_DEFAULT_MS: u64 = 10_000;
pub const CLOSING_MINIMUM_MS: u64 = 2_000;
pub const CLOSING_MAXIMUM_MS: u64 = 120_000;

pub const PING_DEFAULT_MS: u64 = 30_000;
pub const PING_MINIMUM_MS: u64 = 5_000;
pub const PING_MAXIMUM_MS: u64 = 120_000;

pub const MAX_PAYLOAD_DEFAULT: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketConfig {
    fragment_size: usize,
    keepalive: Duration,
    closing_timeout: Duration,
    ping_timeout: Duration,
    max_payload: u64,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            fragment_size: FRAGMENT_DEFAULT,
            keepalive: Duration::from_millis(KEEPALIVE_DEFAULT_MS),
            closing_timeout: Duration::from_millis(CLOSING_DEFAULT_MS),
            ping_timeout: Duration::from_millis(PING_DEFAULT_MS),
            max_payload: MAX_PAYLOAD_DEFAULT,
        }
    }
}

impl WebSocketConfig {
    /// Defaults overridden by environment variables.
    ///
    /// Optional:
    /// - `WS_FRAGMENT_SIZE`: bytes per outgoing fragment
    /// - `WS_KEEPALIVE_MS`: keepalive ping interval
    /// - `WS_CLOSING_TIMEOUT_MS`: wait for the peer's close answer
    /// - `WS_PING_TIMEOUT_MS`: wait for a pong after a ping
    /// - `WS_MAX_PAYLOAD`: largest accepted frame payload
    ///
    /// Unparsable values are ignored, everything is clamped.
    pub fn from_env() -> Self {
        let mut config = WebSocketConfig::default();
        if let Some(size) = env_parse_u64("WS_FRAGMENT_SIZE") {
            config.set_fragment_size(size as usize);
        }
        if let Some(ms) = env_parse_u64("WS_KEEPALIVE_MS") {
            config.set_keepalive(Duration::from_millis(ms));
        }
        if let Some(ms) = env_parse_u64("WS_CLOSING_TIMEOUT_MS") {
            config.set_closing_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = env_parse_u64("WS_PING_TIMEOUT_MS") {
            config.set_ping_timeout(Duration::from_millis(ms));
        }
        if let Some(max) = env_parse_u64("WS_MAX_PAYLOAD") {
            config.set_max_payload(max);
        }
        config
    }

    pub fn fragment_size(&self) -> usize {
        self.fragment_size
    }
    pub fn keepalive(&self) -> Duration {
        self.keepalive
    }
    pub fn closing_timeout(&self) -> Duration {
        self.closing_timeout
    }
    pub fn ping_timeout(&self) -> Duration {
        self.ping_timeout
    }
    pub fn max_payload(&self) -> u64 {
        self.max_payload
    }

    pub fn set_fragment_size(&mut self, size: usize) -> &mut Self {
        self.fragment_size = size.clamp(FRAGMENT_MINIMUM, FRAGMENT_MAXIMUM);
        tracing::debug!(fragment_size = self.fragment_size, "fragment size set");
        self
    }

    pub fn set_keepalive(&mut self, interval: Duration) -> &mut Self {
        self.keepalive = clamp_ms(interval, KEEPALIVE_MINIMUM_MS, KEEPALIVE_MAXIMUM_MS);
        tracing::debug!(keepalive_ms = self.keepalive.as_millis() as u64, "keepalive set");
        self
    }

    pub fn set_closing_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.closing_timeout = clamp_ms(timeout, CLOSING_MINIMUM_MS, CLOSING_MAXIMUM_MS);
        tracing::debug!(closing_ms = self.closing_timeout.as_millis() as u64, "closing timeout set");
        self
    }

    pub fn set_ping_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.ping_timeout = clamp_ms(timeout, PING_MINIMUM_MS, PING_MAXIMUM_MS);
        tracing::debug!(ping_ms = self.ping_timeout.as_millis() as u64, "ping timeout set");
        self
    }

    // floor of one fragment so a single full fragment is always readable
    pub fn set_max_payload(&mut self, max: u64) -> &mut Self {
        self.max_payload = max.max(FRAGMENT_MAXIMUM as u64);
        self
    }
}

fn clamp_ms(value: Duration, min: u64, max: u64) -> Duration {
    let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(ms.clamp(min, max))
}

fn env_parse_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<u64>().ok())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
