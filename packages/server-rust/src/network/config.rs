//! Listener and request-size settings for the HTTP surface.

use std::time::Duration;

/// Default request body cap: 6 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 6 * 1024 * 1024;

/// Settings consumed by `NetworkModule`.
///
/// The binary fills this from `ServerArgs`; tests build it directly.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Interface to bind, e.g. `0.0.0.0` or `127.0.0.1`.
    pub host: String,
    /// `0` asks the OS for a free port.
    pub port: u16,
    pub max_body_bytes: usize,
    /// Grace period for open requests after the stop signal.
    pub drain_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            drain_timeout: Duration::from_secs(30),
        }
    }
}
