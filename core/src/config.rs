use serde::Deserialize;

pub const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_MAX_BODY_SIZE: u64 = 10_485_760;

/// Adapter-wide defaults, used when a request does not set the option itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub receive_timeout_ms: u64,
    pub max_body_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT_MS,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}
