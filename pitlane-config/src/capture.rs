//! Upstream source settings.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct CaptureConfig {
    /// Address the UDP listener binds.
    #[validate(custom(function = validation::validate_address))]
    #[serde(default = "default_address")]
    pub address: String,

    #[validate(range(min = 1024))]
    #[serde(default = "default_port")]
    pub port: u16,

    /// The game's UDP send rate.
    #[validate(range(min = 1, max = 60))]
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: u32,

    /// Longest a single source read may block, so stop is observed promptly.
    #[validate(range(min = 1, max = 5000))]
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,
}

fn default_address() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    20777
}

fn default_sample_rate() -> u32 {
    30
}

fn default_poll_timeout() -> u64 {
    100
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            sample_rate_hz: default_sample_rate(),
            poll_timeout_ms: default_poll_timeout(),
        }
    }
}
