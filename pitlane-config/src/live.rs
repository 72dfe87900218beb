//! Live view settings.

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct LiveConfig {
    /// Width of the rolling window, also sizes the ring buffers.
    #[validate(range(min = 0.1, max = 600.0))]
    #[serde(default = "default_window")]
    pub window_secs: f64,

    /// Cursor advance per refresh tick.
    #[validate(range(min = 0.001, max = 60.0))]
    #[serde(default = "default_step")]
    pub playback_step_secs: f64,

    #[validate(range(min = 10, max = 10000))]
    #[serde(default = "default_refresh")]
    pub refresh_ms: u64,
}

fn default_window() -> f64 {
    5.0
}

fn default_step() -> f64 {
    0.1
}

fn default_refresh() -> u64 {
    200
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window(),
            playback_step_secs: default_step(),
            refresh_ms: default_refresh(),
        }
    }
}
