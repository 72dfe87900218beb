//! Subscription and queue settings.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct PipelineConfig {
    /// Category tags to record, e.g. `carTelemetry`.
    #[validate(custom(function = validation::validate_categories))]
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    /// Driver slots to record. Unset means the player car only.
    #[serde(default)]
    pub drivers: Option<Vec<u8>>,

    /// Per-category queue bound; the oldest entry is dropped when full.
    #[validate(range(min = 1, max = 1048576))]
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long stop waits for each worker.
    #[validate(range(min = 10, max = 60000))]
    #[serde(default = "default_join_timeout")]
    pub join_timeout_ms: u64,
}

fn default_categories() -> Vec<String> {
    ["carDamage", "carTelemetry", "session"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_join_timeout() -> u64 {
    3000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            drivers: None,
            queue_capacity: default_queue_capacity(),
            join_timeout_ms: default_join_timeout(),
        }
    }
}
