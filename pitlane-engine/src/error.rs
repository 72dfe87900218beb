use std::io;

use pitlane_capture::SourceError;
use pitlane_core::events::Category;
use pitlane_core::CoreError;
use thiserror::Error;

use crate::status::RunState;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: RunState,
    },

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Failed to open source: {0}")]
    Source(#[from] SourceError),

    #[error("Failed to spawn worker {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Pipeline error: {0}")]
    Core(#[from] CoreError),

    #[error("Category {0} has no live channel")]
    NoLiveChannel(Category),

    #[error("Metrics error: {0}")]
    Metrics(String),
}
