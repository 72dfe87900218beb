//! # Pitlane Telemetry
//!
//! Logging setup and prometheus metrics for the recorder.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::MetricsRecorder;
