//! # pitlane-engine
//!
//! The running pipeline: one dispatcher thread reading the upstream source,
//! one writer thread per subscribed category, the live view, and the
//! [`Recorder`] that starts and stops them.

pub mod dispatcher;
pub mod error;
pub mod live;
pub mod recorder;
pub mod settings;
pub mod status;
pub mod worker;
pub mod writer;

pub use error::ControlError;
pub use live::{LiveRow, LiveView};
pub use recorder::{Recorder, StopReport};
pub use settings::{RecorderSettings, SourceFactory, UdpJsonFactory};
pub use status::{CategoryStatus, PipelineStatus, RunState};

pub mod prelude {
    pub use super::{
        ControlError, LiveRow, PipelineStatus, Recorder, RecorderSettings, RunState,
        SourceFactory, StopReport,
    };
}
