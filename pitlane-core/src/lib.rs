//! # pitlane-core
//!
//! Foundation layer for the telemetry ingestion pipeline.
//!
//! ### Key Submodules:
//! - `events`: decoded telemetry events, category tags and driver selection
//! - `buffers`: fixed-capacity overwrite ring and the rolling playback window
//! - `queue`: bounded drop-oldest category queue between dispatcher and writers
//! - `stop`: cooperative cancellation token shared by workers

pub mod buffers;
pub mod error;
pub mod events;
pub mod queue;
pub mod stop;

pub mod prelude {
    pub use crate::buffers::*;
    pub use crate::error::*;
    pub use crate::events::*;
    pub use crate::queue::*;
    pub use crate::stop::*;
}

pub use error::CoreError;
