//! ## pitlane-core::events
//! **Closed event model for decoded telemetry packets**
//!
//! The upstream decoder yields one [`TelemetryEvent`] at a time. Routing is a
//! match on [`Category`], never a runtime type check.

pub mod category;
pub mod driver;
pub mod packet;

pub use category::{Category, Scope};
pub use driver::{DriverIndex, DriverSelection};
pub use packet::*;
