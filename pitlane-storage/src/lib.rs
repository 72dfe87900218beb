//! ## pitlane-storage
//! **Durable, per-session record streams**
//!
//! One session root per recording, two session-wide sinks directly under it and
//! one folder per driver holding a sink per subscribed category. Every sink is
//! a header-first CSV file.

pub mod cleanup;
pub mod error;
pub mod layout;
pub mod schema;
pub mod session;
pub mod sink;

pub use cleanup::{cleanup_malformed, is_malformed};
pub use error::StorageError;
pub use layout::Role;
pub use schema::{driver_row, session_row, Record, SinkKind};
pub use session::{Ensured, SessionStore};
pub use sink::CsvSink;
