//! Bounded live-view storage.

pub mod ring;
pub mod window;

pub use ring::RingBuffer;
pub use window::{PlaybackCursor, TimeWindow, Timestamped};
