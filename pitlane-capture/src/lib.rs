//! pitlane-capture
//!
//! Upstream packet sources. Every source yields one decoded [`TelemetryEvent`]
//! per call, waiting at most the given timeout:
//! - `udp`: binds a socket and hands datagrams to a [`PacketDecoder`]
//! - `channel`: in-process source fed through a crossbeam channel
//! - `synthetic`: generated race session paced at a sample rate
//!
//! [`TelemetryEvent`]: pitlane_core::events::TelemetryEvent

pub mod channel;
pub mod decoder;
pub mod source;
pub mod synthetic;
pub mod udp;

pub use channel::{ChannelSource, SourceFeed};
pub use decoder::{DecodeError, JsonDecoder, PacketDecoder};
pub use source::{PacketSource, SourceError};
pub use synthetic::SyntheticSource;
pub use udp::UdpSource;
