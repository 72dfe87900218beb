//! Datagram decoding seam.
//!
//! The binary game protocol is decoded elsewhere; a [`PacketDecoder`] turns one
//! received datagram into one event. [`JsonDecoder`] accepts events already
//! serialized by such an external decoder.

use pitlane_core::events::TelemetryEvent;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed datagram: {0}")]
    Malformed(String),

    #[error("unsupported packet: {0}")]
    Unsupported(String),
}

pub trait PacketDecoder: Send {
    fn decode(&mut self, datagram: &[u8]) -> Result<TelemetryEvent, DecodeError>;
}

/// One JSON-encoded [`TelemetryEvent`] per datagram.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDecoder;

impl PacketDecoder for JsonDecoder {
    fn decode(&mut self, datagram: &[u8]) -> Result<TelemetryEvent, DecodeError> {
        serde_json::from_slice(datagram).map_err(|e| DecodeError::Malformed(e.to_string()))
    }
}
