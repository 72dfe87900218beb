//! The upstream source contract.

use std::io;
use std::time::Duration;

use pitlane_core::events::TelemetryEvent;
use thiserror::Error;

/// Read failures, split by whether ingestion can carry on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// A single read failed; the next read may succeed.
    #[error("transient source error: {0}")]
    Transient(String),

    /// The source is gone for good.
    #[error("fatal source error: {0}")]
    Fatal(String),
}

impl SourceError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SourceError::Fatal(_))
    }

    /// Classifies a socket error. Timeouts are not errors and are handled by
    /// the caller before reaching here.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::Interrupted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::InvalidData
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut => SourceError::Transient(err.to_string()),
            _ => SourceError::Fatal(err.to_string()),
        }
    }
}

/// Yields decoded events one at a time.
pub trait PacketSource: Send {
    /// Waits at most `timeout`. `Ok(None)` means nothing arrived in time.
    fn next(&mut self, timeout: Duration) -> Result<Option<TelemetryEvent>, SourceError>;

    /// Human readable origin for logs.
    fn describe(&self) -> String;
}

impl<S: PacketSource + ?Sized> PacketSource for Box<S> {
    fn next(&mut self, timeout: Duration) -> Result<Option<TelemetryEvent>, SourceError> {
        (**self).next(timeout)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_io_errors() {
        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert!(!SourceError::from_io(&reset).is_fatal());

        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(SourceError::from_io(&denied).is_fatal());
    }
}
