use std::io;
use std::path::PathBuf;

use pitlane_core::events::DriverIndex;
use thiserror::Error;

use crate::schema::SinkKind;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No session has been opened yet")]
    NoSession,

    #[error("Driver {0} has no folder in the current session")]
    UnknownDriver(DriverIndex),

    #[error("No {0} sink in this scope")]
    NoSink(SinkKind),

    #[error("{kind} row has {got} fields but the header has {expected}")]
    Schema {
        kind: SinkKind,
        expected: usize,
        got: usize,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}
