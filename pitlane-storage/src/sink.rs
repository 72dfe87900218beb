//! Append-only CSV sink.
//!
//! The header is written when the sink is opened on an empty file, so no data
//! row can ever precede it. Every row is written with a single `write_all` and
//! flushed before `append` returns.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::error::StorageError;
use crate::schema::{csv_line, Record, SinkKind};

#[derive(Debug)]
pub struct CsvSink {
    kind: SinkKind,
    path: PathBuf,
    file: File,
    rows: u64,
}

impl CsvSink {
    /// Opens (or creates) `dir/<kind>.csv`.
    pub fn open(dir: &Path, kind: SinkKind) -> Result<Self, StorageError> {
        let path = dir.join(kind.file_name());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StorageError::io(&path, e))?;

        let existing = file
            .metadata()
            .map_err(|e| StorageError::io(&path, e))?
            .len();
        if existing == 0 {
            let header = csv_line(kind.header().iter().copied());
            file.write_all(header.as_bytes())
                .and_then(|_| file.flush())
                .map_err(|e| StorageError::io(&path, e))?;
            trace!(sink = %kind, path = %path.display(), "wrote header");
        }

        Ok(Self {
            kind,
            path,
            file,
            rows: 0,
        })
    }

    pub fn append(&mut self, record: &Record) -> Result<(), StorageError> {
        let expected = self.kind.header().len();
        if record.len() != expected {
            return Err(StorageError::Schema {
                kind: self.kind,
                expected,
                got: record.len(),
            });
        }

        self.file
            .write_all(record.to_line().as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|e| StorageError::io(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }

    pub fn kind(&self) -> SinkKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended through this handle.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn sync(&self) -> Result<(), StorageError> {
        self.file
            .sync_data()
            .map_err(|e| StorageError::io(&self.path, e))
    }
}
