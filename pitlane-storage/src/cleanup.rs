//! Removal of incomplete driver folders after a recording stops.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::error::StorageError;

/// A driver folder with no name suffix, or one that got a timestamp where the
/// name belongs.
static MALFORMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(Player|AI)_Track_-?\d+_(\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2})?$")
        .unwrap_or_else(|e| panic!("invalid malformed-folder pattern: {e}"))
});

pub fn is_malformed(name: &str) -> bool {
    MALFORMED.is_match(name)
}

/// Deletes every malformed driver folder directly under `root` and returns
/// the removed paths. Well-formed folders and plain files are left alone.
pub fn cleanup_malformed(root: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let entries = fs::read_dir(root).map_err(|e| StorageError::io(root, e))?;
    let mut removed = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|e| StorageError::io(root, e))?;
        let path = entry.path();
        let name = entry.file_name();
        if !path.is_dir() || !is_malformed(&name.to_string_lossy()) {
            continue;
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                info!(path = %path.display(), "Removed malformed driver folder");
                removed.push(path);
            }
            Err(e) => warn!(path = %path.display(), "Failed to remove malformed folder: {e}"),
        }
    }

    Ok(removed)
}
