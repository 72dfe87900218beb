//! Run state and per-category counters exposed on the control surface.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use pitlane_core::events::Category;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RunState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunState::Stopped => "stopped",
            RunState::Starting => "starting",
            RunState::Running => "running",
            RunState::Stopping => "stopping",
        })
    }
}

/// Counters one writer and the dispatcher update for a category.
#[derive(Debug, Default)]
pub struct CategoryStats {
    rows_written: AtomicU64,
    rows_skipped: AtomicU64,
    rows_unrouted: AtomicU64,
    displaced: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl CategoryStats {
    pub fn record_written(&self) {
        self.rows_written.fetch_add(1, Ordering::Relaxed);
    }

    /// A row dropped after its retry failed.
    pub fn record_skipped(&self, error: String) {
        self.rows_skipped.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock() = Some(error);
    }

    /// A row with nowhere to go yet: no session, or its driver folder is unknown.
    pub fn record_unrouted(&self) {
        self.rows_unrouted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_displaced(&self) {
        self.displaced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, error: String) {
        *self.last_error.lock() = Some(error);
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written.load(Ordering::Relaxed)
    }

    pub fn displaced(&self) -> u64 {
        self.displaced.load(Ordering::Relaxed)
    }
}

/// Shared by every worker of one run; outlives the run so status can still
/// be read after stop.
#[derive(Debug, Default)]
pub struct StatusBoard {
    categories: BTreeMap<Category, Arc<CategoryStats>>,
    source_error: Mutex<Option<String>>,
}

impl StatusBoard {
    pub fn new(categories: impl IntoIterator<Item = Category>) -> Self {
        Self {
            categories: categories
                .into_iter()
                .map(|c| (c, Arc::new(CategoryStats::default())))
                .collect(),
            source_error: Mutex::new(None),
        }
    }

    pub fn stats(&self, category: Category) -> Option<Arc<CategoryStats>> {
        self.categories.get(&category).cloned()
    }

    pub fn set_source_error(&self, error: String) {
        *self.source_error.lock() = Some(error);
    }

    pub fn source_error(&self) -> Option<String> {
        self.source_error.lock().clone()
    }

    pub fn rows_written(&self) -> u64 {
        self.categories.values().map(|s| s.rows_written()).sum()
    }

    pub fn displaced(&self) -> u64 {
        self.categories.values().map(|s| s.displaced()).sum()
    }

    pub(crate) fn snapshot(&self, queued: impl Fn(Category) -> usize) -> Vec<CategoryStatus> {
        self.categories
            .iter()
            .map(|(&category, stats)| CategoryStatus {
                category,
                queued: queued(category),
                displaced: stats.displaced(),
                rows_written: stats.rows_written(),
                rows_skipped: stats.rows_skipped.load(Ordering::Relaxed),
                rows_unrouted: stats.rows_unrouted.load(Ordering::Relaxed),
                last_error: stats.last_error.lock().clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStatus {
    pub category: Category,
    pub queued: usize,
    pub displaced: u64,
    pub rows_written: u64,
    pub rows_skipped: u64,
    pub rows_unrouted: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStatus {
    pub state: RunState,
    pub session_root: Option<PathBuf>,
    pub source_error: Option<String>,
    pub categories: Vec<CategoryStatus>,
}

impl PipelineStatus {
    pub fn category(&self, category: Category) -> Option<&CategoryStatus> {
        self.categories.iter().find(|c| c.category == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_aggregates_per_category() {
        let board = StatusBoard::new([Category::Lap, Category::Motion]);
        let lap = board.stats(Category::Lap).unwrap();
        lap.record_written();
        lap.record_written();
        lap.record_skipped("disk full".into());
        board.stats(Category::Motion).unwrap().record_displaced();
        assert!(board.stats(Category::Session).is_none());

        let snapshot = board.snapshot(|_| 0);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].category, Category::Lap);
        assert_eq!(snapshot[0].rows_written, 2);
        assert_eq!(snapshot[0].rows_skipped, 1);
        assert_eq!(snapshot[0].last_error.as_deref(), Some("disk full"));
        assert_eq!(board.rows_written(), 2);
        assert_eq!(board.displaced(), 1);
    }
}
