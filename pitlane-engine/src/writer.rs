//! ## pitlane-engine::writer
//! **One worker per recorded category**
//!
//! Drains its queue with a bounded wait, keeps the session layout current from
//! control events and appends one row per event and driver. A failed append is
//! retried once and then skipped; no error ever stops the writer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pitlane_core::events::{Category, Payload, Scope};
use pitlane_core::queue::CategoryQueue;
use pitlane_core::stop::StopToken;
use pitlane_storage::{driver_row, session_row, Record, SessionStore, StorageError};
use pitlane_telemetry::MetricsRecorder;
use tracing::{debug, error, info, trace, warn};

use crate::dispatcher::RoutedEvent;
use crate::status::CategoryStats;

pub struct CategoryWriter {
    category: Category,
    queue: Arc<CategoryQueue<RoutedEvent>>,
    store: Arc<SessionStore>,
    stats: Arc<CategoryStats>,
    metrics: Arc<MetricsRecorder>,
    stop: StopToken,
    poll_timeout: Duration,
}

impl CategoryWriter {
    pub fn new(
        category: Category,
        queue: Arc<CategoryQueue<RoutedEvent>>,
        store: Arc<SessionStore>,
        stats: Arc<CategoryStats>,
        metrics: Arc<MetricsRecorder>,
        stop: StopToken,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            category,
            queue,
            store,
            stats,
            metrics,
            stop,
            poll_timeout,
        }
    }

    /// Runs until stopped. Items still queued when the stop is observed are
    /// drained without waiting.
    pub fn run(self) {
        debug!(category = %self.category, "Writer started");
        loop {
            if self.stop.is_stopped() {
                let mut drained = 0usize;
                while let Some(item) = self.queue.try_dequeue() {
                    self.handle(&item);
                    drained += 1;
                }
                debug!(category = %self.category, drained, "Writer drained queue");
                break;
            }
            match self.queue.dequeue_timeout(self.poll_timeout) {
                Ok(Some(item)) => self.handle(&item),
                Ok(None) => continue,
                Err(e) => {
                    warn!(category = %self.category, "Writer queue closed: {e}");
                    break;
                }
            }
        }
        debug!(category = %self.category, "Writer exited");
    }

    pub fn handle(&self, item: &RoutedEvent) {
        let event = &item.event;
        match &event.payload {
            Payload::Session(session) => {
                match self.store.ensure_session(session.track_id) {
                    Ok(_) => {}
                    Err(e) => {
                        error!(category = %self.category, "Cannot open session: {e}");
                        self.stats.record_error(e.to_string());
                        return;
                    }
                }
                if self.category == Category::Session {
                    self.write_session_row(event);
                }
            }
            Payload::Participants(participants) => {
                let player = event.header.player();
                for &driver in &item.drivers {
                    let Some(participant) = participants.get(driver) else {
                        continue;
                    };
                    match self
                        .store
                        .ensure_driver(driver, &participant.name, driver == player)
                    {
                        Ok(_) => {}
                        Err(StorageError::NoSession) => {
                            trace!(category = %self.category, "Participants before session, folder deferred");
                        }
                        Err(e) => {
                            warn!(category = %self.category, driver = %driver, "Cannot create driver folder: {e}");
                            self.stats.record_error(e.to_string());
                        }
                    }
                }
            }
            _ if event.category() != self.category => {}
            _ => match self.category.scope() {
                Scope::Session => self.write_session_row(event),
                Scope::Driver => {
                    for &driver in &item.drivers {
                        if let Some((kind, record)) = driver_row(event, driver) {
                            self.append(&record, || self.store.append_driver(driver, kind, &record));
                        }
                    }
                }
                Scope::Control => {}
            },
        }
    }

    fn write_session_row(&self, event: &pitlane_core::events::TelemetryEvent) {
        if let Some((kind, record)) = session_row(event) {
            self.append(&record, || self.store.append_session(kind, &record));
        }
    }

    /// Retry once, then skip the row.
    fn append(&self, record: &Record, write: impl Fn() -> Result<(), StorageError>) {
        let started = Instant::now();
        let outcome = match write() {
            Ok(()) => Ok(()),
            Err(StorageError::NoSession | StorageError::UnknownDriver(_)) => {
                trace!(category = %self.category, "Row has no destination yet, dropped");
                self.stats.record_unrouted();
                return;
            }
            Err(first) => {
                warn!(category = %self.category, "Write failed, retrying once: {first}");
                write()
            }
        };

        match outcome {
            Ok(()) => {
                self.stats.record_written();
                self.metrics.inc_rows_written(self.category.as_str());
                self.metrics
                    .row_write_seconds
                    .observe(started.elapsed().as_secs_f64());
            }
            Err(e) => {
                error!(category = %self.category, fields = record.len(), "Write failed again, row skipped: {e}");
                self.stats.record_skipped(e.to_string());
                self.metrics.inc_write_errors(self.category.as_str());
            }
        }
    }
}

/// Logs how many rows each writer committed; called once per run.
pub(crate) fn log_totals(category: Category, stats: &CategoryStats) {
    info!(category = %category, rows = stats.rows_written(), displaced = stats.displaced(), "Category totals");
}
