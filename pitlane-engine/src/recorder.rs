/*!
# Recorder

Lifecycle controller for one pipeline: `Stopped → Starting → Running →
Stopping → Stopped`.

`start()` builds every queue, the session store and the writers before the
dispatcher is spawned, so nothing is ever enqueued without a consumer.
`stop()` stops ingestion first, then lets each writer drain what is already
queued, joins everything against a deadline and finally removes malformed
driver folders from the session root. A worker that misses the deadline is
abandoned and named in the [`StopReport`].
*/

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crossbeam::channel::{unbounded, Receiver, Sender};
use pitlane_capture::SourceError;
use pitlane_core::buffers::{PlaybackCursor, TimeWindow};
use pitlane_core::events::{Category, DriverIndex};
use pitlane_core::queue::CategoryQueue;
use pitlane_core::stop::StopToken;
use pitlane_storage::{cleanup_malformed, SessionStore, SinkKind};
use pitlane_telemetry::MetricsRecorder;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::dispatcher::{Dispatcher, Route, RoutedEvent};
use crate::error::ControlError;
use crate::live::{LiveRow, LiveView};
use crate::settings::{RecorderSettings, SourceFactory};
use crate::status::{PipelineStatus, RunState, StatusBoard};
use crate::worker::Worker;
use crate::writer::{self, CategoryWriter};

/// Outcome of one `stop()`.
///
/// The dispatcher and the writers are joined in two phases, each bounded by
/// `join_timeout`, so a stop returns within twice that timeout plus the
/// session close.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StopReport {
    pub session_root: Option<PathBuf>,
    /// Workers that did not exit before the join deadline.
    pub abandoned: Vec<String>,
    /// Malformed driver folders deleted from the session root.
    pub removed: Vec<PathBuf>,
    pub rows_written: u64,
    pub displaced: u64,
}

impl StopReport {
    pub fn is_clean(&self) -> bool {
        self.abandoned.is_empty()
    }
}

impl fmt::Display for StopReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.session_root {
            Some(root) => write!(f, "session {}", root.display())?,
            None => f.write_str("no session recorded")?,
        }
        write!(
            f,
            ": {} rows written, {} events displaced",
            self.rows_written, self.displaced
        )?;
        if !self.removed.is_empty() {
            write!(f, ", {} malformed folders removed", self.removed.len())?;
        }
        if !self.abandoned.is_empty() {
            write!(f, ", abandoned workers: {}", self.abandoned.join(", "))?;
        }
        Ok(())
    }
}

/// Everything owned by one `start()`..`stop()` span.
struct ActiveRun {
    ingest_stop: StopToken,
    writer_stop: StopToken,
    dispatcher: Worker,
    writers: Vec<Worker>,
    queues: BTreeMap<Category, Arc<CategoryQueue<RoutedEvent>>>,
    store: Arc<SessionStore>,
}

pub struct Recorder {
    factory: Box<dyn SourceFactory>,
    settings: RecorderSettings,
    state: RunState,
    metrics: Arc<MetricsRecorder>,
    live: Arc<LiveView>,
    board: Arc<StatusBoard>,
    fatal_tx: Sender<SourceError>,
    fatal_rx: Receiver<SourceError>,
    run: Option<ActiveRun>,
    last_session: Option<PathBuf>,
}

impl Recorder {
    pub fn new(factory: impl SourceFactory + 'static) -> Result<Self, ControlError> {
        let metrics = MetricsRecorder::new().map_err(|e| ControlError::Metrics(e.to_string()))?;
        Self::with_metrics(factory, Arc::new(metrics))
    }

    /// Shares an existing metrics registry, e.g. one already exposed by the host.
    pub fn with_metrics(
        factory: impl SourceFactory + 'static,
        metrics: Arc<MetricsRecorder>,
    ) -> Result<Self, ControlError> {
        let settings = RecorderSettings::default();
        let live = Arc::new(LiveView::new(settings.live_capacity())?);
        let board = Arc::new(StatusBoard::new(settings.categories()));
        let (fatal_tx, fatal_rx) = unbounded();
        Ok(Self {
            factory: Box::new(factory),
            settings,
            state: RunState::Stopped,
            metrics,
            live,
            board,
            fatal_tx,
            fatal_rx,
            run: None,
            last_session: None,
        })
    }

    /// Replaces the settings used by the next `start()`.
    pub fn configure(&mut self, settings: RecorderSettings) -> Result<(), ControlError> {
        self.expect_state("configure", RunState::Stopped)?;
        settings.validate()?;
        self.live = Arc::new(LiveView::new(settings.live_capacity())?);
        debug!(categories = settings.subscriptions.len(), "Recorder configured");
        self.settings = settings;
        Ok(())
    }

    #[instrument(level = "info", name = "recorder_start", skip(self))]
    pub fn start(&mut self) -> Result<(), ControlError> {
        self.expect_state("start", RunState::Stopped)?;
        self.state = RunState::Starting;

        match self.launch() {
            Ok(run) => {
                self.run = Some(run);
                self.state = RunState::Running;
                info!(
                    address = %self.settings.address,
                    port = self.settings.port,
                    categories = self.settings.subscriptions.len(),
                    "Recorder running"
                );
                Ok(())
            }
            Err(e) => {
                self.state = RunState::Stopped;
                error!("Recorder failed to start: {e}");
                Err(e)
            }
        }
    }

    fn launch(&mut self) -> Result<ActiveRun, ControlError> {
        self.settings.validate()?;
        while self.fatal_rx.try_recv().is_ok() {}

        let source = self.factory.open(&self.settings)?;

        let live = Arc::new(LiveView::new(self.settings.live_capacity())?);
        if let Some(driver) = self.live.selected() {
            live.select_driver(driver);
        }
        let board = Arc::new(StatusBoard::new(self.settings.categories()));
        let store = Arc::new(SessionStore::new(
            &self.settings.output_dir,
            self.settings.categories().filter_map(SinkKind::for_category),
        ));

        let mut routes = Vec::with_capacity(self.settings.subscriptions.len());
        let mut queues = BTreeMap::new();
        for (&category, selection) in &self.settings.subscriptions {
            let queue = Arc::new(CategoryQueue::with_capacity(
                category.as_str(),
                self.settings.queue_capacity,
            )?);
            let stats = board
                .stats(category)
                .ok_or_else(|| ControlError::InvalidSettings(format!("no stats for {category}")))?;
            queues.insert(category, Arc::clone(&queue));
            routes.push(Route {
                category,
                selection: selection.clone(),
                queue,
                stats,
            });
        }

        let ingest_stop = StopToken::new();
        let writer_stop = StopToken::new();

        let mut writers = Vec::with_capacity(routes.len());
        for route in &routes {
            let writer = CategoryWriter::new(
                route.category,
                Arc::clone(&route.queue),
                Arc::clone(&store),
                Arc::clone(&route.stats),
                Arc::clone(&self.metrics),
                writer_stop.clone(),
                self.settings.poll_timeout,
            );
            match Worker::spawn(format!("writer-{}", route.category), move || writer.run()) {
                Ok(worker) => writers.push(worker),
                Err(e) => {
                    abort_writers(&writer_stop, writers, &self.settings);
                    return Err(e);
                }
            }
        }

        let dispatcher = Dispatcher::new(
            source,
            routes,
            Arc::clone(&live),
            Arc::clone(&board),
            Arc::clone(&self.metrics),
            ingest_stop.clone(),
            self.fatal_tx.clone(),
            self.settings.poll_timeout,
        );
        let dispatcher = match Worker::spawn("dispatcher", move || dispatcher.run()) {
            Ok(worker) => worker,
            Err(e) => {
                abort_writers(&writer_stop, writers, &self.settings);
                return Err(e);
            }
        };

        self.live = live;
        self.board = board;
        self.last_session = None;
        Ok(ActiveRun {
            ingest_stop,
            writer_stop,
            dispatcher,
            writers,
            queues,
            store,
        })
    }

    /// Stops the running pipeline. A no-op returning an empty report when
    /// nothing is running.
    ///
    /// Ingestion is joined first, then the writers, each phase against its
    /// own `join_timeout` deadline. Writers only observe their stop after the
    /// dispatcher is gone, so they need the second window to drain.
    #[instrument(level = "info", name = "recorder_stop", skip(self))]
    pub fn stop(&mut self) -> StopReport {
        let Some(run) = self.run.take() else {
            debug!("Stop requested while already stopped");
            return StopReport::default();
        };
        self.state = RunState::Stopping;
        let join_timeout = self.settings.join_timeout;
        let mut abandoned = Vec::new();

        run.ingest_stop.stop();
        if let Err(name) = run.dispatcher.join_until(Instant::now() + join_timeout) {
            abandoned.push(name);
        }

        run.writer_stop.stop();
        let deadline = Instant::now() + join_timeout;
        for worker in run.writers {
            if let Err(name) = worker.join_until(deadline) {
                abandoned.push(name);
            }
        }

        for category in run.queues.keys() {
            if let Some(stats) = self.board.stats(*category) {
                writer::log_totals(*category, &stats);
            }
        }

        let session_root = run.store.close();
        let removed = match &session_root {
            Some(root) => cleanup_malformed(root).unwrap_or_else(|e| {
                warn!(root = %root.display(), "Malformed folder cleanup failed: {e}");
                Vec::new()
            }),
            None => Vec::new(),
        };

        self.last_session = session_root.clone();
        self.state = RunState::Stopped;

        let report = StopReport {
            session_root,
            abandoned,
            removed,
            rows_written: self.board.rows_written(),
            displaced: self.board.displaced(),
        };
        if report.is_clean() {
            info!(%report, "Recorder stopped");
        } else {
            warn!(%report, "Recorder stopped with abandoned workers");
        }
        report
    }

    /// Switches the live view to `driver`, clearing its history.
    pub fn select_live_driver(&self, driver: DriverIndex) {
        self.live.select_driver(driver);
    }

    pub fn live_driver(&self) -> Option<DriverIndex> {
        self.live.selected()
    }

    /// Oldest-first live rows for a category with a live channel.
    pub fn snapshot(&self, category: Category) -> Result<Vec<LiveRow>, ControlError> {
        self.live
            .snapshot(category)
            .ok_or(ControlError::NoLiveChannel(category))
    }

    /// One refresh tick of the rolling window. `Ok(None)` while the channel
    /// is still empty.
    pub fn rolling_window(
        &self,
        category: Category,
        cursor: &mut PlaybackCursor,
    ) -> Result<Option<(TimeWindow, Vec<LiveRow>)>, ControlError> {
        if LiveView::columns(category).is_none() {
            return Err(ControlError::NoLiveChannel(category));
        }
        Ok(self.live.rolling_window(category, cursor))
    }

    pub fn roster(&self) -> Vec<(DriverIndex, String)> {
        self.live.roster()
    }

    pub fn status(&self) -> PipelineStatus {
        let queued = |category: Category| {
            self.run
                .as_ref()
                .and_then(|run| run.queues.get(&category))
                .map_or(0, |q| q.len())
        };
        PipelineStatus {
            state: self.state(),
            session_root: self
                .run
                .as_ref()
                .and_then(|run| run.store.session_root())
                .or_else(|| self.last_session.clone()),
            source_error: self.board.source_error(),
            categories: self.board.snapshot(queued),
        }
    }

    /// `Stopping` once ingestion has ended on a fatal source error, until
    /// `stop()` completes.
    pub fn state(&self) -> RunState {
        match &self.run {
            Some(run) if self.state == RunState::Running && run.dispatcher.is_finished() => {
                RunState::Stopping
            }
            _ => self.state,
        }
    }

    /// Receives the error that ended ingestion. The controller does not stop
    /// on its own; whoever holds this decides when to call `stop()`.
    pub fn fatal_signal(&self) -> Receiver<SourceError> {
        self.fatal_rx.clone()
    }

    pub fn settings(&self) -> &RecorderSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    fn expect_state(&self, action: &'static str, expected: RunState) -> Result<(), ControlError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ControlError::InvalidTransition {
                action,
                state: self.state(),
            })
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.run.is_some() {
            self.stop();
        }
    }
}

/// Unwinds writers spawned by a start that failed part way. Returns the
/// names of writers that did not exit in time.
fn abort_writers(stop: &StopToken, writers: Vec<Worker>, settings: &RecorderSettings) -> Vec<String> {
    stop.stop();
    let deadline = Instant::now() + settings.join_timeout;
    let abandoned: Vec<String> = writers
        .into_iter()
        .filter_map(|worker| worker.join_until(deadline).err())
        .collect();
    if !abandoned.is_empty() {
        warn!(?abandoned, "Writers abandoned while unwinding a failed start");
    }
    abandoned
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitlane_capture::{ChannelSource, PacketSource, SourceFeed};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    fn channel_recorder() -> (Recorder, Arc<Mutex<Option<SourceFeed>>>) {
        let feed = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&feed);
        let recorder = Recorder::new(
            move |_: &RecorderSettings| -> Result<Box<dyn PacketSource>, SourceError> {
                let (tx, source) = ChannelSource::new();
                *slot.lock().unwrap() = Some(tx);
                Ok(Box::new(source))
            },
        )
        .unwrap();
        (recorder, feed)
    }

    #[test]
    fn lifecycle_transitions() {
        let dir = tempdir().unwrap();
        let (mut recorder, _feed) = channel_recorder();
        recorder
            .configure(
                RecorderSettings::default()
                    .with_output_dir(dir.path())
                    .with_poll_timeout(Duration::from_millis(5)),
            )
            .unwrap();
        assert_eq!(recorder.state(), RunState::Stopped);

        recorder.start().unwrap();
        assert_eq!(recorder.state(), RunState::Running);
        assert!(matches!(
            recorder.start(),
            Err(ControlError::InvalidTransition { action: "start", .. })
        ));
        assert!(matches!(
            recorder.configure(RecorderSettings::default()),
            Err(ControlError::InvalidTransition { .. })
        ));

        let report = recorder.stop();
        assert!(report.is_clean());
        assert_eq!(report.session_root, None);
        assert_eq!(recorder.state(), RunState::Stopped);
        assert_eq!(recorder.stop(), StopReport::default());
    }

    #[test]
    fn configure_rejects_invalid_settings() {
        let (mut recorder, _feed) = channel_recorder();
        let err = recorder
            .configure(RecorderSettings::default().with_queue_capacity(0))
            .unwrap_err();
        assert!(matches!(err, ControlError::InvalidSettings(_)));
    }

    #[test]
    fn snapshot_requires_live_channel() {
        let (recorder, _feed) = channel_recorder();
        assert!(recorder.snapshot(Category::Motion).unwrap().is_empty());
        assert!(matches!(
            recorder.snapshot(Category::Lap),
            Err(ControlError::NoLiveChannel(Category::Lap))
        ));
        let mut cursor = PlaybackCursor::new(0.1, 1.0);
        assert!(recorder
            .rolling_window(Category::CarTelemetry, &mut cursor)
            .unwrap()
            .is_none());
    }

    #[traced_test]
    #[test]
    fn failed_start_unwinding_reports_stuck_writers() {
        let stop = StopToken::new();
        let observed = stop.clone();
        let cooperative = Worker::spawn("writer-lap", move || {
            while !observed.is_stopped() {
                thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();
        let stuck = Worker::spawn("writer-motion", || thread::sleep(Duration::from_millis(500))).unwrap();
        let settings = RecorderSettings::default().with_join_timeout(Duration::from_millis(20));

        let abandoned = abort_writers(&stop, vec![cooperative, stuck], &settings);
        assert_eq!(abandoned, vec!["writer-motion".to_string()]);
        assert!(logs_contain("Writers abandoned while unwinding a failed start"));
    }

    #[test]
    fn report_display_names_abandoned_workers() {
        let report = StopReport {
            session_root: Some(PathBuf::from("Data/Track_7_2024-01-01_10-00-00")),
            abandoned: vec!["dispatcher".into()],
            removed: vec![PathBuf::from("AI_Track_7_")],
            rows_written: 12,
            displaced: 0,
        };
        let text = report.to_string();
        assert!(text.contains("12 rows written"));
        assert!(text.contains("1 malformed folders removed"));
        assert!(text.ends_with("abandoned workers: dispatcher"));
        assert!(!report.is_clean());
    }
}
