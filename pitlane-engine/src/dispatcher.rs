//! ## pitlane-engine::dispatcher
//! **The single reader of the upstream source**
//!
//! Each event is routed to the queue of its own category when subscribed.
//! Session and participants events are also routed to every other queue, so
//! each writer learns the session and driver layout in order with its own
//! data. Enqueueing drops the oldest queued item when full and never blocks.

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::Sender;
use pitlane_capture::{PacketSource, SourceError};
use pitlane_core::events::{Category, DriverIndex, DriverSelection, TelemetryEvent};
use pitlane_core::queue::{CategoryQueue, Enqueued};
use pitlane_core::stop::StopToken;
use pitlane_telemetry::MetricsRecorder;
use tracing::{debug, error, info, trace, warn};

use crate::live::LiveView;
use crate::status::{CategoryStats, StatusBoard};

/// An event together with the driver slots the receiving writer records.
#[derive(Debug, Clone)]
pub struct RoutedEvent {
    pub event: Arc<TelemetryEvent>,
    pub drivers: Vec<DriverIndex>,
}

pub struct Route {
    pub category: Category,
    pub selection: DriverSelection,
    pub queue: Arc<CategoryQueue<RoutedEvent>>,
    pub stats: Arc<CategoryStats>,
}

impl Route {
    fn wants(&self, category: Category) -> bool {
        self.category == category || category.is_control()
    }
}

pub struct Dispatcher {
    source: Box<dyn PacketSource>,
    routes: Vec<Route>,
    live: Arc<LiveView>,
    board: Arc<StatusBoard>,
    metrics: Arc<MetricsRecorder>,
    stop: StopToken,
    fatal: Sender<SourceError>,
    poll_timeout: Duration,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Box<dyn PacketSource>,
        routes: Vec<Route>,
        live: Arc<LiveView>,
        board: Arc<StatusBoard>,
        metrics: Arc<MetricsRecorder>,
        stop: StopToken,
        fatal: Sender<SourceError>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            source,
            routes,
            live,
            board,
            metrics,
            stop,
            fatal,
            poll_timeout,
        }
    }

    /// Reads until stopped or the source fails fatally.
    pub fn run(mut self) {
        let origin = self.source.describe();
        info!(source = %origin, "Dispatcher started");
        let mut dispatched = 0u64;

        while !self.stop.is_stopped() {
            match self.source.next(self.poll_timeout) {
                Ok(Some(event)) => {
                    self.dispatch(event);
                    dispatched += 1;
                }
                Ok(None) => continue,
                Err(err) if !err.is_fatal() => {
                    warn!(source = %origin, "Transient source error: {err}");
                    self.metrics.inc_source_errors("transient");
                    self.board.set_source_error(err.to_string());
                }
                Err(err) => {
                    error!(source = %origin, "Fatal source error, ingestion stops: {err}");
                    self.metrics.inc_source_errors("fatal");
                    self.board.set_source_error(err.to_string());
                    if self.fatal.send(err).is_err() {
                        debug!("No controller listening for fatal source errors");
                    }
                    break;
                }
            }
        }

        info!(dispatched, "Dispatcher exited");
    }

    /// Routes one event. It counts as ingested once every queue and the live
    /// view have it.
    pub fn dispatch(&self, event: TelemetryEvent) {
        self.live.record(&event);

        let category = event.category();
        let event = Arc::new(event);
        for route in self.routes.iter().filter(|r| r.wants(category)) {
            let routed = RoutedEvent {
                event: Arc::clone(&event),
                drivers: route.selection.resolve(&event.header),
            };
            match route.queue.enqueue(routed) {
                Ok(Enqueued::Accepted) => {}
                Ok(Enqueued::DisplacedOldest) => {
                    trace!(category = %route.category, "Displaced oldest queued event");
                    route.stats.record_displaced();
                    self.metrics.inc_displaced(route.category.as_str());
                }
                Err(e) => {
                    // Only possible once the writer side is gone.
                    route.stats.record_error(e.to_string());
                    debug!(category = %route.category, "Enqueue failed: {e}");
                }
            }
        }
        self.metrics.inc_ingested();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;
    use pitlane_capture::ChannelSource;
    use pitlane_core::events::*;

    fn route(category: Category, capacity: usize, board: &StatusBoard) -> Route {
        Route {
            category,
            selection: DriverSelection::PlayerOnly,
            queue: Arc::new(CategoryQueue::with_capacity(category.as_str(), capacity).unwrap()),
            stats: board.stats(category).unwrap(),
        }
    }

    fn event(t: f64, payload: Payload) -> TelemetryEvent {
        TelemetryEvent::new(PacketHeader::new(t, 2), payload)
    }

    fn lap(t: f64) -> TelemetryEvent {
        event(t, Payload::Lap(PerCar::new(vec![])))
    }

    fn dispatcher(routes: Vec<Route>, board: Arc<StatusBoard>) -> Dispatcher {
        let (_feed, source) = ChannelSource::new();
        let (fatal, _) = unbounded();
        Dispatcher::new(
            Box::new(source),
            routes,
            Arc::new(LiveView::new(4).unwrap()),
            board,
            Arc::new(MetricsRecorder::new().unwrap()),
            StopToken::new(),
            fatal,
            Duration::from_millis(5),
        )
    }

    #[test]
    fn routes_by_category_and_fans_out_control_events() {
        let board = Arc::new(StatusBoard::new([Category::Lap, Category::Motion]));
        let lap_route = route(Category::Lap, 8, &board);
        let motion_route = route(Category::Motion, 8, &board);
        let (lap_q, motion_q) = (lap_route.queue.clone(), motion_route.queue.clone());
        let d = dispatcher(vec![lap_route, motion_route], board);

        let session = SessionData {
            track_id: 7,
            weather: 0,
            track_temperature: 30,
            air_temperature: 20,
            safety_car_status: 0,
            total_laps: 3,
            track_length: 5000,
            session_type: 1,
        };
        d.dispatch(event(0.0, Payload::Session(session)));
        d.dispatch(lap(1.0));
        d.dispatch(event(1.5, Payload::Event(EventData { code: "SSTA".into() })));

        let lap_items: Vec<_> = std::iter::from_fn(|| lap_q.try_dequeue()).collect();
        let motion_items: Vec<_> = std::iter::from_fn(|| motion_q.try_dequeue()).collect();
        assert_eq!(lap_items.len(), 2);
        assert_eq!(lap_items[0].event.category(), Category::Session);
        assert_eq!(lap_items[1].event.category(), Category::Lap);
        assert_eq!(lap_items[1].drivers, vec![DriverIndex(2)]);
        assert_eq!(motion_items.len(), 1);
    }

    #[test]
    fn full_queue_keeps_newest_without_blocking() {
        let board = Arc::new(StatusBoard::new([Category::Lap]));
        let lap_route = route(Category::Lap, 2, &board);
        let queue = lap_route.queue.clone();
        let d = dispatcher(vec![lap_route], board.clone());

        for t in 0..5 {
            d.dispatch(lap(t as f64));
        }
        let kept: Vec<f64> = std::iter::from_fn(|| queue.try_dequeue())
            .map(|r| r.event.timestamp())
            .collect();
        assert_eq!(kept, vec![3.0, 4.0]);
        assert_eq!(board.displaced(), 3);
    }

    #[test]
    fn run_exits_on_fatal_and_notifies() {
        let board = Arc::new(StatusBoard::new([Category::Lap]));
        let lap_route = route(Category::Lap, 4, &board);
        let queue = lap_route.queue.clone();
        let (feed, source) = ChannelSource::new();
        let (fatal_tx, fatal_rx) = unbounded();
        let d = Dispatcher::new(
            Box::new(source),
            vec![lap_route],
            Arc::new(LiveView::new(4).unwrap()),
            board.clone(),
            Arc::new(MetricsRecorder::new().unwrap()),
            StopToken::new(),
            fatal_tx,
            Duration::from_millis(5),
        );

        feed.push(lap(1.0));
        feed.fail(SourceError::Transient("bad checksum".into()));
        feed.push(lap(2.0));
        feed.fail(SourceError::Fatal("socket closed".into()));
        d.run();

        assert_eq!(queue.len(), 2);
        assert!(fatal_rx.try_recv().unwrap().is_fatal());
        assert!(board.source_error().unwrap().contains("socket closed"));
    }
}
