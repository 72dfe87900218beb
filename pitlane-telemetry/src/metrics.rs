//! ## pitlane-telemetry::metrics
//! **Prometheus counters for the ingest pipeline**
//!
//! One recorder is shared by the dispatcher and every writer. Per-category
//! series are labelled with the camelCase category tag.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub events_ingested: IntCounter,
    pub events_displaced: IntCounterVec,
    pub rows_written: IntCounterVec,
    pub write_errors: IntCounterVec,
    pub source_errors: IntCounterVec,
    pub row_write_seconds: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let events_ingested = IntCounter::new(
            "pitlane_events_ingested_total",
            "Events read from the upstream source",
        )?;
        let events_displaced = IntCounterVec::new(
            Opts::new(
                "pitlane_events_displaced_total",
                "Queued events dropped to admit newer ones",
            ),
            &["category"],
        )?;
        let rows_written = IntCounterVec::new(
            Opts::new("pitlane_rows_written_total", "Rows appended to sinks"),
            &["category"],
        )?;
        let write_errors = IntCounterVec::new(
            Opts::new(
                "pitlane_write_errors_total",
                "Rows skipped after a failed retry",
            ),
            &["category"],
        )?;
        let source_errors = IntCounterVec::new(
            Opts::new("pitlane_source_errors_total", "Upstream read failures"),
            &["kind"],
        )?;
        let row_write_seconds = Histogram::with_opts(
            HistogramOpts::new("pitlane_row_write_seconds", "Time to append one row")
                .buckets(vec![1e-5, 1e-4, 1e-3, 1e-2, 1e-1]),
        )?;

        registry.register(Box::new(events_ingested.clone()))?;
        registry.register(Box::new(events_displaced.clone()))?;
        registry.register(Box::new(rows_written.clone()))?;
        registry.register(Box::new(write_errors.clone()))?;
        registry.register(Box::new(source_errors.clone()))?;
        registry.register(Box::new(row_write_seconds.clone()))?;

        Ok(Self {
            registry,
            events_ingested,
            events_displaced,
            rows_written,
            write_errors,
            source_errors,
            row_write_seconds,
        })
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn inc_ingested(&self) {
        self.events_ingested.inc();
    }

    pub fn inc_displaced(&self, category: &str) {
        self.events_displaced.with_label_values(&[category]).inc();
    }

    pub fn inc_rows_written(&self, category: &str) {
        self.rows_written.with_label_values(&[category]).inc();
    }

    pub fn inc_write_errors(&self, category: &str) {
        self.write_errors.with_label_values(&[category]).inc();
    }

    pub fn inc_source_errors(&self, kind: &str) {
        self.source_errors.with_label_values(&[kind]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_labelled_series() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.inc_ingested();
        metrics.inc_rows_written("carTelemetry");
        metrics.inc_rows_written("carTelemetry");
        metrics.inc_displaced("motion");
        metrics.inc_source_errors("transient");

        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("pitlane_events_ingested_total 1"));
        assert!(text.contains("pitlane_rows_written_total{category=\"carTelemetry\"} 2"));
        assert!(text.contains("pitlane_events_displaced_total{category=\"motion\"} 1"));
        assert!(text.contains("pitlane_source_errors_total{kind=\"transient\"} 1"));
    }

    #[test]
    fn recorders_are_independent() {
        let a = MetricsRecorder::new().unwrap();
        let b = MetricsRecorder::new().unwrap();
        a.inc_ingested();
        assert_eq!(a.events_ingested.get(), 1);
        assert_eq!(b.events_ingested.get(), 0);
    }
}
