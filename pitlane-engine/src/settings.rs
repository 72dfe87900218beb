//! Plain-value recorder settings and the source factory seam.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use pitlane_capture::{JsonDecoder, PacketSource, SourceError, UdpSource};
use pitlane_config::PitlaneConfig;
use pitlane_core::events::{Category, DriverSelection};

use crate::error::ControlError;

const MAX_QUEUE_CAPACITY: usize = 1_048_576;
const SAMPLE_RATE_HZ: RangeInclusive<u32> = 1..=60;
const WINDOW_SECS: RangeInclusive<f64> = 0.1..=600.0;
const JOIN_TIMEOUT: RangeInclusive<Duration> = Duration::from_millis(10)..=Duration::from_secs(60);
const MAX_POLL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct RecorderSettings {
    /// Recorded categories and, for each, the driver slots written.
    pub subscriptions: BTreeMap<Category, DriverSelection>,
    pub address: String,
    pub port: u16,
    pub sample_rate_hz: u32,
    pub poll_timeout: Duration,
    pub queue_capacity: usize,
    pub join_timeout: Duration,
    pub output_dir: PathBuf,
    pub window_secs: f64,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            subscriptions: [Category::CarDamage, Category::CarTelemetry, Category::Session]
                .into_iter()
                .map(|c| (c, DriverSelection::PlayerOnly))
                .collect(),
            address: "127.0.0.1".into(),
            port: 20777,
            sample_rate_hz: 30,
            poll_timeout: Duration::from_millis(100),
            queue_capacity: 1000,
            join_timeout: Duration::from_secs(3),
            output_dir: PathBuf::from("Data"),
            window_secs: 5.0,
        }
    }
}

impl RecorderSettings {
    /// The control-surface shape: categories, optional driver slots (player
    /// only when `None`), listen address and sample rate. Everything else
    /// keeps its default.
    pub fn new(
        categories: impl IntoIterator<Item = Category>,
        drivers: Option<impl IntoIterator<Item = u8>>,
        address: impl Into<String>,
        port: u16,
        sample_rate_hz: u32,
    ) -> Self {
        let selection = DriverSelection::from_indexes(drivers);
        Self {
            subscriptions: categories
                .into_iter()
                .map(|c| (c, selection.clone()))
                .collect(),
            address: address.into(),
            port,
            sample_rate_hz,
            ..Self::default()
        }
    }

    pub fn from_config(config: &PitlaneConfig) -> Result<Self, ControlError> {
        let categories = config
            .pipeline
            .categories
            .iter()
            .map(|name| name.parse::<Category>())
            .collect::<Result<Vec<_>, _>>()?;
        let selection = DriverSelection::from_indexes(config.pipeline.drivers.clone());

        Ok(Self {
            subscriptions: categories
                .into_iter()
                .map(|c| (c, selection.clone()))
                .collect(),
            address: config.capture.address.clone(),
            port: config.capture.port,
            sample_rate_hz: config.capture.sample_rate_hz,
            poll_timeout: Duration::from_millis(config.capture.poll_timeout_ms),
            queue_capacity: config.pipeline.queue_capacity,
            join_timeout: Duration::from_millis(config.pipeline.join_timeout_ms),
            output_dir: config.storage.output_dir.clone(),
            window_secs: config.live.window_secs,
        })
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_window_secs(mut self, secs: f64) -> Self {
        self.window_secs = secs;
        self
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.subscriptions.keys().copied()
    }

    /// Ring buffer size that holds one full window at the sample rate.
    pub fn live_capacity(&self) -> usize {
        ((self.window_secs * self.sample_rate_hz as f64).ceil() as usize).max(1)
    }

    /// Same bounds as the configuration file, so settings built by hand
    /// cannot size queues or ring buffers beyond what a config could.
    pub fn validate(&self) -> Result<(), ControlError> {
        let invalid = |msg: &str| Err(ControlError::InvalidSettings(msg.into()));
        if self.subscriptions.is_empty() {
            return invalid("no categories subscribed");
        }
        if !(1..=MAX_QUEUE_CAPACITY).contains(&self.queue_capacity) {
            return invalid("queue capacity must be between 1 and 1048576");
        }
        if !SAMPLE_RATE_HZ.contains(&self.sample_rate_hz) {
            return invalid("sample rate must be between 1 and 60 Hz");
        }
        if self.poll_timeout.is_zero() || self.poll_timeout > MAX_POLL_TIMEOUT {
            return invalid("poll timeout must be between 1 ms and 5 s");
        }
        if !JOIN_TIMEOUT.contains(&self.join_timeout) {
            return invalid("join timeout must be between 10 ms and 60 s");
        }
        if !WINDOW_SECS.contains(&self.window_secs) {
            return invalid("live window must be between 0.1 and 600 s");
        }
        Ok(())
    }
}

/// Opens the upstream source for a run. Called from `start()`, so a failure
/// here leaves the recorder stopped.
pub trait SourceFactory: Send {
    fn open(&mut self, settings: &RecorderSettings) -> Result<Box<dyn PacketSource>, SourceError>;
}

impl<F> SourceFactory for F
where
    F: FnMut(&RecorderSettings) -> Result<Box<dyn PacketSource>, SourceError> + Send,
{
    fn open(&mut self, settings: &RecorderSettings) -> Result<Box<dyn PacketSource>, SourceError> {
        self(settings)
    }
}

/// Binds `address:port` and decodes one JSON event per datagram.
#[derive(Debug, Default, Clone, Copy)]
pub struct UdpJsonFactory;

impl SourceFactory for UdpJsonFactory {
    fn open(&mut self, settings: &RecorderSettings) -> Result<Box<dyn PacketSource>, SourceError> {
        let source = UdpSource::bind(&settings.address, settings.port, JsonDecoder)?;
        Ok(Box::new(source))
    }
}
