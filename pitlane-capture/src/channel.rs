//! In-process source fed through a crossbeam channel.
//!
//! Used to embed the pipeline behind another decoder and to script sessions in
//! tests. Dropping every [`SourceFeed`] closes the source, which the
//! dispatcher sees as a fatal error.

use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use pitlane_core::events::TelemetryEvent;

use crate::source::{PacketSource, SourceError};

type Item = Result<TelemetryEvent, SourceError>;

#[derive(Clone)]
pub struct SourceFeed {
    sender: Sender<Item>,
}

impl SourceFeed {
    /// Returns false once the source has been dropped.
    pub fn push(&self, event: TelemetryEvent) -> bool {
        self.sender.send(Ok(event)).is_ok()
    }

    /// Makes the source report `err` on its next read.
    pub fn fail(&self, err: SourceError) -> bool {
        self.sender.send(Err(err)).is_ok()
    }
}

pub struct ChannelSource {
    receiver: Receiver<Item>,
}

impl ChannelSource {
    pub fn new() -> (SourceFeed, ChannelSource) {
        let (sender, receiver) = unbounded();
        (SourceFeed { sender }, ChannelSource { receiver })
    }
}

impl PacketSource for ChannelSource {
    fn next(&mut self, timeout: Duration) -> Result<Option<TelemetryEvent>, SourceError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(Ok(event)) => Ok(Some(event)),
            Ok(Err(err)) => Err(err),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(SourceError::Fatal("source feed closed".into()))
            }
        }
    }

    fn describe(&self) -> String {
        "channel".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitlane_core::events::{EventData, PacketHeader, Payload};

    fn marker(t: f64) -> TelemetryEvent {
        TelemetryEvent::new(
            PacketHeader::new(t, 0),
            Payload::Event(EventData { code: "BUTN".into() }),
        )
    }

    #[test]
    fn delivers_events_then_errors_in_order() {
        let (feed, mut source) = ChannelSource::new();
        feed.push(marker(1.0));
        feed.fail(SourceError::Transient("checksum".into()));
        feed.push(marker(2.0));

        let wait = Duration::from_millis(10);
        assert_eq!(source.next(wait).unwrap().unwrap().timestamp(), 1.0);
        assert!(!source.next(wait).unwrap_err().is_fatal());
        assert_eq!(source.next(wait).unwrap().unwrap().timestamp(), 2.0);
        assert_eq!(source.next(wait).unwrap(), None);
    }

    #[test]
    fn closed_feed_is_fatal() {
        let (feed, mut source) = ChannelSource::new();
        drop(feed);
        assert!(source
            .next(Duration::from_millis(10))
            .unwrap_err()
            .is_fatal());
    }
}
