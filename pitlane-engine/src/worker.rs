//! Named worker threads with a bounded join.
//!
//! A worker that misses its deadline is detached and reported by name; the
//! controller never blocks on it.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::ControlError;

const JOIN_POLL: Duration = Duration::from_millis(2);

#[derive(Debug)]
pub struct Worker {
    name: String,
    handle: JoinHandle<()>,
}

impl Worker {
    pub fn spawn<F>(name: impl Into<String>, body: F) -> Result<Self, ControlError>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(body)
            .map_err(|source| ControlError::Spawn {
                name: name.clone(),
                source,
            })?;
        debug!(worker = %name, "Spawned worker");
        Ok(Self { name, handle })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Joins if the thread exits before `deadline`. Otherwise the thread is
    /// left running detached and its name is returned.
    pub fn join_until(self, deadline: Instant) -> Result<(), String> {
        while !self.handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(worker = %self.name, "Worker did not exit in time, abandoning it");
                return Err(self.name);
            }
            thread::sleep(JOIN_POLL);
        }
        if self.handle.join().is_err() {
            warn!(worker = %self.name, "Worker panicked");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitlane_core::stop::StopToken;

    #[test]
    fn joins_cooperative_worker() {
        let stop = StopToken::new();
        let observed = stop.clone();
        let worker = Worker::spawn("cooperative", move || {
            while !observed.is_stopped() {
                thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();
        assert_eq!(worker.name(), "cooperative");

        stop.stop();
        let deadline = Instant::now() + Duration::from_secs(2);
        assert_eq!(worker.join_until(deadline), Ok(()));
    }

    #[test]
    fn abandons_stuck_worker_at_deadline() {
        let worker = Worker::spawn("stuck", || thread::sleep(Duration::from_secs(3))).unwrap();
        let started = Instant::now();
        let result = worker.join_until(started + Duration::from_millis(50));
        assert_eq!(result, Err("stuck".to_string()));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
