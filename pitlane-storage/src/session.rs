//! ## pitlane-storage::session
//! **Session and driver directory manager**
//!
//! Owns the layout of one recording: the session root, its session-wide sinks
//! and one folder per driver. Writers share a single store. Creating a session
//! or driver is first-creator-wins under the store lock; losers get
//! [`Ensured::Existing`] and touch nothing on disk.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use pitlane_core::events::DriverIndex;
use tracing::{debug, info, instrument, warn};

use crate::error::StorageError;
use crate::layout::{driver_dir_name, session_dir_name, Role};
use crate::schema::{Record, SinkKind};
use crate::sink::CsvSink;

type SharedSink = Arc<Mutex<CsvSink>>;

/// Outcome of an idempotent create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensured {
    Created,
    Existing,
}

#[derive(Debug)]
struct DriverEntry {
    dir: PathBuf,
    sinks: HashMap<SinkKind, SharedSink>,
}

#[derive(Debug)]
struct OpenSession {
    root: PathBuf,
    track_id: i8,
    sinks: HashMap<SinkKind, SharedSink>,
    drivers: BTreeMap<DriverIndex, DriverEntry>,
}

#[derive(Debug)]
pub struct SessionStore {
    output_dir: PathBuf,
    driver_kinds: Vec<SinkKind>,
    session: Mutex<Option<OpenSession>>,
}

impl SessionStore {
    /// `driver_kinds` are the sinks every driver folder gets. Session-scoped
    /// kinds in the list are ignored.
    pub fn new(output_dir: impl Into<PathBuf>, driver_kinds: impl IntoIterator<Item = SinkKind>) -> Self {
        let mut driver_kinds: Vec<SinkKind> = driver_kinds
            .into_iter()
            .filter(|k| !k.is_session_scoped())
            .collect();
        driver_kinds.sort();
        driver_kinds.dedup();

        Self {
            output_dir: output_dir.into(),
            driver_kinds,
            session: Mutex::new(None),
        }
    }

    pub fn ensure_session(&self, track_id: i8) -> Result<Ensured, StorageError> {
        self.ensure_session_at(track_id, Local::now())
    }

    /// Opens the session root and its session-wide sinks on the first call.
    /// Later calls are no-ops, even for another track id.
    #[instrument(skip(self, started))]
    pub fn ensure_session_at(
        &self,
        track_id: i8,
        started: DateTime<Local>,
    ) -> Result<Ensured, StorageError> {
        let mut session = self.session.lock();
        if session.is_some() {
            return Ok(Ensured::Existing);
        }

        let root = self.create_root(&session_dir_name(track_id, &started))?;
        let sinks = open_sinks(&root, &SinkKind::SESSION_SCOPED)?;
        info!(root = %root.display(), "Opened session");

        *session = Some(OpenSession {
            root,
            track_id,
            sinks,
            drivers: BTreeMap::new(),
        });
        Ok(Ensured::Created)
    }

    /// Creates a fresh session root. A root left by an earlier session that
    /// started in the same second gets a `_1`, `_2`, ... suffix instead of
    /// being reused.
    fn create_root(&self, name: &str) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.output_dir).map_err(|e| StorageError::io(&self.output_dir, e))?;
        let mut suffix = 0u32;
        loop {
            let root = match suffix {
                0 => self.output_dir.join(name),
                n => self.output_dir.join(format!("{name}_{n}")),
            };
            match fs::create_dir(&root) {
                Ok(()) => return Ok(root),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(root = %root.display(), "Session root taken, trying next suffix");
                    suffix += 1;
                }
                Err(e) => return Err(StorageError::io(&root, e)),
            }
        }
    }

    /// Creates the folder and sinks for `index` on first observation.
    #[instrument(skip(self))]
    pub fn ensure_driver(
        &self,
        index: DriverIndex,
        name: &str,
        is_player: bool,
    ) -> Result<Ensured, StorageError> {
        let mut guard = self.session.lock();
        let session = guard.as_mut().ok_or(StorageError::NoSession)?;
        if session.drivers.contains_key(&index) {
            return Ok(Ensured::Existing);
        }

        let role = Role::from_player_flag(is_player);
        let dir = session
            .root
            .join(driver_dir_name(role, session.track_id, name));
        if let Some((other, _)) = session.drivers.iter().find(|(_, d)| d.dir == dir) {
            warn!(
                driver = %index,
                other = %other,
                dir = %dir.display(),
                "Driver shares folder with another slot, rows will interleave"
            );
        }
        fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        let sinks = open_sinks(&dir, &self.driver_kinds)?;
        debug!(driver = %index, dir = %dir.display(), "Created driver folder");

        session.drivers.insert(index, DriverEntry { dir, sinks });
        Ok(Ensured::Created)
    }

    pub fn append_session(&self, kind: SinkKind, record: &Record) -> Result<(), StorageError> {
        let sink = {
            let guard = self.session.lock();
            let session = guard.as_ref().ok_or(StorageError::NoSession)?;
            session
                .sinks
                .get(&kind)
                .cloned()
                .ok_or(StorageError::NoSink(kind))?
        };
        let mut sink = sink.lock();
        sink.append(record)
    }

    pub fn append_driver(
        &self,
        index: DriverIndex,
        kind: SinkKind,
        record: &Record,
    ) -> Result<(), StorageError> {
        let sink = {
            let guard = self.session.lock();
            let session = guard.as_ref().ok_or(StorageError::NoSession)?;
            let driver = session
                .drivers
                .get(&index)
                .ok_or(StorageError::UnknownDriver(index))?;
            driver
                .sinks
                .get(&kind)
                .cloned()
                .ok_or(StorageError::NoSink(kind))?
        };
        let mut sink = sink.lock();
        sink.append(record)
    }

    pub fn has_session(&self) -> bool {
        self.session.lock().is_some()
    }

    pub fn has_driver(&self, index: DriverIndex) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|s| s.drivers.contains_key(&index))
    }

    pub fn session_root(&self) -> Option<PathBuf> {
        self.session.lock().as_ref().map(|s| s.root.clone())
    }

    pub fn driver_dir(&self, index: DriverIndex) -> Option<PathBuf> {
        self.session
            .lock()
            .as_ref()
            .and_then(|s| s.drivers.get(&index))
            .map(|d| d.dir.clone())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Syncs and drops every sink. Returns the session root, if one was opened.
    #[instrument(skip(self))]
    pub fn close(&self) -> Option<PathBuf> {
        let session = self.session.lock().take()?;
        let sinks = session
            .sinks
            .values()
            .chain(session.drivers.values().flat_map(|d| d.sinks.values()));
        for sink in sinks {
            let sink = sink.lock();
            if let Err(e) = sink.sync() {
                debug!("Sync on close failed: {e}");
            }
        }
        info!(root = %session.root.display(), drivers = session.drivers.len(), "Closed session");
        Some(session.root)
    }
}

fn open_sinks(dir: &Path, kinds: &[SinkKind]) -> Result<HashMap<SinkKind, SharedSink>, StorageError> {
    kinds
        .iter()
        .map(|&kind| -> Result<_, StorageError> {
            Ok((kind, Arc::new(Mutex::new(CsvSink::open(dir, kind)?))))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::thread;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    fn store(dir: &Path) -> SessionStore {
        SessionStore::new(dir, [SinkKind::CarTelemetry, SinkKind::Lap, SinkKind::SessionData])
    }

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn session_is_created_once() {
        let out = tempdir().unwrap();
        let store = store(out.path());
        assert_eq!(store.ensure_session_at(7, started()).unwrap(), Ensured::Created);
        assert_eq!(store.ensure_session_at(9, started()).unwrap(), Ensured::Existing);

        let root = store.session_root().unwrap();
        assert!(root.ends_with("Track_7_2024-05-01_10-00-00"));
        assert!(root.join("session_data.csv").is_file());
        assert!(root.join("event_data.csv").is_file());
    }

    #[test]
    fn same_second_sessions_get_distinct_roots() {
        let out = tempdir().unwrap();
        let mut roots = Vec::new();
        for _ in 0..3 {
            let store = store(out.path());
            store.ensure_session_at(7, started()).unwrap();
            store
                .append_session(SinkKind::EventData, &Record::new(1.0).field("SSTA"))
                .unwrap();
            roots.push(store.close().unwrap());
        }

        assert!(roots[0].ends_with("Track_7_2024-05-01_10-00-00"));
        assert!(roots[1].ends_with("Track_7_2024-05-01_10-00-00_1"));
        assert!(roots[2].ends_with("Track_7_2024-05-01_10-00-00_2"));
        for root in &roots {
            let text = fs::read_to_string(root.join("event_data.csv")).unwrap();
            assert_eq!(text.lines().count(), 2);
        }
    }

    #[traced_test]
    #[test]
    fn colliding_driver_names_are_reported() {
        let out = tempdir().unwrap();
        let store = store(out.path());
        store.ensure_session_at(7, started()).unwrap();
        store.ensure_driver(DriverIndex(3), "", false).unwrap();
        store.ensure_driver(DriverIndex(4), "", false).unwrap();

        assert_eq!(store.driver_dir(DriverIndex(3)), store.driver_dir(DriverIndex(4)));
        assert!(logs_contain("Driver shares folder with another slot"));
    }

    #[test]
    fn driver_requires_session() {
        let out = tempdir().unwrap();
        let store = store(out.path());
        assert!(matches!(
            store.ensure_driver(DriverIndex(0), "Verstappen", true),
            Err(StorageError::NoSession)
        ));
    }

    #[test]
    fn ensure_driver_twice_creates_one_folder_and_one_header() {
        let out = tempdir().unwrap();
        let store = store(out.path());
        store.ensure_session_at(7, started()).unwrap();

        let first = store.ensure_driver(DriverIndex(0), "Verstappen", true).unwrap();
        let second = store.ensure_driver(DriverIndex(0), "Verstappen", true).unwrap();
        assert_eq!((first, second), (Ensured::Created, Ensured::Existing));

        let root = store.session_root().unwrap();
        let folders: Vec<_> = fs::read_dir(&root)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .collect();
        assert_eq!(folders.len(), 1);

        let dir = store.driver_dir(DriverIndex(0)).unwrap();
        assert!(dir.ends_with("Player_Track_7_Verstappen"));
        for file in ["car_telemetry.csv", "lap_data.csv"] {
            let text = fs::read_to_string(dir.join(file)).unwrap();
            assert_eq!(text.lines().count(), 1, "{file}");
        }
        assert!(!dir.join("session_data.csv").exists());
    }

    #[test]
    fn concurrent_ensure_driver_has_one_winner() {
        let out = tempdir().unwrap();
        let store = Arc::new(store(out.path()));
        store.ensure_session_at(3, started()).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.ensure_driver(DriverIndex(4), "Norris", false).unwrap())
            })
            .collect();
        let created = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|e| *e == Ensured::Created)
            .count();
        assert_eq!(created, 1);
    }

    #[test]
    fn appends_route_to_the_right_sink() {
        let out = tempdir().unwrap();
        let store = store(out.path());
        store.ensure_session_at(7, started()).unwrap();
        store.ensure_driver(DriverIndex(2), "Hamilton", false).unwrap();

        store
            .append_session(SinkKind::EventData, &Record::new(1.0).field("SSTA"))
            .unwrap();
        let lap = Record::new(2.0).fields([1, 2, 3]).field(false).fields([1, 5]);
        store.append_driver(DriverIndex(2), SinkKind::Lap, &lap).unwrap();

        assert!(matches!(
            store.append_driver(DriverIndex(9), SinkKind::Lap, &lap),
            Err(StorageError::UnknownDriver(DriverIndex(9)))
        ));
        assert!(matches!(
            store.append_driver(DriverIndex(2), SinkKind::Motion, &lap),
            Err(StorageError::NoSink(SinkKind::Motion))
        ));

        let dir = store.driver_dir(DriverIndex(2)).unwrap();
        let text = fs::read_to_string(dir.join("lap_data.csv")).unwrap();
        assert_eq!(text.lines().nth(1), Some("2,1,2,3,false,1,5"));
    }

    #[test]
    fn close_forgets_the_session() {
        let out = tempdir().unwrap();
        let store = store(out.path());
        assert_eq!(store.close(), None);
        store.ensure_session_at(7, started()).unwrap();
        let root = store.close().unwrap();
        assert!(root.is_dir());
        assert!(!store.has_session());
        assert!(matches!(
            store.append_session(SinkKind::EventData, &Record::new(0.0).field("x")),
            Err(StorageError::NoSession)
        ));
    }
}
