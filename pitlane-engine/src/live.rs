//! ## pitlane-engine::live
//! **Bounded live history for one selected driver**
//!
//! The dispatcher inserts rows for the selected driver into one ring buffer
//! per live channel; the view refresh path reads snapshots on its own timer.
//! Insert, reset and snapshot all take the same lock, so a reader never sees
//! a buffer halfway through a reset.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use pitlane_core::buffers::{PlaybackCursor, RingBuffer, TimeWindow, Timestamped};
use pitlane_core::events::{
    CarMotionData, CarTelemetryData, Category, DriverIndex, PacketHeader, Payload, TelemetryEvent,
};
use pitlane_core::CoreError;
use serde::Serialize;
use tracing::{debug, info};

pub const MOTION_COLUMNS: [&str; 9] = [
    "position_x",
    "position_y",
    "position_z",
    "velocity_x",
    "velocity_y",
    "velocity_z",
    "g_force_lateral",
    "g_force_longitudinal",
    "g_force_vertical",
];

pub const TELEMETRY_COLUMNS: [&str; 9] = [
    "speed_kmh",
    "throttle",
    "brake",
    "gear",
    "engine_rpm",
    "tire_temp_FL",
    "tire_temp_FR",
    "tire_temp_RL",
    "tire_temp_RR",
];

/// One sample of a live channel; `values` line up with the channel's columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveRow {
    pub timestamp: f64,
    pub values: Vec<f64>,
}

impl Timestamped for LiveRow {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

struct LiveState {
    selected: Option<DriverIndex>,
    motion: RingBuffer<LiveRow>,
    telemetry: RingBuffer<LiveRow>,
    roster: BTreeMap<DriverIndex, String>,
}

impl LiveState {
    fn channel(&mut self, category: Category) -> Option<&mut RingBuffer<LiveRow>> {
        match category {
            Category::Motion => Some(&mut self.motion),
            Category::CarTelemetry => Some(&mut self.telemetry),
            _ => None,
        }
    }
}

pub struct LiveView {
    state: Mutex<LiveState>,
}

impl LiveView {
    /// Categories with a live channel.
    pub const CHANNELS: [Category; 2] = [Category::Motion, Category::CarTelemetry];

    pub fn new(capacity: usize) -> Result<Self, CoreError> {
        Ok(Self {
            state: Mutex::new(LiveState {
                selected: None,
                motion: RingBuffer::with_capacity(capacity)?,
                telemetry: RingBuffer::with_capacity(capacity)?,
                roster: BTreeMap::new(),
            }),
        })
    }

    pub fn columns(category: Category) -> Option<&'static [&'static str]> {
        match category {
            Category::Motion => Some(&MOTION_COLUMNS),
            Category::CarTelemetry => Some(&TELEMETRY_COLUMNS),
            _ => None,
        }
    }

    /// Feeds one event. Participants refresh the roster; motion and car
    /// telemetry add a row for the selected driver. Until a driver has been
    /// selected, the packet's player car is selected.
    pub fn record(&self, event: &TelemetryEvent) {
        match &event.payload {
            Payload::Participants(data) => {
                let mut state = self.state.lock();
                for (slot, participant) in data.participants.iter().enumerate() {
                    let name = participant.name.trim_matches(|c: char| c == '\0' || c.is_whitespace());
                    if !name.is_empty() {
                        state.roster.insert(DriverIndex(slot as u8), name.to_string());
                    }
                }
            }
            Payload::Motion(cars) => {
                self.insert(&event.header, Category::Motion, |d| cars.get(d).map(motion_values))
            }
            Payload::CarTelemetry(cars) => self.insert(&event.header, Category::CarTelemetry, |d| {
                cars.get(d).map(telemetry_values)
            }),
            _ => {}
        }
    }

    fn insert(
        &self,
        header: &PacketHeader,
        category: Category,
        values_for: impl FnOnce(DriverIndex) -> Option<Vec<f64>>,
    ) {
        let mut state = self.state.lock();
        let driver = *state.selected.get_or_insert_with(|| {
            debug!(driver = %header.player(), "Auto-selected player car for live view");
            header.player()
        });
        if let (Some(values), Some(buffer)) = (values_for(driver), state.channel(category)) {
            buffer.insert(LiveRow {
                timestamp: header.session_time,
                values,
            });
        }
    }

    /// Switches the live driver and clears every channel.
    pub fn select_driver(&self, driver: DriverIndex) {
        let mut state = self.state.lock();
        state.selected = Some(driver);
        state.motion.reset();
        state.telemetry.reset();
        info!(driver = %driver, "Live driver selected");
    }

    pub fn selected(&self) -> Option<DriverIndex> {
        self.state.lock().selected
    }

    /// Named drivers seen so far, by slot.
    pub fn roster(&self) -> Vec<(DriverIndex, String)> {
        self.state
            .lock()
            .roster
            .iter()
            .map(|(i, n)| (*i, n.clone()))
            .collect()
    }

    /// Oldest-first rows of a channel. `None` if the category has no channel.
    pub fn snapshot(&self, category: Category) -> Option<Vec<LiveRow>> {
        let mut state = self.state.lock();
        state.channel(category).map(|buffer| buffer.snapshot())
    }

    /// Advances `cursor` one tick over the channel's current rows.
    pub fn rolling_window(
        &self,
        category: Category,
        cursor: &mut PlaybackCursor,
    ) -> Option<(TimeWindow, Vec<LiveRow>)> {
        let rows = self.snapshot(category)?;
        cursor.window(&rows)
    }
}

fn motion_values(m: &CarMotionData) -> Vec<f64> {
    m.world_position
        .iter()
        .chain(&m.world_velocity)
        .chain(&[m.g_force_lateral, m.g_force_longitudinal, m.g_force_vertical])
        .map(|v| *v as f64)
        .collect()
}

fn telemetry_values(t: &CarTelemetryData) -> Vec<f64> {
    let mut values = vec![
        t.speed as f64,
        t.throttle as f64,
        t.brake as f64,
        t.gear as f64,
        t.engine_rpm as f64,
    ];
    values.extend(t.tyres_surface_temperature.iter().map(|v| *v as f64));
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitlane_core::events::{Participant, ParticipantsData, PerCar};

    fn telemetry(t: f64, player: u8, cars: u8) -> TelemetryEvent {
        let rows = (0..cars)
            .map(|car| CarTelemetryData {
                speed: 100 * (car as u16 + 1),
                throttle: 1.0,
                brake: 0.0,
                steer: 0.0,
                gear: 6,
                engine_rpm: 10500,
                drs: false,
                tyres_surface_temperature: [90, 90, 92, 92],
            })
            .collect();
        TelemetryEvent::new(
            PacketHeader::new(t, player),
            Payload::CarTelemetry(PerCar::new(rows)),
        )
    }

    #[test]
    fn auto_selects_player_and_keeps_last_window() {
        let live = LiveView::new(5).unwrap();
        for i in 0..7 {
            live.record(&telemetry(i as f64, 1, 3));
        }
        assert_eq!(live.selected(), Some(DriverIndex(1)));

        let rows = live.snapshot(Category::CarTelemetry).unwrap();
        let times: Vec<f64> = rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(times, vec![2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(rows[0].values[0], 200.0);
        assert_eq!(rows[0].values.len(), TELEMETRY_COLUMNS.len());
        assert!(live.snapshot(Category::Motion).unwrap().is_empty());
        assert!(live.snapshot(Category::Lap).is_none());
    }

    #[test]
    fn selecting_a_driver_clears_history() {
        let live = LiveView::new(10).unwrap();
        live.record(&telemetry(1.0, 0, 2));
        live.record(&telemetry(1.1, 0, 2));

        live.select_driver(DriverIndex(1));
        assert!(live.snapshot(Category::CarTelemetry).unwrap().is_empty());
        assert!(live.snapshot(Category::CarTelemetry).unwrap().is_empty());

        live.record(&telemetry(1.2, 0, 2));
        let rows = live.snapshot(Category::CarTelemetry).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values[0], 200.0);
    }

    #[test]
    fn roster_skips_empty_names() {
        let live = LiveView::new(1).unwrap();
        let participant = |name: &str| Participant {
            name: name.into(),
            ai_controlled: true,
            team_id: 0,
            race_number: 1,
            nationality: 0,
        };
        live.record(&TelemetryEvent::new(
            PacketHeader::new(0.0, 0),
            Payload::Participants(ParticipantsData {
                participants: vec![participant("Verstappen\0\0"), participant(""), participant("Perez")],
            }),
        ));
        assert_eq!(
            live.roster(),
            vec![
                (DriverIndex(0), "Verstappen".to_string()),
                (DriverIndex(2), "Perez".to_string())
            ]
        );
    }

    #[test]
    fn rolling_window_follows_cursor() {
        let live = LiveView::new(100).unwrap();
        for i in 0..50 {
            live.record(&telemetry(i as f64 * 0.1, 0, 1));
        }
        let mut cursor = PlaybackCursor::new(0.1, 1.0);
        let (window, rows) = live
            .rolling_window(Category::CarTelemetry, &mut cursor)
            .unwrap();
        assert!((window.start - 0.1).abs() < 1e-9);
        assert!(rows.iter().all(|r| window.contains(r.timestamp)));
        assert!(!rows.is_empty());
        assert!(live.rolling_window(Category::Lap, &mut cursor).is_none());
    }
}
