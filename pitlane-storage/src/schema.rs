//! ## pitlane-storage::schema
//! **Sink kinds, their fixed headers and event flattening**
//!
//! Each sink kind has one header that never changes. Flattening turns one
//! event into one row for one scope: the session, or a single driver slot.

use std::fmt;

use pitlane_core::events::{Category, DriverIndex, Payload, TelemetryEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SinkKind {
    SessionData,
    EventData,
    Motion,
    Lap,
    CarTelemetry,
    CarStatus,
    CarDamage,
    CarSetup,
    FinalClassification,
    SessionHistory,
}

impl SinkKind {
    /// Sinks created directly under the session root.
    pub const SESSION_SCOPED: [SinkKind; 2] = [SinkKind::SessionData, SinkKind::EventData];

    /// The sink a category's rows land in. Participants only shape the
    /// directory layout and have no sink.
    pub fn for_category(category: Category) -> Option<SinkKind> {
        match category {
            Category::Session => Some(SinkKind::SessionData),
            Category::Event => Some(SinkKind::EventData),
            Category::Motion => Some(SinkKind::Motion),
            Category::Lap => Some(SinkKind::Lap),
            Category::CarTelemetry => Some(SinkKind::CarTelemetry),
            Category::CarStatus => Some(SinkKind::CarStatus),
            Category::CarDamage => Some(SinkKind::CarDamage),
            Category::CarSetup => Some(SinkKind::CarSetup),
            Category::FinalClassification => Some(SinkKind::FinalClassification),
            Category::SessionHistory => Some(SinkKind::SessionHistory),
            Category::Participants => None,
        }
    }

    pub fn is_session_scoped(&self) -> bool {
        matches!(self, SinkKind::SessionData | SinkKind::EventData)
    }

    pub fn stem(&self) -> &'static str {
        match self {
            SinkKind::SessionData => "session_data",
            SinkKind::EventData => "event_data",
            SinkKind::Motion => "motion_data",
            SinkKind::Lap => "lap_data",
            SinkKind::CarTelemetry => "car_telemetry",
            SinkKind::CarStatus => "car_status",
            SinkKind::CarDamage => "car_damage",
            SinkKind::CarSetup => "car_setup",
            SinkKind::FinalClassification => "final_classification",
            SinkKind::SessionHistory => "session_history",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.csv", self.stem())
    }

    pub fn header(&self) -> &'static [&'static str] {
        match self {
            SinkKind::SessionData => &[
                "timestamp",
                "weather",
                "track_temperature",
                "air_temperature",
                "safety_car_status",
                "total_laps",
                "track_length",
            ],
            SinkKind::EventData => &["timestamp", "event_code"],
            SinkKind::Motion => &[
                "timestamp",
                "position_x",
                "position_y",
                "position_z",
                "velocity_x",
                "velocity_y",
                "velocity_z",
                "g_force_lateral",
                "g_force_longitudinal",
                "g_force_vertical",
            ],
            SinkKind::Lap => &[
                "timestamp",
                "lap_time_ms",
                "sector1_time_ms",
                "sector2_time_ms",
                "lap_invalid",
                "lap_num",
                "car_position",
            ],
            SinkKind::CarTelemetry => &[
                "timestamp",
                "speed_kmh",
                "throttle",
                "brake",
                "gear",
                "engine_rpm",
                "drs",
                "tire_temp_FL",
                "tire_temp_FR",
                "tire_temp_RL",
                "tire_temp_RR",
            ],
            SinkKind::CarStatus => &[
                "timestamp",
                "fuel_remaining_laps",
                "ers_energy",
                "drs_allowed",
                "tyre_age_laps",
            ],
            SinkKind::CarDamage => &[
                "timestamp",
                "tyre_wear_FL",
                "tyre_wear_FR",
                "tyre_wear_RL",
                "tyre_wear_RR",
                "brakes_damage_FL",
                "brakes_damage_FR",
                "brakes_damage_RL",
                "brakes_damage_RR",
                "gearbox_damage",
                "engine_damage",
            ],
            SinkKind::CarSetup => &[
                "timestamp",
                "front_wing",
                "rear_wing",
                "brake_bias",
                "front_tyre_pressure",
                "rear_tyre_pressure",
                "fuel_load",
            ],
            SinkKind::FinalClassification => &[
                "timestamp",
                "position",
                "num_laps",
                "grid_position",
                "points",
                "num_pit_stops",
                "best_lap_time_ms",
                "total_race_time",
            ],
            SinkKind::SessionHistory => &[
                "timestamp",
                "num_laps",
                "best_lap_time_lap_num",
                "last_lap_time_ms",
                "last_sector1_time_ms",
                "last_sector2_time_ms",
                "last_sector3_time_ms",
                "last_lap_valid",
            ],
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

/// One flat row, already rendered to text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<String>,
}

impl Record {
    pub fn new(timestamp: f64) -> Self {
        Self {
            fields: vec![timestamp.to_string()],
        }
    }

    pub fn field(mut self, value: impl fmt::Display) -> Self {
        self.fields.push(value.to_string());
        self
    }

    pub fn fields<T: fmt::Display>(mut self, values: impl IntoIterator<Item = T>) -> Self {
        self.fields.extend(values.into_iter().map(|v| v.to_string()));
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.fields
    }

    /// The row as one CSV line, newline included.
    pub fn to_line(&self) -> String {
        csv_line(self.fields.iter().map(String::as_str))
    }
}

pub(crate) fn csv_line<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let mut line = values.map(escape_csv).collect::<Vec<_>>().join(",");
    line.push('\n');
    line
}

fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn drs(active: bool) -> &'static str {
    if active {
        "Active"
    } else {
        "Inactive"
    }
}

/// Row for the session-wide sinks. `None` for any other category.
pub fn session_row(event: &TelemetryEvent) -> Option<(SinkKind, Record)> {
    let row = Record::new(event.timestamp());
    match &event.payload {
        Payload::Session(s) => Some((
            SinkKind::SessionData,
            row.field(s.weather)
                .field(s.track_temperature)
                .field(s.air_temperature)
                .field(s.safety_car_status)
                .field(s.total_laps)
                .field(s.track_length),
        )),
        Payload::Event(e) => Some((SinkKind::EventData, row.field(e.code.trim()))),
        _ => None,
    }
}

/// Row for one driver slot. `None` when the category is not per driver or
/// the payload carries nothing for `driver`.
pub fn driver_row(event: &TelemetryEvent, driver: DriverIndex) -> Option<(SinkKind, Record)> {
    let row = Record::new(event.timestamp());
    match &event.payload {
        Payload::Motion(cars) => cars.get(driver).map(|m| {
            let row = row
                .fields(m.world_position)
                .fields(m.world_velocity)
                .field(m.g_force_lateral)
                .field(m.g_force_longitudinal)
                .field(m.g_force_vertical);
            (SinkKind::Motion, row)
        }),
        Payload::Lap(cars) => cars.get(driver).map(|l| {
            let row = row
                .field(l.current_lap_time_ms)
                .field(l.sector1_time_ms)
                .field(l.sector2_time_ms)
                .field(l.current_lap_invalid)
                .field(l.current_lap_num)
                .field(l.car_position);
            (SinkKind::Lap, row)
        }),
        Payload::CarTelemetry(cars) => cars.get(driver).map(|t| {
            let row = row
                .field(t.speed)
                .field(t.throttle)
                .field(t.brake)
                .field(t.gear)
                .field(t.engine_rpm)
                .field(drs(t.drs))
                .fields(t.tyres_surface_temperature);
            (SinkKind::CarTelemetry, row)
        }),
        Payload::CarStatus(cars) => cars.get(driver).map(|s| {
            let row = row
                .field(s.fuel_remaining_laps)
                .field(s.ers_store_energy)
                .field(s.drs_allowed)
                .field(s.tyres_age_laps);
            (SinkKind::CarStatus, row)
        }),
        Payload::CarDamage(cars) => cars.get(driver).map(|d| {
            let row = row
                .fields(d.tyres_wear)
                .fields(d.brakes_damage)
                .field(d.gearbox_damage)
                .field(d.engine_damage);
            (SinkKind::CarDamage, row)
        }),
        Payload::CarSetup(cars) => cars.get(driver).map(|s| {
            let row = row
                .field(s.front_wing)
                .field(s.rear_wing)
                .field(s.brake_bias)
                .field(s.front_tyre_pressure)
                .field(s.rear_tyre_pressure)
                .field(s.fuel_load);
            (SinkKind::CarSetup, row)
        }),
        Payload::FinalClassification(cars) => cars.get(driver).map(|c| {
            let row = row
                .field(c.position)
                .field(c.num_laps)
                .field(c.grid_position)
                .field(c.points)
                .field(c.num_pit_stops)
                .field(c.best_lap_time_ms)
                .field(c.total_race_time);
            (SinkKind::FinalClassification, row)
        }),
        Payload::SessionHistory(h) if h.car_index == driver.0 => {
            // Unstarted laps are reported with a zero time.
            let completed: Vec<_> = h.laps.iter().filter(|l| l.lap_time_ms > 0).collect();
            let last = completed.last();
            let row = row
                .field(completed.len())
                .field(h.best_lap_time_lap_num)
                .field(last.map_or(0, |l| l.lap_time_ms))
                .field(last.map_or(0, |l| l.sector1_time_ms))
                .field(last.map_or(0, |l| l.sector2_time_ms))
                .field(last.map_or(0, |l| l.sector3_time_ms))
                .field(last.is_some_and(|l| l.valid));
            Some((SinkKind::SessionHistory, row))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitlane_core::events::*;

    fn telemetry(speed: u16, drs: bool) -> CarTelemetryData {
        CarTelemetryData {
            speed,
            throttle: 1.0,
            brake: 0.0,
            steer: 0.0,
            gear: 7,
            engine_rpm: 11000,
            drs,
            tyres_surface_temperature: [90, 91, 95, 96],
        }
    }

    #[test]
    fn every_category_but_participants_has_a_sink() {
        for category in Category::ALL {
            let kind = SinkKind::for_category(category);
            assert_eq!(kind.is_none(), category == Category::Participants);
            if let Some(kind) = kind {
                assert_eq!(kind.is_session_scoped(), category.scope() == Scope::Session);
            }
        }
    }

    #[test]
    fn telemetry_row_matches_header_width() {
        let event = TelemetryEvent::new(
            PacketHeader::new(1.5, 0),
            Payload::CarTelemetry(PerCar::new(vec![telemetry(301, true), telemetry(250, false)])),
        );
        let (kind, row) = driver_row(&event, DriverIndex(1)).unwrap();
        assert_eq!(kind, SinkKind::CarTelemetry);
        assert_eq!(row.len(), kind.header().len());
        assert_eq!(row.as_slice()[0], "1.5");
        assert_eq!(row.as_slice()[1], "250");
        assert_eq!(row.as_slice()[6], "Inactive");
        assert_eq!(&row.as_slice()[7..], &["90", "91", "95", "96"]);
    }

    #[test]
    fn missing_driver_slot_yields_nothing() {
        let event = TelemetryEvent::new(
            PacketHeader::new(1.0, 0),
            Payload::CarTelemetry(PerCar::new(vec![telemetry(100, false)])),
        );
        assert!(driver_row(&event, DriverIndex(5)).is_none());
        assert!(session_row(&event).is_none());
    }

    #[test]
    fn session_history_only_for_its_own_car() {
        let history = SessionHistoryData {
            car_index: 3,
            best_lap_time_lap_num: 1,
            laps: vec![
                LapHistory {
                    lap_time_ms: 91_000,
                    sector1_time_ms: 30_000,
                    sector2_time_ms: 31_000,
                    sector3_time_ms: 30_000,
                    valid: true,
                },
                LapHistory {
                    lap_time_ms: 0,
                    sector1_time_ms: 0,
                    sector2_time_ms: 0,
                    sector3_time_ms: 0,
                    valid: false,
                },
            ],
        };
        let event = TelemetryEvent::new(PacketHeader::new(95.0, 0), Payload::SessionHistory(history));
        assert!(driver_row(&event, DriverIndex(0)).is_none());

        let (kind, row) = driver_row(&event, DriverIndex(3)).unwrap();
        assert_eq!(row.len(), kind.header().len());
        assert_eq!(row.as_slice()[1], "1");
        assert_eq!(row.as_slice()[3], "91000");
        assert_eq!(row.as_slice()[7], "true");
    }

    #[test]
    fn event_code_is_escaped_when_needed() {
        let event = TelemetryEvent::new(
            PacketHeader::new(2.0, 0),
            Payload::Event(EventData {
                code: "a,\"b\"".into(),
            }),
        );
        let (kind, row) = session_row(&event).unwrap();
        assert_eq!(kind, SinkKind::EventData);
        assert_eq!(row.to_line(), "2,\"a,\"\"b\"\"\"\n");
    }
}
