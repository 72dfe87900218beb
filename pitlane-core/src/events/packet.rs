//! Decoded telemetry event types.
//!
//! Events are produced by an upstream decoder and never mutated afterwards.
//! Per-car payloads are indexed by [`DriverIndex`].

use serde::{Deserialize, Serialize};

use super::category::Category;
use super::driver::DriverIndex;

/// Fields shared by every packet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PacketHeader {
    /// Session-relative timestamp in seconds. Non-decreasing within a session.
    pub session_time: f64,
    pub session_uid: u64,
    pub frame_identifier: u32,
    pub player_car_index: u8,
}

impl PacketHeader {
    pub fn new(session_time: f64, player_car_index: u8) -> Self {
        Self {
            session_time,
            session_uid: 0,
            frame_identifier: 0,
            player_car_index,
        }
    }

    pub fn player(&self) -> DriverIndex {
        DriverIndex(self.player_car_index)
    }
}

/// A single decoded telemetry event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub header: PacketHeader,
    pub payload: Payload,
}

impl TelemetryEvent {
    pub fn new(header: PacketHeader, payload: Payload) -> Self {
        Self { header, payload }
    }

    #[inline]
    pub fn category(&self) -> Category {
        self.payload.category()
    }

    #[inline]
    pub fn timestamp(&self) -> f64 {
        self.header.session_time
    }
}

/// Category-specific content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum Payload {
    Session(SessionData),
    Participants(ParticipantsData),
    Lap(PerCar<LapData>),
    CarTelemetry(PerCar<CarTelemetryData>),
    CarStatus(PerCar<CarStatusData>),
    CarDamage(PerCar<CarDamageData>),
    CarSetup(PerCar<CarSetupData>),
    Motion(PerCar<CarMotionData>),
    Event(EventData),
    FinalClassification(PerCar<FinalClassificationData>),
    SessionHistory(SessionHistoryData),
}

impl Payload {
    pub fn category(&self) -> Category {
        match self {
            Payload::Session(_) => Category::Session,
            Payload::Participants(_) => Category::Participants,
            Payload::Lap(_) => Category::Lap,
            Payload::CarTelemetry(_) => Category::CarTelemetry,
            Payload::CarStatus(_) => Category::CarStatus,
            Payload::CarDamage(_) => Category::CarDamage,
            Payload::CarSetup(_) => Category::CarSetup,
            Payload::Motion(_) => Category::Motion,
            Payload::Event(_) => Category::Event,
            Payload::FinalClassification(_) => Category::FinalClassification,
            Payload::SessionHistory(_) => Category::SessionHistory,
        }
    }
}

/// One entry per car slot, indexed by driver index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerCar<T> {
    pub cars: Vec<T>,
}

impl<T> PerCar<T> {
    pub fn new(cars: Vec<T>) -> Self {
        Self { cars }
    }

    pub fn get(&self, index: DriverIndex) -> Option<&T> {
        self.cars.get(index.as_usize())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub track_id: i8,
    pub weather: u8,
    pub track_temperature: i8,
    pub air_temperature: i8,
    pub safety_car_status: u8,
    pub total_laps: u8,
    pub track_length: u16,
    pub session_type: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub ai_controlled: bool,
    pub team_id: u8,
    pub race_number: u8,
    pub nationality: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantsData {
    pub participants: Vec<Participant>,
}

impl ParticipantsData {
    pub fn get(&self, index: DriverIndex) -> Option<&Participant> {
        self.participants.get(index.as_usize())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapData {
    pub current_lap_time_ms: u32,
    pub sector1_time_ms: u16,
    pub sector2_time_ms: u16,
    pub current_lap_invalid: bool,
    pub current_lap_num: u8,
    pub car_position: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarTelemetryData {
    pub speed: u16,
    pub throttle: f32,
    pub brake: f32,
    pub steer: f32,
    pub gear: i8,
    pub engine_rpm: u16,
    pub drs: bool,
    pub tyres_surface_temperature: [u8; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarStatusData {
    pub fuel_remaining_laps: f32,
    pub ers_store_energy: f32,
    pub drs_allowed: bool,
    pub tyres_age_laps: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarDamageData {
    pub tyres_wear: [f32; 4],
    pub brakes_damage: [u8; 4],
    pub gearbox_damage: u8,
    pub engine_damage: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarSetupData {
    pub front_wing: u8,
    pub rear_wing: u8,
    pub brake_bias: u8,
    pub front_tyre_pressure: f32,
    pub rear_tyre_pressure: f32,
    pub fuel_load: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarMotionData {
    pub world_position: [f32; 3],
    pub world_velocity: [f32; 3],
    pub g_force_lateral: f32,
    pub g_force_longitudinal: f32,
    pub g_force_vertical: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    /// Four-letter event code, e.g. `SSTA` or `FTLP`.
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalClassificationData {
    pub position: u8,
    pub num_laps: u8,
    pub grid_position: u8,
    pub points: u8,
    pub num_pit_stops: u8,
    pub best_lap_time_ms: u32,
    pub total_race_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapHistory {
    pub lap_time_ms: u32,
    pub sector1_time_ms: u16,
    pub sector2_time_ms: u16,
    pub sector3_time_ms: u16,
    pub valid: bool,
}

/// Lap history of a single car; unlike other per-car packets it names its car.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHistoryData {
    pub car_index: u8,
    pub best_lap_time_lap_num: u8,
    pub laps: Vec<LapHistory>,
}
