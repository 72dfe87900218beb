//! Synthetic race session generator.
//!
//! Produces a plausible stream for demos and soak runs: a session and
//! participants packet up front (repeated periodically, as the game does),
//! then per-tick motion, lap and car telemetry for every car, with status and
//! damage at a lower rate. Ticks are paced at the configured sample rate.

use std::collections::VecDeque;
use std::f32::consts::TAU;
use std::thread;
use std::time::{Duration, Instant};

use pitlane_core::events::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::source::{PacketSource, SourceError};

const GRID: [&str; 20] = [
    "Verstappen", "Perez", "Hamilton", "Russell", "Leclerc", "Sainz", "Norris", "Ricciardo",
    "Alonso", "Ocon", "Gasly", "Tsunoda", "Vettel", "Stroll", "Bottas", "Zhou", "Magnussen",
    "Schumacher", "Albon", "Latifi",
];
/// The game always reports 22 slots; unused ones carry an empty name.
const SLOTS: usize = 22;
const LAP_SECONDS: f32 = 90.0;

pub struct SyntheticSource {
    rng: SmallRng,
    period: Duration,
    paced: bool,
    next_due: Instant,
    tick: u64,
    tick_limit: Option<u64>,
    track_id: i8,
    player: u8,
    pending: VecDeque<TelemetryEvent>,
}

impl SyntheticSource {
    pub fn new(seed: u64, sample_rate_hz: u32, track_id: i8) -> Self {
        let rate = sample_rate_hz.max(1);
        Self {
            rng: SmallRng::seed_from_u64(seed),
            period: Duration::from_secs_f64(1.0 / rate as f64),
            paced: true,
            next_due: Instant::now(),
            tick: 0,
            tick_limit: None,
            track_id,
            player: 0,
            pending: VecDeque::new(),
        }
    }

    /// Generate ticks as fast as they are read.
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    /// Close the source after `ticks` ticks.
    pub fn with_tick_limit(mut self, ticks: u64) -> Self {
        self.tick_limit = Some(ticks);
        self
    }

    pub fn with_player(mut self, player: u8) -> Self {
        self.player = player;
        self
    }

    fn session_time(&self) -> f64 {
        self.tick as f64 * self.period.as_secs_f64()
    }

    fn ticks_per(&self, seconds: f64) -> u64 {
        ((seconds / self.period.as_secs_f64()).round() as u64).max(1)
    }

    fn generate_tick(&mut self) {
        let header = PacketHeader {
            session_time: self.session_time(),
            session_uid: 0x5EED,
            frame_identifier: self.tick as u32,
            player_car_index: self.player,
        };

        if self.tick % self.ticks_per(0.5) == 0 {
            self.pending
                .push_back(TelemetryEvent::new(header, Payload::Session(self.session())));
        }
        if self.tick % self.ticks_per(5.0) == 0 {
            self.pending.push_back(TelemetryEvent::new(
                header,
                Payload::Participants(participants(self.player)),
            ));
        }
        if self.tick == 0 {
            self.pending.push_back(TelemetryEvent::new(
                header,
                Payload::Event(EventData { code: "SSTA".into() }),
            ));
        }

        let phases: Vec<f32> = (0..GRID.len())
            .map(|car| self.lap_phase(car, header.session_time))
            .collect();

        let motion = phases.iter().map(|p| self.motion(*p)).collect();
        let telemetry = phases.iter().map(|p| self.telemetry(*p)).collect();
        let laps = phases
            .iter()
            .enumerate()
            .map(|(car, p)| lap(car, *p, header.session_time))
            .collect();
        self.pending
            .push_back(TelemetryEvent::new(header, Payload::Motion(PerCar::new(motion))));
        self.pending.push_back(TelemetryEvent::new(
            header,
            Payload::CarTelemetry(PerCar::new(telemetry)),
        ));
        self.pending
            .push_back(TelemetryEvent::new(header, Payload::Lap(PerCar::new(laps))));

        if self.tick % self.ticks_per(0.5) == 0 {
            let status = (0..GRID.len()).map(|_| self.status(header.session_time)).collect();
            let damage = (0..GRID.len()).map(|_| self.damage(header.session_time)).collect();
            self.pending.push_back(TelemetryEvent::new(
                header,
                Payload::CarStatus(PerCar::new(status)),
            ));
            self.pending.push_back(TelemetryEvent::new(
                header,
                Payload::CarDamage(PerCar::new(damage)),
            ));
        }

        self.tick += 1;
    }

    fn lap_phase(&self, car: usize, time: f64) -> f32 {
        let offset = car as f32 * 0.013;
        ((time as f32 / LAP_SECONDS) + offset).fract()
    }

    fn session(&self) -> SessionData {
        SessionData {
            track_id: self.track_id,
            weather: 0,
            track_temperature: 33,
            air_temperature: 24,
            safety_car_status: 0,
            total_laps: 5,
            track_length: 5412,
            session_type: 10,
        }
    }

    fn motion(&mut self, phase: f32) -> CarMotionData {
        let angle = phase * TAU;
        let speed = corner_speed(phase) / 3.6;
        CarMotionData {
            world_position: [angle.cos() * 800.0, 0.0, angle.sin() * 500.0],
            world_velocity: [-angle.sin() * speed, 0.0, angle.cos() * speed],
            g_force_lateral: (angle * 3.0).sin() * 3.5 + self.rng.random_range(-0.1..0.1),
            g_force_longitudinal: (angle * 3.0).cos() * 2.0,
            g_force_vertical: 1.0 + self.rng.random_range(-0.05..0.05),
        }
    }

    fn telemetry(&mut self, phase: f32) -> CarTelemetryData {
        let speed = corner_speed(phase) + self.rng.random_range(-2.0..2.0);
        let braking = (phase * TAU * 3.0).cos() < -0.7;
        let gear = ((speed / 42.0).ceil() as i8).clamp(1, 8);
        CarTelemetryData {
            speed: speed.max(0.0) as u16,
            throttle: if braking { 0.0 } else { 1.0 },
            brake: if braking { 0.9 } else { 0.0 },
            steer: (phase * TAU * 3.0).sin() * 0.4,
            gear,
            engine_rpm: 9000 + ((speed % 42.0) * 80.0) as u16,
            drs: speed > 300.0,
            tyres_surface_temperature: [
                self.rng.random_range(88..96),
                self.rng.random_range(88..96),
                self.rng.random_range(92..100),
                self.rng.random_range(92..100),
            ],
        }
    }

    fn status(&mut self, time: f64) -> CarStatusData {
        CarStatusData {
            fuel_remaining_laps: (5.0 - time as f32 / LAP_SECONDS).max(0.0),
            ers_store_energy: self.rng.random_range(1.0e6..4.0e6),
            drs_allowed: self.rng.random_bool(0.2),
            tyres_age_laps: (time as f32 / LAP_SECONDS) as u8,
        }
    }

    fn damage(&mut self, time: f64) -> CarDamageData {
        let wear = (time as f32 / LAP_SECONDS) * 1.8;
        CarDamageData {
            tyres_wear: [wear, wear, wear * 1.1, wear * 1.1],
            brakes_damage: [0; 4],
            gearbox_damage: 0,
            engine_damage: self.rng.random_range(0..2),
        }
    }
}

fn corner_speed(phase: f32) -> f32 {
    230.0 + (phase * TAU * 3.0).cos() * 90.0
}

fn lap(car: usize, phase: f32, time: f64) -> LapData {
    let lap_time_ms = (phase * LAP_SECONDS * 1000.0) as u32;
    LapData {
        current_lap_time_ms: lap_time_ms,
        sector1_time_ms: lap_time_ms.min(30_000) as u16,
        sector2_time_ms: lap_time_ms.saturating_sub(30_000).min(30_000) as u16,
        current_lap_invalid: false,
        current_lap_num: (time as f32 / LAP_SECONDS) as u8 + 1,
        car_position: car as u8 + 1,
    }
}

fn participants(player: u8) -> ParticipantsData {
    let participants = (0..SLOTS)
        .map(|slot| Participant {
            name: GRID.get(slot).copied().unwrap_or_default().to_string(),
            ai_controlled: slot != player as usize,
            team_id: (slot / 2) as u8,
            race_number: slot as u8 + 1,
            nationality: 0,
        })
        .collect();
    ParticipantsData { participants }
}

impl PacketSource for SyntheticSource {
    fn next(&mut self, timeout: Duration) -> Result<Option<TelemetryEvent>, SourceError> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }
        if self.tick_limit.is_some_and(|limit| self.tick >= limit) {
            debug!(ticks = self.tick, "synthetic session complete");
            return Err(SourceError::Fatal("synthetic session complete".into()));
        }

        if self.paced {
            let now = Instant::now();
            if self.next_due > now {
                let wait = self.next_due - now;
                if wait > timeout {
                    thread::sleep(timeout);
                    return Ok(None);
                }
                thread::sleep(wait);
            }
            self.next_due += self.period;
        }

        self.generate_tick();
        Ok(self.pending.pop_front())
    }

    fn describe(&self) -> String {
        format!("synthetic://track_{}", self.track_id)
    }
}
