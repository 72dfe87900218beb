//! Folder naming.
//!
//! Names are derived only from role, track id, driver name and the session
//! start time, so cleanup can recognise an incomplete folder by its name.

use std::fmt;

use chrono::{DateTime, Local};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Player,
    Ai,
}

impl Role {
    pub fn from_player_flag(is_player: bool) -> Self {
        if is_player {
            Role::Player
        } else {
            Role::Ai
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Player => "Player",
            Role::Ai => "AI",
        })
    }
}

pub fn track_label(track_id: i8) -> String {
    format!("Track_{track_id}")
}

/// `Track_{id}_{YYYY-MM-DD_HH-MM-SS}`
pub fn session_dir_name(track_id: i8, started: &DateTime<Local>) -> String {
    format!(
        "{}_{}",
        track_label(track_id),
        started.format(TIMESTAMP_FORMAT)
    )
}

/// `{Player|AI}_Track_{id}_{name}`. An empty name leaves the trailing
/// underscore, which marks the folder as incomplete.
pub fn driver_dir_name(role: Role, track_id: i8, name: &str) -> String {
    format!("{role}_{}_{}", track_label(track_id), sanitize_name(name))
}

/// Drops NUL padding and anything that would escape the session folder.
pub fn sanitize_name(raw: &str) -> String {
    raw.trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .chars()
        .filter(|c| *c != '\0' && !c.is_control())
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}
