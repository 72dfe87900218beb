//! Packet category tags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Named kind of telemetry content with a fixed field schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Session,
    Participants,
    Lap,
    CarTelemetry,
    CarStatus,
    CarDamage,
    CarSetup,
    Motion,
    Event,
    FinalClassification,
    SessionHistory,
}

/// Where rows of a category end up on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// One sink directly under the session root.
    Session,
    /// One sink per driver sub-directory.
    Driver,
    /// No rows; the category only drives directory creation.
    Control,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Session,
        Category::Participants,
        Category::Lap,
        Category::CarTelemetry,
        Category::CarStatus,
        Category::CarDamage,
        Category::CarSetup,
        Category::Motion,
        Category::Event,
        Category::FinalClassification,
        Category::SessionHistory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Session => "session",
            Category::Participants => "participants",
            Category::Lap => "lap",
            Category::CarTelemetry => "carTelemetry",
            Category::CarStatus => "carStatus",
            Category::CarDamage => "carDamage",
            Category::CarSetup => "carSetup",
            Category::Motion => "motion",
            Category::Event => "event",
            Category::FinalClassification => "finalClassification",
            Category::SessionHistory => "sessionHistory",
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Category::Session | Category::Event => Scope::Session,
            Category::Participants => Scope::Control,
            Category::Lap
            | Category::CarTelemetry
            | Category::CarStatus
            | Category::CarDamage
            | Category::CarSetup
            | Category::Motion
            | Category::FinalClassification
            | Category::SessionHistory => Scope::Driver,
        }
    }

    /// Session and participants events describe the session layout every
    /// writer needs, so they are delivered to all category queues.
    pub fn is_control(&self) -> bool {
        matches!(self, Category::Session | Category::Participants)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CoreError::UnknownCategory(wanted.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_original_tags() {
        assert_eq!("carTelemetry".parse::<Category>(), Ok(Category::CarTelemetry));
        assert_eq!("cartelemetry".parse::<Category>(), Ok(Category::CarTelemetry));
        assert_eq!(" lap ".parse::<Category>(), Ok(Category::Lap));
    }

    #[test]
    fn rejects_unknown_tag() {
        assert_eq!(
            "lobbyInfo".parse::<Category>(),
            Err(CoreError::UnknownCategory("lobbyInfo".into()))
        );
    }

    #[test]
    fn display_round_trips_every_tag() {
        for category in Category::ALL {
            assert_eq!(category.to_string().parse::<Category>(), Ok(category));
        }
    }

    #[test]
    fn only_session_and_participants_are_control() {
        let control: Vec<_> = Category::ALL.into_iter().filter(|c| c.is_control()).collect();
        assert_eq!(control, vec![Category::Session, Category::Participants]);
    }
}
