//! Driver slot identifiers and per-category driver selection.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::packet::PacketHeader;

/// Car slot within a session. Stable for the session's duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverIndex(pub u8);

impl DriverIndex {
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DriverIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for DriverIndex {
    fn from(value: u8) -> Self {
        DriverIndex(value)
    }
}

/// Which drivers a category is recorded for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverSelection {
    /// The car controlled by the local player, as named by each packet header.
    #[default]
    PlayerOnly,
    /// A fixed set of slots.
    Indexes(BTreeSet<DriverIndex>),
}

impl DriverSelection {
    /// `None` means the player-only default.
    pub fn from_indexes(indexes: Option<impl IntoIterator<Item = u8>>) -> Self {
        match indexes {
            None => DriverSelection::PlayerOnly,
            Some(indexes) => {
                DriverSelection::Indexes(indexes.into_iter().map(DriverIndex).collect())
            }
        }
    }

    /// Resolves the selection against the header of a concrete packet.
    pub fn resolve(&self, header: &PacketHeader) -> Vec<DriverIndex> {
        match self {
            DriverSelection::PlayerOnly => vec![header.player()],
            DriverSelection::Indexes(set) => set.iter().copied().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_only_follows_header() {
        let header = PacketHeader::new(0.0, 19);
        assert_eq!(
            DriverSelection::PlayerOnly.resolve(&header),
            vec![DriverIndex(19)]
        );
    }

    #[test]
    fn explicit_indexes_are_sorted_and_deduplicated() {
        let selection = DriverSelection::from_indexes(Some(vec![15u8, 3, 19, 3]));
        let header = PacketHeader::new(0.0, 0);
        assert_eq!(
            selection.resolve(&header),
            vec![DriverIndex(3), DriverIndex(15), DriverIndex(19)]
        );
    }

    #[test]
    fn none_means_player_only() {
        assert_eq!(
            DriverSelection::from_indexes(None::<Vec<u8>>),
            DriverSelection::PlayerOnly
        );
    }
}
