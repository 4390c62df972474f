//! Lexicographically-sortable identifiers shared by every persisted entity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A 26-character ULID, used as the primary key for every row the core persists.
///
/// Sorting by id sorts by creation order, which the Lesson Engine relies on
/// as the final tie-break in recall ordering (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoreId(Ulid);

impl LoreId {
    /// Mint a fresh, time-ordered id.
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for LoreId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LoreId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

impl From<Ulid> for LoreId {
    fn from(u: Ulid) -> Self {
        Self(u)
    }
}

impl From<LoreId> for Ulid {
    fn from(id: LoreId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_from_str() {
        let id = LoreId::new();
        let parsed: LoreId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn display_is_26_characters() {
        let id = LoreId::new();
        assert_eq!(id.to_string().len(), 26);
    }

    #[test]
    fn ids_minted_in_sequence_sort_in_mint_order() {
        let a = LoreId::new();
        let b = LoreId::new();
        assert!(a <= b);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!("not-a-ulid".parse::<LoreId>().is_err());
    }
}
