//! Field kinds and the built-in catalog of well-known logical fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Composite venue/race identifier; must parse on every kept row.
pub const TRACK_RACE: &str = "track_race";

/// Primary sequence number within a race; must parse on every kept row.
pub const HORSE_NUMBER: &str = "horse_number";

/// Fields a row cannot be kept without.
pub const REQUIRED_FIELDS: [&str; 2] = [TRACK_RACE, HORSE_NUMBER];

/// Output columns derived from the composite identifier.
pub const TRACK_CODE_COLUMN: &str = "track_code";
pub const RACE_NUMBER_COLUMN: &str = "race_number";

/// How a logical field's cells are typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text, kept as normalized string.
    Text,
    /// Number; anything non-numeric becomes null.
    Numeric,
    /// Identifier kept verbatim as a string (no numeric coercion).
    Identifier,
    /// Turf / dirt marker.
    Surface,
    /// Competitiveness label mapped to 0-4.
    Tightness,
    /// Composite venue + race number, e.g. `中11`.
    TrackRace,
}

impl FieldKind {
    /// Kinds whose blank cells may be kept as empty strings.
    pub fn allows_empty_string(self) -> bool {
        matches!(self, FieldKind::Text | FieldKind::Identifier)
    }

    /// Default kind for a logical field name when the config doesn't say.
    pub fn for_field(name: &str) -> FieldKind {
        match name {
            TRACK_RACE => FieldKind::TrackRace,
            HORSE_NUMBER | "frame_number" | "distance" | "weight_carried" | "horse_weight"
            | "odds" | "popularity" | "finish_position" | "age" => {
                FieldKind::Numeric
            }
            "horse_id" | "race_id" | "jockey_id" | "trainer_id" | "owner_id" => {
                FieldKind::Identifier
            }
            "surface" => FieldKind::Surface,
            "tightness" => FieldKind::Tightness,
            _ => FieldKind::Text,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Numeric => "numeric",
            FieldKind::Identifier => "identifier",
            FieldKind::Surface => "surface",
            FieldKind::Tightness => "tightness",
            FieldKind::TrackRace => "track_race",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(FieldKind::Text),
            "numeric" => Ok(FieldKind::Numeric),
            "identifier" => Ok(FieldKind::Identifier),
            "surface" => Ok(FieldKind::Surface),
            "tightness" => Ok(FieldKind::Tightness),
            "track_race" => Ok(FieldKind::TrackRace),
            other => Err(ConfigError::UnknownKind(other.to_string())),
        }
    }
}

/// What a blank cell becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyPolicy {
    /// Blank cell is null.
    #[default]
    Null,
    /// Blank cell is kept as "" (text and identifier kinds only).
    Keep,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_kinds() {
        assert_eq!(FieldKind::for_field("track_race"), FieldKind::TrackRace);
        assert_eq!(FieldKind::for_field("horse_number"), FieldKind::Numeric);
        assert_eq!(FieldKind::for_field("horse_id"), FieldKind::Identifier);
        assert_eq!(FieldKind::for_field("surface"), FieldKind::Surface);
        assert_eq!(FieldKind::for_field("anything_else"), FieldKind::Text);
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in [
            FieldKind::Text,
            FieldKind::Numeric,
            FieldKind::Identifier,
            FieldKind::Surface,
            FieldKind::Tightness,
            FieldKind::TrackRace,
        ] {
            assert_eq!(kind.as_str().parse::<FieldKind>().unwrap(), kind);
        }
        assert!("decimal".parse::<FieldKind>().is_err());
    }

    #[test]
    fn test_empty_string_allowed_only_for_text_like() {
        assert!(FieldKind::Text.allows_empty_string());
        assert!(FieldKind::Identifier.allows_empty_string());
        assert!(!FieldKind::Numeric.allows_empty_string());
        assert!(!FieldKind::TrackRace.allows_empty_string());
    }
}
