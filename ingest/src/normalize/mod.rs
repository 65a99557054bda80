//! Cell normalizers.
//!
//! Every function here is pure and total: bad input yields `None` (or
//! [`Surface::Unknown`]), never a panic or an error. Inputs are NFKC
//! normalized first, so full-width digits and half-width katakana behave like
//! their canonical forms.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::config::{FieldKind, FieldSpec, VenueTable};
use crate::text::{fold_key, normalize, strip_all_whitespace};

static RACE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0*([1-9][0-9]*)[Rr]?$").expect("static regex"));

// =============================================================================
// Values
// =============================================================================

/// Identifier kept as text so long digit strings never lose precision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PreservedIdentifier(String);

impl PreservedIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreservedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One canonical cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Number(f64),
    Identifier(PreservedIdentifier),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Identifier(id) => Some(id.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Identifier(id) => f.write_str(id.as_str()),
            FieldValue::Number(n) => f.write_str(&format_number(*n)),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Identifier(id) => serializer.serialize_str(id.as_str()),
            FieldValue::Number(n) => serializer.serialize_f64(*n),
        }
    }
}

/// Integral values print without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Track surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Surface {
    Turf,
    Dirt,
    Unknown,
}

impl Surface {
    pub fn as_str(self) -> &'static str {
        match self {
            Surface::Turf => "Turf",
            Surface::Dirt => "Dirt",
            Surface::Unknown => "Unknown",
        }
    }
}

// =============================================================================
// Parsers
// =============================================================================

/// Split a composite identifier like `中11` or `新 01R` into
/// (venue code, race number). The race number is every trailing digit; both
/// are `None` unless the whole pattern matches or the number is zero.
pub fn parse_track_and_race(raw: &str, venues: &VenueTable) -> (Option<u8>, Option<u32>) {
    let compact = strip_all_whitespace(&normalize(raw));
    let Some((code, rest)) = venues.split_prefix(&compact) else {
        return (None, None);
    };
    let race = RACE_NUMBER
        .captures(rest)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok());
    match race {
        Some(race) => (Some(code), Some(race)),
        None => (None, None),
    }
}

/// `芝…` → Turf; `ダ…` or `dirt…` (any case) → Dirt; else Unknown.
pub fn parse_surface(raw: &str) -> Surface {
    let text = normalize(raw);
    match text.chars().next() {
        Some('芝') => Surface::Turf,
        Some('ダ') => Surface::Dirt,
        _ if fold_key(&text).starts_with("dirt") => Surface::Dirt,
        _ => Surface::Unknown,
    }
}

/// Competitiveness label → 0 (predictable) … 4 (wide open).
pub fn parse_tightness_level(raw: &str) -> Option<u8> {
    let level = match normalize(raw).as_str() {
        "堅い" | "固い" | "かたい" | "カタイ" | "鉄板" | "テッパン" => 0,
        "やや堅い" | "やや固い" | "ややかたい" | "ヤヤカタイ" => 1,
        "普通" | "標準" | "ふつう" | "フツウ" => 2,
        "やや混戦" | "ややこんせん" | "ヤヤコンセン" => 3,
        "混戦" | "大混戦" | "こんせん" | "コンセン" | "ダイコンセン" => 4,
        _ => return None,
    };
    Some(level)
}

/// Parse a number, allowing one trailing letter marker (`12R`, `1600m`).
pub fn to_numeric_or_null(raw: &str) -> Option<f64> {
    let text = normalize(raw);
    let trimmed = match text.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => text[..text.len() - 1].trim_end(),
        _ => text.as_str(),
    };
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Keep an identifier exactly as written (normalized), never as a number.
pub fn preserve_identifier_string(raw: &str) -> Option<PreservedIdentifier> {
    let text = normalize(raw);
    if text.is_empty() {
        None
    } else {
        Some(PreservedIdentifier(text))
    }
}

// =============================================================================
// Field dispatch
// =============================================================================

/// Result of normalizing one cell for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// The cell was blank.
    Blank,
    /// Parsed value.
    Value(FieldValue),
    /// Parsed composite identifier.
    TrackRace {
        raw: String,
        track_code: u8,
        race_number: u32,
    },
    /// Non-blank cell that failed to parse.
    Invalid,
}

/// Applies the right parser for a field's kind.
#[derive(Debug, Clone, Copy)]
pub struct FieldNormalizer<'a> {
    venues: &'a VenueTable,
}

impl<'a> FieldNormalizer<'a> {
    pub fn new(venues: &'a VenueTable) -> Self {
        Self { venues }
    }

    pub fn normalize(&self, spec: &FieldSpec, raw: &str) -> Normalized {
        let text = normalize(raw);
        if text.is_empty() {
            return Normalized::Blank;
        }

        match spec.kind {
            FieldKind::Text => Normalized::Value(FieldValue::Text(text)),
            FieldKind::Identifier => match preserve_identifier_string(&text) {
                Some(id) => Normalized::Value(FieldValue::Identifier(id)),
                None => Normalized::Invalid,
            },
            FieldKind::Numeric => match to_numeric_or_null(&text) {
                Some(n) => Normalized::Value(FieldValue::Number(n)),
                None => Normalized::Invalid,
            },
            FieldKind::Surface => match parse_surface(&text) {
                Surface::Unknown => Normalized::Invalid,
                surface => Normalized::Value(FieldValue::Text(surface.as_str().to_string())),
            },
            FieldKind::Tightness => match parse_tightness_level(&text) {
                Some(level) => Normalized::Value(FieldValue::Number(f64::from(level))),
                None => Normalized::Invalid,
            },
            FieldKind::TrackRace => match parse_track_and_race(&text, self.venues) {
                (Some(track_code), Some(race_number)) => Normalized::TrackRace {
                    raw: text,
                    track_code,
                    race_number,
                },
                _ => Normalized::Invalid,
            },
        }
    }
}
