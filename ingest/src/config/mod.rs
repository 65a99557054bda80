//! Alias dictionary: logical fields and the header spellings that map to them.
//!
//! The dictionary is loaded once at startup and then only read. It is a JSON
//! document of named sections, each an object of `logical_field → entry`:
//!
//! ```json
//! {
//!   "race":  { "track_race": ["場R", "開催場R"] },
//!   "horse": { "horse_number": ["馬番"],
//!              "horse_name": { "aliases": ["馬名"], "empty": "keep" } }
//! }
//! ```
//!
//! Alias order inside a list is the tie-break priority used by
//! [`crate::resolve::HeaderResolver`]. Section and field order is kept and
//! becomes the canonical output column order.

pub mod catalog;
pub mod venue;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, ConfigResult};
use crate::logs::log_warning;
use crate::text::{fold_key, normalize};

pub use catalog::{
    EmptyPolicy, FieldKind, HORSE_NUMBER, RACE_NUMBER_COLUMN, REQUIRED_FIELDS, TRACK_CODE_COLUMN,
    TRACK_RACE,
};
pub use venue::{Venue, VenueTable};

/// Alias set compiled into the binary, used when no file is supplied.
const BUNDLED_ALIASES: &str = include_str!("../../config/aliases.json");

/// JSON Schema (draft 7) every alias document must satisfy.
const ALIAS_SCHEMA: &str = include_str!("../../schemas/alias-config.json");

/// Where the active dictionary came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "path", rename_all = "lowercase")]
pub enum ConfigSource {
    File(PathBuf),
    Bundled,
}

/// One logical field and how to find and type it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub section: String,
    /// Normalized aliases, highest priority first.
    pub aliases: Vec<String>,
    pub kind: FieldKind,
    pub empty: EmptyPolicy,
}

impl FieldSpec {
    pub fn is_required(&self) -> bool {
        REQUIRED_FIELDS.contains(&self.name.as_str())
    }

    /// Venue-code and race-number columns emitted after a composite field.
    pub fn derived_columns(&self) -> Option<(String, String)> {
        if self.kind != FieldKind::TrackRace {
            return None;
        }
        if self.name == TRACK_RACE {
            Some((TRACK_CODE_COLUMN.to_string(), RACE_NUMBER_COLUMN.to_string()))
        } else {
            Some((format!("{}_{}", self.name, TRACK_CODE_COLUMN), format!("{}_{}", self.name, RACE_NUMBER_COLUMN)))
        }
    }
}

/// A named group of fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    List(Vec<String>),
    Detailed {
        aliases: Vec<String>,
        #[serde(default)]
        kind: Option<String>,
        #[serde(default)]
        empty: Option<EmptyPolicy>,
    },
}

/// The process-wide, read-only alias dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasConfig {
    sections: Vec<Section>,
    venues: VenueTable,
    source: ConfigSource,
}

impl AliasConfig {
    /// Load from `path`, or fall back to the bundled set with a warning.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_json_str(&content, ConfigSource::File(path.to_path_buf()))
            }
            None => {
                log_warning("No alias file supplied, falling back to the bundled minimal alias set");
                Self::bundled()
            }
        }
    }

    /// The alias set shipped with the binary.
    pub fn bundled() -> ConfigResult<Self> {
        Self::from_json_str(BUNDLED_ALIASES, ConfigSource::Bundled)
    }

    /// Parse, schema-check and normalize an alias document.
    pub fn from_json_str(content: &str, source: ConfigSource) -> ConfigResult<Self> {
        let document: Value = serde_json::from_str(content)?;
        validate_schema(&document)?;
        Self::from_document(document, source)
    }

    fn from_document(document: Value, source: ConfigSource) -> ConfigResult<Self> {
        let Value::Object(top) = document else {
            return Err(ConfigError::Schema {
                errors: vec!["top level must be an object of sections".to_string()],
            });
        };

        let mut sections = Vec::with_capacity(top.len());
        let mut owners: HashMap<String, String> = HashMap::new();

        for (section_name, section_value) in top {
            let Value::Object(entries) = section_value else {
                return Err(ConfigError::InvalidSection(section_name));
            };

            let mut fields = Vec::with_capacity(entries.len());
            for (field_name, entry) in entries {
                let spec = parse_field(&section_name, &field_name, entry)?;
                if let Some(first) = owners.insert(field_name.clone(), section_name.clone()) {
                    return Err(ConfigError::DuplicateField {
                        field: field_name,
                        first,
                        second: section_name,
                    });
                }
                fields.push(spec);
            }

            sections.push(Section {
                name: section_name,
                fields,
            });
        }

        let config = Self {
            sections,
            venues: VenueTable::jra(),
            source,
        };
        config.check_required()?;
        config.check_derived_columns()?;
        Ok(config)
    }

    fn check_required(&self) -> ConfigResult<()> {
        for required in REQUIRED_FIELDS {
            let spec = match self.field(required) {
                Some(spec) if !spec.aliases.is_empty() => spec,
                _ => return Err(ConfigError::MissingRequiredField(required.to_string())),
            };
            let expected = FieldKind::for_field(required);
            if spec.kind != expected {
                return Err(ConfigError::InvalidField {
                    section: spec.section.clone(),
                    field: spec.name.clone(),
                    message: format!("required field must have kind '{}', got '{}'", expected, spec.kind),
                });
            }
        }
        Ok(())
    }

    fn check_derived_columns(&self) -> ConfigResult<()> {
        let derived: Vec<String> = self
            .fields()
            .filter_map(|f| f.derived_columns())
            .flat_map(|(track, race)| [track, race])
            .collect();
        match self.fields().find(|f| derived.contains(&f.name)) {
            Some(spec) => Err(ConfigError::InvalidField {
                section: spec.section.clone(),
                field: spec.name.clone(),
                message: "name is reserved for a column derived from a composite identifier".to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// All fields, section by section, in document order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields().find(|f| f.name == name)
    }

    pub fn venues(&self) -> &VenueTable {
        &self.venues
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Short human summary, e.g. `2 sections, 15 fields (bundled)`.
    pub fn summary(&self) -> String {
        let origin = match &self.source {
            ConfigSource::File(path) => path.display().to_string(),
            ConfigSource::Bundled => "bundled".to_string(),
        };
        format!(
            "{} sections, {} fields ({})",
            self.sections.len(),
            self.fields().count(),
            origin
        )
    }
}

fn parse_field(section: &str, field: &str, entry: Value) -> ConfigResult<FieldSpec> {
    let invalid = |message: String| ConfigError::InvalidField {
        section: section.to_string(),
        field: field.to_string(),
        message,
    };

    let raw: RawEntry = serde_json::from_value(entry).map_err(|e| invalid(e.to_string()))?;
    let (aliases, kind, empty) = match raw {
        RawEntry::List(aliases) => (aliases, None, None),
        RawEntry::Detailed { aliases, kind, empty } => (aliases, kind, empty),
    };

    let kind = match kind {
        Some(name) => name.parse::<FieldKind>()?,
        None => FieldKind::for_field(field),
    };
    let empty = empty.unwrap_or_default();
    if empty == EmptyPolicy::Keep && !kind.allows_empty_string() {
        return Err(invalid(format!(
            "empty: keep is only valid for text and identifier fields, not {}",
            kind
        )));
    }

    Ok(FieldSpec {
        name: field.to_string(),
        section: section.to_string(),
        aliases: normalize_aliases(&aliases),
        kind,
        empty,
    })
}

/// Normalize, drop blanks, and drop later duplicates (by folded key).
fn normalize_aliases(aliases: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    let mut out = Vec::new();
    for alias in aliases {
        let normalized = normalize(alias);
        if normalized.is_empty() {
            continue;
        }
        let key = fold_key(&normalized);
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(normalized);
    }
    out
}

fn validate_schema(document: &Value) -> ConfigResult<()> {
    let schema: Value = serde_json::from_str(ALIAS_SCHEMA)?;
    let validator = jsonschema::draft7::new(&schema).map_err(|e| ConfigError::Schema {
        errors: vec![format!("embedded alias schema is invalid: {}", e)],
    })?;

    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Schema { errors })
    }
}
