//! Header resolution: which raw column holds each logical field.
//!
//! For every logical field the resolver walks two tiers in strict order and
//! stops at the first hit:
//!
//! 1. **Exact** - a header's folded key equals a folded alias.
//! 2. **Substring** - a folded alias is a prefix of, or contained in, a
//!    header's folded key.
//!
//! Within a tier aliases are tried in priority order, and for each alias the
//! lowest header position wins. Fields are resolved independently of each
//! other, so one field's aliases never influence another field's match.

use serde::Serialize;

use crate::config::{AliasConfig, FieldSpec, Section};
use crate::text::{fold_key, trim};

// =============================================================================
// Header Index
// =============================================================================

/// One raw header with its comparison key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    /// Column position in the file.
    pub position: usize,
    /// Header as it appears in the file, trimmed but not normalized.
    pub original: String,
    /// Normalized, case-folded form.
    pub key: String,
}

/// Per-file view of the header row, built once and discarded after resolution.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    entries: Vec<HeaderEntry>,
}

impl HeaderIndex {
    pub fn new<S: AsRef<str>>(headers: &[S]) -> Self {
        let entries = headers
            .iter()
            .enumerate()
            .map(|(position, raw)| HeaderEntry {
                position,
                original: trim(raw.as_ref()).to_string(),
                key: fold_key(raw.as_ref()),
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[HeaderEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn exact(&self, key: &str) -> Option<&HeaderEntry> {
        self.entries.iter().find(|e| !e.key.is_empty() && e.key == key)
    }

    fn containing(&self, key: &str) -> Option<&HeaderEntry> {
        self.entries.iter().find(|e| e.key.contains(key))
    }
}

// =============================================================================
// Resolution Result
// =============================================================================

/// Which tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    Exact,
    Substring,
}

/// A logical field bound to a concrete column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedColumn {
    pub field: String,
    pub header: String,
    pub position: usize,
    /// Alias that matched.
    pub alias: String,
    pub tier: MatchTier,
}

/// Logical field → matched column (or none), in config field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFieldMap {
    entries: Vec<(String, Option<ResolvedColumn>)>,
}

impl ResolvedFieldMap {
    pub fn get(&self, field: &str) -> Option<&ResolvedColumn> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .and_then(|(_, column)| column.as_ref())
    }

    pub fn is_resolved(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Matched columns in field order.
    pub fn resolved(&self) -> impl Iterator<Item = &ResolvedColumn> {
        self.entries.iter().filter_map(|(_, column)| column.as_ref())
    }

    /// Field names with no matching column.
    pub fn unresolved(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, column)| column.is_none())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn extend(&mut self, other: ResolvedFieldMap) {
        self.entries.extend(other.entries);
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves logical fields against one file's headers.
#[derive(Debug, Clone, Copy)]
pub struct HeaderResolver<'a> {
    config: &'a AliasConfig,
}

impl<'a> HeaderResolver<'a> {
    pub fn new(config: &'a AliasConfig) -> Self {
        Self { config }
    }

    /// Resolve every configured field, section by section.
    pub fn resolve<S: AsRef<str>>(&self, headers: &[S]) -> ResolvedFieldMap {
        let index = HeaderIndex::new(headers);
        self.resolve_index(&index)
    }

    pub fn resolve_index(&self, index: &HeaderIndex) -> ResolvedFieldMap {
        let mut map = ResolvedFieldMap::default();
        for section in self.config.sections() {
            map.extend(resolve_section(index, section));
        }
        map
    }
}

/// Resolve the fields of one section.
pub fn resolve_section(index: &HeaderIndex, section: &Section) -> ResolvedFieldMap {
    ResolvedFieldMap {
        entries: section
            .fields
            .iter()
            .map(|spec| (spec.name.clone(), resolve_field(index, spec)))
            .collect(),
    }
}

/// Resolve one field: exact tier first, then substring tier.
pub fn resolve_field(index: &HeaderIndex, spec: &FieldSpec) -> Option<ResolvedColumn> {
    let keys: Vec<(String, &str)> = spec
        .aliases
        .iter()
        .map(|alias| (fold_key(alias), alias.as_str()))
        .filter(|(key, _)| !key.is_empty())
        .collect();

    let hit = |entry: &HeaderEntry, alias: &str, tier: MatchTier| ResolvedColumn {
        field: spec.name.clone(),
        header: entry.original.clone(),
        position: entry.position,
        alias: alias.to_string(),
        tier,
    };

    for (key, alias) in &keys {
        if let Some(entry) = index.exact(key) {
            return Some(hit(entry, alias, MatchTier::Exact));
        }
    }

    for (key, alias) in &keys {
        if let Some(entry) = index.containing(key) {
            return Some(hit(entry, alias, MatchTier::Substring));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigSource, EmptyPolicy, FieldKind};

    fn spec(name: &str, aliases: &[&str]) -> FieldSpec {
        FieldSpec {
            name: name.to_string(),
            section: "test".to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            kind: FieldKind::Text,
            empty: EmptyPolicy::Null,
        }
    }

    fn config() -> AliasConfig {
        AliasConfig::from_json_str(
            r#"{
                "race": { "track_race": ["場R", "開催"], "race_name": ["レース名"] },
                "horse": { "horse_number": ["馬番"], "popularity": ["人気"], "odds": ["単勝オッズ"] }
            }"#,
            ConfigSource::Bundled,
        )
        .unwrap()
    }

    #[test]
    fn test_exact_match_is_case_and_width_insensitive() {
        let index = HeaderIndex::new(&["ＨＯＲＳＥ_NUMBER", "name"]);
        let resolved = resolve_field(&index, &spec("horse_number", &["horse_number"])).unwrap();
        assert_eq!(resolved.position, 0);
        assert_eq!(resolved.tier, MatchTier::Exact);
        assert_eq!(resolved.header, "ＨＯＲＳＥ_NUMBER");
    }

    #[test]
    fn test_exact_tier_beats_earlier_substring() {
        // "馬番号" contains "馬番" and comes first, but the exact header wins.
        let index = HeaderIndex::new(&["馬番号", "馬番"]);
        let resolved = resolve_field(&index, &spec("horse_number", &["馬番"])).unwrap();
        assert_eq!(resolved.position, 1);
        assert_eq!(resolved.tier, MatchTier::Exact);
    }

    #[test]
    fn test_exact_match_on_lower_priority_alias_beats_substring_on_higher() {
        let index = HeaderIndex::new(&["確定着順(公式)", "着順"]);
        let resolved = resolve_field(&index, &spec("finish_position", &["確定着順", "着順"])).unwrap();
        assert_eq!(resolved.header, "着順");
        assert_eq!(resolved.tier, MatchTier::Exact);
    }

    #[test]
    fn test_substring_prefix_and_contains() {
        let index = HeaderIndex::new(&["日付", "単勝人気(前日)"]);
        let resolved = resolve_field(&index, &spec("popularity", &["人気"])).unwrap();
        assert_eq!(resolved.position, 1);
        assert_eq!(resolved.tier, MatchTier::Substring);

        let index = HeaderIndex::new(&["馬番 (出走)"]);
        let resolved = resolve_field(&index, &spec("horse_number", &["馬番"])).unwrap();
        assert_eq!(resolved.tier, MatchTier::Substring);
    }

    #[test]
    fn test_substring_alias_priority_then_header_order() {
        let index = HeaderIndex::new(&["xx_b_xx", "xx_a_xx", "yy_a_yy"]);
        let resolved = resolve_field(&index, &spec("f", &["_a_", "_b_"])).unwrap();
        assert_eq!(resolved.position, 1);
        assert_eq!(resolved.alias, "_a_");
    }

    #[test]
    fn test_unresolved_field() {
        let index = HeaderIndex::new(&["foo", "bar"]);
        assert!(resolve_field(&index, &spec("horse_number", &["馬番"])).is_none());
    }

    #[test]
    fn test_blank_headers_never_match() {
        let index = HeaderIndex::new(&["", "  "]);
        assert!(resolve_field(&index, &spec("f", &["x"])).is_none());
    }

    #[test]
    fn test_fields_resolve_independently() {
        let config = config();
        let resolver = HeaderResolver::new(&config);
        let map = resolver.resolve(&["場R", "馬番", "単勝オッズ", "単勝人気"]);

        assert_eq!(map.get("track_race").unwrap().position, 0);
        assert_eq!(map.get("horse_number").unwrap().position, 1);
        assert_eq!(map.get("odds").unwrap().position, 2);
        assert_eq!(map.get("popularity").unwrap().position, 3);
        assert_eq!(map.unresolved(), vec!["race_name"]);
        assert_eq!(map.len(), 5);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let config = config();
        let resolver = HeaderResolver::new(&config);
        let headers = ["開催日", "開催場R", "馬番", "人気"];
        let first = resolver.resolve(&headers);
        for _ in 0..10 {
            assert_eq!(resolver.resolve(&headers), first);
        }
    }

    #[test]
    fn test_resolve_single_section() {
        let config = config();
        let index = HeaderIndex::new(&["馬番"]);
        let map = resolve_section(&index, config.section("horse").unwrap());
        assert!(map.is_resolved("horse_number"));
        assert!(map.get("track_race").is_none());
        assert_eq!(map.len(), 3);
    }
}
