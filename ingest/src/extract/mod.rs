//! Per-file row pipeline.
//!
//! The header row is resolved once, then every data row runs through the
//! field normalizer. Required fields decide whether a row is kept; every
//! other field fails soft to null.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{AliasConfig, EmptyPolicy, FieldSpec};
use crate::dataset::{CanonicalRecord, Provenance};
use crate::diagnostics::{DroppedRow, FileDiagnostics, FileStatus};
use crate::error::{ExtractError, ExtractResult};
use crate::logs::log_warning_indent;
use crate::normalize::{FieldNormalizer, FieldValue, Normalized};
use crate::reader::{RawRow, RawTable};
use crate::resolve::{HeaderResolver, ResolvedFieldMap};

const MISSING_REQUIRED: &str = "Missing required value";
const UNPARSEABLE_REQUIRED: &str = "Unparseable required value";

/// Records and diagnostics for one file.
#[derive(Debug, Clone)]
pub struct FileExtraction {
    pub records: Vec<CanonicalRecord>,
    pub diagnostics: FileDiagnostics,
}

/// Turns one file's raw table into canonical records.
#[derive(Debug, Clone, Copy)]
pub struct RecordExtractor<'a> {
    config: &'a AliasConfig,
    normalizer: FieldNormalizer<'a>,
}

impl<'a> RecordExtractor<'a> {
    pub fn new(config: &'a AliasConfig) -> Self {
        Self {
            config,
            normalizer: FieldNormalizer::new(config.venues()),
        }
    }

    /// Resolve the headers, then extract every row.
    ///
    /// Returns [`ExtractError::UnresolvedRequired`] when a required field
    /// has no column at all; the caller skips the file.
    pub fn extract(&self, source: &Path, table: &RawTable) -> ExtractResult<FileExtraction> {
        let map = HeaderResolver::new(self.config).resolve(&table.headers);
        self.extract_with_map(source, table, &map)
    }

    pub fn extract_with_map(
        &self,
        source: &Path,
        table: &RawTable,
        map: &ResolvedFieldMap,
    ) -> ExtractResult<FileExtraction> {
        let missing: Vec<String> = self
            .config
            .fields()
            .filter(|spec| spec.is_required() && !map.is_resolved(&spec.name))
            .map(|spec| spec.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(ExtractError::UnresolvedRequired { fields: missing });
        }

        let mut diagnostics = FileDiagnostics::new(source, FileStatus::Processed);
        diagnostics.encoding = Some(table.encoding.clone());
        diagnostics.resolved = map.resolved().cloned().collect();
        diagnostics.unresolved = map.unresolved().into_iter().map(String::from).collect();

        // Once per (file, field), not per row.
        for field in &diagnostics.unresolved {
            log_warning_indent(
                format!("{}: no column for '{}', values will be null", display_name(source), field),
                1,
            );
        }

        let mut records = Vec::new();
        for row in &table.rows {
            diagnostics.rows_read += 1;
            match self.extract_row(source, row, map, &mut diagnostics.normalization_warnings) {
                Ok(record) => records.push(record),
                Err(dropped) => diagnostics.dropped.push(dropped),
            }
        }

        diagnostics.rows_kept = records.len();
        diagnostics.non_null = count_non_null(&records);

        Ok(FileExtraction { records, diagnostics })
    }

    fn extract_row(
        &self,
        source: &Path,
        row: &RawRow,
        map: &ResolvedFieldMap,
        warnings: &mut BTreeMap<String, usize>,
    ) -> Result<CanonicalRecord, DroppedRow> {
        let mut record = CanonicalRecord::new(Provenance {
            source: source.to_path_buf(),
            row: row.index,
        });
        let mut missing = Vec::new();
        let mut unparseable = Vec::new();

        for spec in self.config.fields() {
            let Some(column) = map.get(&spec.name) else {
                set_null(&mut record, spec);
                continue;
            };

            match self.normalizer.normalize(spec, row.cell(column.position)) {
                Normalized::Value(value) => record.set(spec.name.as_str(), value),
                Normalized::TrackRace {
                    raw,
                    track_code,
                    race_number,
                } => {
                    record.set(spec.name.as_str(), FieldValue::Text(raw));
                    if let Some((track_column, race_column)) = spec.derived_columns() {
                        record.set(track_column, FieldValue::Number(f64::from(track_code)));
                        record.set(race_column, FieldValue::Number(f64::from(race_number)));
                    }
                }
                Normalized::Blank => {
                    if spec.is_required() {
                        missing.push(spec.name.clone());
                    }
                    set_blank(&mut record, spec);
                }
                Normalized::Invalid => {
                    if spec.is_required() {
                        unparseable.push(spec.name.clone());
                    } else {
                        *warnings.entry(spec.name.clone()).or_default() += 1;
                    }
                    set_null(&mut record, spec);
                }
            }
        }

        if missing.is_empty() && unparseable.is_empty() {
            return Ok(record);
        }

        let reason = if missing.is_empty() {
            UNPARSEABLE_REQUIRED
        } else {
            MISSING_REQUIRED
        };
        missing.extend(unparseable);
        Err(DroppedRow {
            row: row.index,
            reason: reason.to_string(),
            missing_fields: missing,
        })
    }
}

fn set_blank(record: &mut CanonicalRecord, spec: &FieldSpec) {
    if spec.empty == EmptyPolicy::Keep && spec.kind.allows_empty_string() {
        record.set(spec.name.as_str(), FieldValue::Text(String::new()));
    } else {
        set_null(record, spec);
    }
}

fn set_null(record: &mut CanonicalRecord, spec: &FieldSpec) {
    record.set(spec.name.as_str(), FieldValue::Null);
    if let Some((track_column, race_column)) = spec.derived_columns() {
        record.set(track_column, FieldValue::Null);
        record.set(race_column, FieldValue::Null);
    }
}

fn count_non_null(records: &[CanonicalRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        for (column, value) in &record.values {
            let count = counts.entry(column.clone()).or_insert(0);
            if !value.is_null() {
                *count += 1;
            }
        }
    }
    counts
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSource;
    use crate::logs::{drain, LogLevel, LOG_BROADCASTER};

    fn config() -> AliasConfig {
        AliasConfig::from_json_str(
            r#"{
                "race": { "track_race": ["場R"], "surface": ["芝ダ"], "race_name": { "aliases": ["レース名"], "empty": "keep" } },
                "horse": { "horse_number": ["馬番"], "horse_id": ["血統登録番号"], "odds": ["単勝"], "jockey": ["騎手"] }
            }"#,
            ConfigSource::Bundled,
        )
        .unwrap()
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .enumerate()
                .map(|(index, cells)| RawRow {
                    index,
                    cells: cells.iter().map(|c| c.to_string()).collect(),
                })
                .collect(),
            encoding: "UTF-8".into(),
            delimiter: Some(','),
        }
    }

    #[test]
    fn test_extracts_typed_values() {
        let config = config();
        let extractor = RecordExtractor::new(&config);
        let t = table(
            &["場R", "馬番", "芝ダ", "レース名", "血統登録番号", "単勝"],
            &[&["中11", "３", "芝1600", "", "2019104308123456789", "12.5"]],
        );
        let out = extractor.extract(Path::new("/in/a.csv"), &t).unwrap();
        assert_eq!(out.records.len(), 1);

        let r = &out.records[0];
        assert_eq!(r.get("track_race"), &FieldValue::Text("中11".into()));
        assert_eq!(r.get("track_code").as_number(), Some(6.0));
        assert_eq!(r.get("race_number").as_number(), Some(11.0));
        assert_eq!(r.get("horse_number").as_number(), Some(3.0));
        assert_eq!(r.get("surface"), &FieldValue::Text("Turf".into()));
        assert_eq!(r.get("race_name"), &FieldValue::Text(String::new()));
        assert_eq!(r.get("horse_id").as_text(), Some("2019104308123456789"));
        assert_eq!(r.get("odds").as_number(), Some(12.5));
        assert!(r.get("jockey").is_null());

        assert_eq!(out.diagnostics.unresolved, vec!["jockey"]);
        assert_eq!(out.diagnostics.non_null.get("jockey"), Some(&0));
        assert_eq!(out.diagnostics.non_null.get("horse_number"), Some(&1));
    }

    #[test]
    fn test_rows_missing_required_values_are_dropped() {
        let config = config();
        let extractor = RecordExtractor::new(&config);
        let t = table(
            &["場R", "馬番"],
            &[&["中11", "1"], &["中11", ""], &["", "3"], &["大11", "4"], &["阪1R", "5"]],
        );
        let out = extractor.extract(Path::new("a.csv"), &t).unwrap();

        assert_eq!(out.records.len(), 2);
        assert_eq!(out.diagnostics.rows_read, 5);
        assert_eq!(out.diagnostics.rows_kept, 2);
        assert_eq!(out.diagnostics.dropped_count(), 3);

        let dropped = &out.diagnostics.dropped;
        assert_eq!(dropped[0].row, 1);
        assert_eq!(dropped[0].reason, MISSING_REQUIRED);
        assert_eq!(dropped[0].missing_fields, vec!["horse_number"]);
        assert_eq!(dropped[1].missing_fields, vec!["track_race"]);
        assert_eq!(dropped[2].reason, UNPARSEABLE_REQUIRED);
        assert_eq!(dropped[2].missing_fields, vec!["track_race"]);
    }

    #[test]
    fn test_blank_rows_are_dropped_and_counted() {
        let config = config();
        let extractor = RecordExtractor::new(&config);
        let t = table(&["場R", "馬番"], &[&["中1", "1"], &["", ""], &[" ", "\u{3000}"]]);
        let out = extractor.extract(Path::new("a.csv"), &t).unwrap();

        assert_eq!(out.records.len(), 1);
        assert_eq!(out.diagnostics.rows_read, 3);
        assert_eq!(out.diagnostics.dropped_count(), 2);
        assert_eq!(out.diagnostics.dropped[0].reason, MISSING_REQUIRED);
        assert_eq!(out.diagnostics.dropped[0].missing_fields, vec!["track_race", "horse_number"]);
    }

    #[test]
    fn test_optional_parse_failures_are_counted() {
        let config = config();
        let extractor = RecordExtractor::new(&config);
        let t = table(
            &["場R", "馬番", "単勝", "芝ダ"],
            &[&["中1", "1", "取消", "障"], &["中1", "2", "---", "ダ"]],
        );
        let out = extractor.extract(Path::new("a.csv"), &t).unwrap();

        assert_eq!(out.records.len(), 2);
        assert!(out.records[0].get("odds").is_null());
        assert_eq!(out.diagnostics.normalization_warnings.get("odds"), Some(&2));
        assert_eq!(out.diagnostics.normalization_warnings.get("surface"), Some(&1));
    }

    #[test]
    fn test_unresolved_required_column_fails_file() {
        let config = config();
        let extractor = RecordExtractor::new(&config);
        let t = table(&["馬番", "単勝"], &[&["1", "2.0"]]);
        let err = extractor.extract(Path::new("a.csv"), &t).unwrap_err();
        let ExtractError::UnresolvedRequired { fields } = err;
        assert_eq!(fields, vec!["track_race"]);
    }

    #[test]
    fn test_unresolved_warning_logged_once_per_field() {
        let mut rx = LOG_BROADCASTER.subscribe();
        let config = config();
        let extractor = RecordExtractor::new(&config);
        let t = table(
            &["場R", "馬番"],
            &[&["中1", "1"], &["中1", "2"], &["中1", "3"]],
        );
        extractor.extract(Path::new("/in/once.csv"), &t).unwrap();

        let warnings: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| e.level == LogLevel::Warning && e.message.starts_with("once.csv: no column for 'odds'"))
            .collect();
        assert_eq!(warnings.len(), 1);
    }
}
