//! Canonical records and the batch-wide dataset.
//!
//! Output columns are the configured logical fields in document order, each
//! composite identifier followed by its two derived columns, then the
//! provenance columns `source_file` and `source_row`.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::AliasConfig;
use crate::error::OutputResult;
use crate::normalize::FieldValue;

pub const SOURCE_FILE_COLUMN: &str = "source_file";
pub const SOURCE_ROW_COLUMN: &str = "source_row";

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Where a record came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Provenance {
    pub source: PathBuf,
    /// 0-based data row index within the source file.
    pub row: usize,
}

impl Provenance {
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

/// One output row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub provenance: Provenance,
    pub values: BTreeMap<String, FieldValue>,
}

impl CanonicalRecord {
    pub fn new(provenance: Provenance) -> Self {
        Self {
            provenance,
            values: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, column: impl Into<String>, value: FieldValue) {
        self.values.insert(column.into(), value);
    }

    /// Value for `column`; missing columns read as null.
    pub fn get(&self, column: &str) -> &FieldValue {
        self.values.get(column).unwrap_or(&FieldValue::Null)
    }
}

/// Data columns for a config (no provenance columns).
pub fn canonical_columns(config: &AliasConfig) -> Vec<String> {
    let mut columns = Vec::new();
    for spec in config.fields() {
        columns.push(spec.name.clone());
        if let Some((track, race)) = spec.derived_columns() {
            columns.push(track);
            columns.push(race);
        }
    }
    columns
}

/// All kept records of a batch, ordered by (source path, row index).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<CanonicalRecord>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one file's records; order is restored by [`Dataset::finalize`].
    pub fn merge(&mut self, records: Vec<CanonicalRecord>) {
        self.records.extend(records);
    }

    /// Sort into the canonical order, independent of merge order.
    pub fn finalize(&mut self) {
        self.records
            .sort_by(|a, b| a.provenance.cmp(&b.provenance));
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Non-null count for each column, in column order.
    pub fn non_null_counts(&self, columns: &[String]) -> Vec<(String, usize)> {
        columns
            .iter()
            .map(|column| {
                let count = self
                    .records
                    .iter()
                    .filter(|r| !r.get(column).is_null())
                    .count();
                (column.clone(), count)
            })
            .collect()
    }

    /// Write the canonical table as BOM-prefixed UTF-8 CSV.
    pub fn write_csv<W: Write>(&self, mut writer: W, columns: &[String]) -> OutputResult<()> {
        writer.write_all(UTF8_BOM)?;

        let mut csv_writer = csv::Writer::from_writer(writer);
        let header = columns
            .iter()
            .map(String::as_str)
            .chain([SOURCE_FILE_COLUMN, SOURCE_ROW_COLUMN]);
        csv_writer.write_record(header)?;

        for record in &self.records {
            let mut row: Vec<String> = columns
                .iter()
                .map(|column| record.get(column).to_string())
                .collect();
            row.push(record.provenance.file_name());
            row.push(record.provenance.row.to_string());
            csv_writer.write_record(&row)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Write to `path` through a sibling temp file, so a failure never
    /// leaves a truncated table behind.
    pub fn write_csv_file(&self, path: &Path, columns: &[String]) -> OutputResult<()> {
        let tmp = temp_path(path);
        let file = fs::File::create(&tmp)?;
        let result = self
            .write_csv(std::io::BufWriter::new(file), columns)
            .and_then(|()| fs::rename(&tmp, path).map_err(Into::into));
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSource;

    fn record(source: &str, row: usize, horse: f64) -> CanonicalRecord {
        let mut r = CanonicalRecord::new(Provenance {
            source: PathBuf::from(source),
            row,
        });
        r.set("horse_number", FieldValue::Number(horse));
        r
    }

    #[test]
    fn test_finalize_orders_by_source_then_row() {
        let mut dataset = Dataset::new();
        dataset.merge(vec![record("/in/b.csv", 0, 1.0)]);
        dataset.merge(vec![record("/in/a.csv", 2, 3.0), record("/in/a.csv", 0, 1.0)]);
        dataset.finalize();

        let order: Vec<(String, usize)> = dataset
            .records()
            .iter()
            .map(|r| (r.provenance.file_name(), r.provenance.row))
            .collect();
        assert_eq!(
            order,
            vec![("a.csv".into(), 0), ("a.csv".into(), 2), ("b.csv".into(), 0)]
        );
    }

    #[test]
    fn test_canonical_columns_include_derived() {
        let config = AliasConfig::from_json_str(
            r#"{ "race": { "track_race": ["場R"] }, "horse": { "horse_number": ["馬番"], "horse_name": ["馬名"] } }"#,
            ConfigSource::Bundled,
        )
        .unwrap();
        assert_eq!(
            canonical_columns(&config),
            vec!["track_race", "track_code", "race_number", "horse_number", "horse_name"]
        );
    }

    #[test]
    fn test_write_csv_has_bom_and_provenance() {
        let mut dataset = Dataset::new();
        let mut r = record("/in/a.csv", 4, 7.0);
        r.set("horse_name", FieldValue::Text("テスト, ホース".into()));
        dataset.merge(vec![r]);
        dataset.finalize();

        let columns = vec!["horse_number".to_string(), "horse_name".to_string(), "odds".to_string()];
        let mut out = Vec::new();
        dataset.write_csv(&mut out, &columns).unwrap();

        assert!(out.starts_with(UTF8_BOM));
        let text = String::from_utf8(out[3..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("horse_number,horse_name,odds,source_file,source_row"));
        assert_eq!(lines.next(), Some("7,\"テスト, ホース\",,a.csv,4"));
    }

    #[test]
    fn test_non_null_counts() {
        let mut dataset = Dataset::new();
        let mut r = record("a.csv", 0, 1.0);
        r.set("odds", FieldValue::Null);
        dataset.merge(vec![r, record("a.csv", 1, 2.0)]);

        let counts = dataset.non_null_counts(&["horse_number".into(), "odds".into()]);
        assert_eq!(counts, vec![("horse_number".into(), 2), ("odds".into(), 0)]);
    }

    #[test]
    fn test_write_csv_file_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut dataset = Dataset::new();
        dataset.merge(vec![record("a.csv", 0, 1.0)]);

        dataset.write_csv_file(&path, &["horse_number".into()]).unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("out.csv.partial").exists());
    }
}
