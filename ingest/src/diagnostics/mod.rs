//! Per-file and batch-wide diagnostics.
//!
//! The end-of-run summary lists every output column with its non-null count
//! and the number of files that resolved it, so a field that is absent
//! everywhere (a missing or wrong alias) stands out from one that is merely
//! sparse.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::logs::{log_info, log_info_indent, log_success, log_warning, log_warning_indent};
use crate::resolve::ResolvedColumn;

// =============================================================================
// Per-file
// =============================================================================

/// A row dropped because a required value was missing or unparseable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedRow {
    /// 0-based data row index.
    pub row: usize,
    pub reason: String,
    pub missing_fields: Vec<String>,
}

/// Outcome for one input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileStatus {
    /// Rows were extracted (possibly zero kept).
    Processed,
    /// Required columns missing from the headers.
    Skipped { reason: String },
    /// The file could not be read.
    Failed { error: String },
    /// Not started because the run was cancelled.
    Cancelled,
}

/// Everything recorded about one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiagnostics {
    pub source: PathBuf,
    #[serde(flatten)]
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    pub rows_read: usize,
    pub rows_kept: usize,
    pub dropped: Vec<DroppedRow>,
    pub resolved: Vec<ResolvedColumn>,
    pub unresolved: Vec<String>,
    /// Non-null values among kept rows, per output column.
    pub non_null: BTreeMap<String, usize>,
    /// Non-blank optional cells that failed to parse, per field.
    pub normalization_warnings: BTreeMap<String, usize>,
}

impl FileDiagnostics {
    pub fn new(source: impl Into<PathBuf>, status: FileStatus) -> Self {
        Self {
            source: source.into(),
            status,
            encoding: None,
            rows_read: 0,
            rows_kept: 0,
            dropped: Vec::new(),
            resolved: Vec::new(),
            unresolved: Vec::new(),
            non_null: BTreeMap::new(),
            normalization_warnings: BTreeMap::new(),
        }
    }

    pub fn failed(source: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self::new(source, FileStatus::Failed { error: error.to_string() })
    }

    pub fn skipped(source: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::new(source, FileStatus::Skipped { reason: reason.to_string() })
    }

    pub fn cancelled(source: impl Into<PathBuf>) -> Self {
        Self::new(source, FileStatus::Cancelled)
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }

    pub fn is_processed(&self) -> bool {
        self.status == FileStatus::Processed
    }

    pub fn resolves(&self, field: &str) -> bool {
        self.resolved.iter().any(|r| r.field == field)
    }
}

// =============================================================================
// Batch-wide
// =============================================================================

/// One line of the per-field summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSummary {
    pub column: String,
    pub non_null: usize,
    /// Processed files whose headers resolved the field.
    pub files_resolved: usize,
}

/// Diagnostics for a whole run, files in path order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchDiagnostics {
    pub files: Vec<FileDiagnostics>,
    pub fields: Vec<FieldSummary>,
    pub records_kept: usize,
    pub cancelled: bool,
}

impl BatchDiagnostics {
    /// Assemble from per-file entries and the dataset's non-null counts.
    pub fn finalize(
        mut files: Vec<FileDiagnostics>,
        non_null: Vec<(String, usize)>,
        records_kept: usize,
        cancelled: bool,
    ) -> Self {
        files.sort_by(|a, b| a.source.cmp(&b.source));

        let fields = non_null
            .into_iter()
            .map(|(column, non_null)| {
                let files_resolved = files
                    .iter()
                    .filter(|f| f.is_processed() && f.resolves(field_of(&column)))
                    .count();
                FieldSummary {
                    column,
                    non_null,
                    files_resolved,
                }
            })
            .collect();

        Self {
            files,
            fields,
            records_kept,
            cancelled,
        }
    }

    pub fn file(&self, source: &Path) -> Option<&FileDiagnostics> {
        self.files.iter().find(|f| f.source == source)
    }

    pub fn field(&self, column: &str) -> Option<&FieldSummary> {
        self.fields.iter().find(|f| f.column == column)
    }

    pub fn files_processed(&self) -> usize {
        self.files.iter().filter(|f| f.is_processed()).count()
    }

    pub fn files_with_records(&self) -> usize {
        self.files.iter().filter(|f| f.rows_kept > 0).count()
    }

    pub fn rows_read(&self) -> usize {
        self.files.iter().map(|f| f.rows_read).sum()
    }

    pub fn rows_dropped(&self) -> usize {
        self.files.iter().map(|f| f.dropped_count()).sum()
    }

    /// Every dropped row with its source file.
    pub fn dropped_rows(&self) -> impl Iterator<Item = (&Path, &DroppedRow)> {
        self.files
            .iter()
            .flat_map(|f| f.dropped.iter().map(move |d| (f.source.as_path(), d)))
    }

    /// Log the end-of-run summary.
    pub fn log_summary(&self) {
        log_info(format!(
            "📊 {} file(s): {} processed, {} skipped, {} failed{}",
            self.files.len(),
            self.files_processed(),
            self.count_status(|s| matches!(s, FileStatus::Skipped { .. })),
            self.count_status(|s| matches!(s, FileStatus::Failed { .. })),
            if self.cancelled { " (cancelled)" } else { "" }
        ));
        log_info(format!(
            "Rows: {} read, {} kept, {} dropped",
            self.rows_read(),
            self.records_kept,
            self.rows_dropped()
        ));

        let processed = self.files_processed();
        let width = self.fields.iter().map(|f| f.column.len()).max().unwrap_or(0);
        log_info("Non-null values per field:");
        for field in &self.fields {
            let line = format!(
                "{:<width$} {:>8} / {}   resolved in {}/{} file(s)",
                field.column,
                field.non_null,
                self.records_kept,
                field.files_resolved,
                processed,
                width = width
            );
            if field.non_null == 0 && self.records_kept > 0 {
                log_warning_indent(format!("{}   <- no values anywhere", line), 1);
            } else {
                log_info_indent(line, 1);
            }
        }

        if self.records_kept > 0 {
            log_success(format!("{} canonical records", self.records_kept));
        } else {
            log_warning("No records kept; check the alias configuration against the input headers");
        }
    }

    fn count_status(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.status)).count()
    }
}

/// Derived columns (`track_code`, `race_number`) resolve through their
/// composite field.
fn field_of(column: &str) -> &str {
    use crate::config::{RACE_NUMBER_COLUMN, TRACK_CODE_COLUMN, TRACK_RACE};
    if column == TRACK_CODE_COLUMN || column == RACE_NUMBER_COLUMN {
        return TRACK_RACE;
    }
    for suffix in [TRACK_CODE_COLUMN, RACE_NUMBER_COLUMN] {
        if let Some(base) = column.strip_suffix(suffix).and_then(|b| b.strip_suffix('_')) {
            return base;
        }
    }
    column
}

/// Serialized form of `--report`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport<'a> {
    pub generated_at: String,
    pub alias_config: String,
    pub output: Option<&'a Path>,
    #[serde(flatten)]
    pub diagnostics: &'a BatchDiagnostics,
}

impl<'a> RunReport<'a> {
    pub fn new(diagnostics: &'a BatchDiagnostics, alias_config: String, output: Option<&'a Path>) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            alias_config,
            output,
            diagnostics,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
