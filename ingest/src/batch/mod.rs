//! Directory batch runner.
//!
//! Files are processed on a bounded pool of blocking workers. Each worker owns
//! the table it loaded; results come back over a single stream and are merged
//! in one place, then sorted, so output order never depends on which file
//! finished first.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::config::AliasConfig;
use crate::dataset::{canonical_columns, CanonicalRecord, Dataset};
use crate::diagnostics::{BatchDiagnostics, FileDiagnostics, RunReport};
use crate::error::{BatchError, BatchResult, OutputResult};
use crate::extract::{FileExtraction, RecordExtractor};
use crate::logs::{log_error, log_info, log_success, log_warning, log_warning_indent};
use crate::reader::{is_eligible, load_file};
use crate::resolve::HeaderResolver;

/// Options for one batch run
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Directory scanned (non-recursively) for input files
    pub input_dir: PathBuf,
    /// Canonical CSV destination
    pub output: PathBuf,
    /// Optional JSON diagnostics report
    pub report: Option<PathBuf>,
    /// Maximum files processed at once
    pub jobs: usize,
}

impl BatchOptions {
    pub fn new(input_dir: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output: output.into(),
            report: None,
            jobs: default_jobs(),
        }
    }
}

/// Worker count when none is given.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Cooperative cancellation, checked before each file starts.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A completed run that produced output.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub dataset: Dataset,
    pub columns: Vec<String>,
    pub diagnostics: BatchDiagnostics,
}

/// Eligible files in `dir`, sorted by path.
pub fn list_input_files(dir: &Path) -> BatchResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|source| BatchError::InputDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| BatchError::InputDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && is_eligible(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load, resolve and extract one file. Never fails: read errors and
/// structural problems come back as diagnostics.
pub fn process_file(path: &Path, config: &AliasConfig) -> (Vec<CanonicalRecord>, FileDiagnostics) {
    let name = file_label(path);

    let table = match load_file(path) {
        Ok(table) => table,
        Err(e) => {
            log_error(format!("{}: skipped, {}", name, e));
            return (Vec::new(), FileDiagnostics::failed(path, e));
        }
    };

    let map = HeaderResolver::new(config).resolve(&table.headers);
    match RecordExtractor::new(config).extract_with_map(path, &table, &map) {
        Ok(FileExtraction { records, diagnostics }) => {
            if diagnostics.dropped_count() > 0 {
                log_warning(format!(
                    "{}: {} kept, {} dropped ({})",
                    name,
                    diagnostics.rows_kept,
                    diagnostics.dropped_count(),
                    table.encoding
                ));
                for dropped in diagnostics.dropped.iter().take(5) {
                    log_warning_indent(
                        format!("row {}: {} [{}]", dropped.row, dropped.reason, dropped.missing_fields.join(", ")),
                        1,
                    );
                }
            } else {
                log_success(format!("{}: {} rows ({})", name, diagnostics.rows_kept, table.encoding));
            }
            (records, diagnostics)
        }
        Err(e) => {
            log_warning(format!("{}: skipped, {}", name, e));
            let mut diagnostics = FileDiagnostics::skipped(path, &e);
            diagnostics.encoding = Some(table.encoding.clone());
            diagnostics.resolved = map.resolved().cloned().collect();
            diagnostics.unresolved = map.unresolved().into_iter().map(String::from).collect();
            (Vec::new(), diagnostics)
        }
    }
}

/// Run the batch described by `options`.
///
/// Returns [`BatchError::NoRecords`] without touching the output path when no
/// file kept a single row.
pub async fn run_batch(
    options: &BatchOptions,
    config: Arc<AliasConfig>,
    cancel: &CancelFlag,
) -> BatchResult<BatchOutcome> {
    let files = list_input_files(&options.input_dir)?;
    let file_count = files.len();
    log_info(format!(
        "📂 {} eligible file(s) in {} ({} worker(s))",
        file_count,
        options.input_dir.display(),
        options.jobs.max(1)
    ));

    let results: Vec<(Vec<CanonicalRecord>, FileDiagnostics)> = stream::iter(files)
        .map(|path| {
            let config = Arc::clone(&config);
            let cancel = cancel.clone();
            async move {
                // Let a pending interrupt land before the next file starts.
                tokio::task::yield_now().await;
                if cancel.is_cancelled() {
                    return (Vec::new(), FileDiagnostics::cancelled(path));
                }
                let worker_path = path.clone();
                match tokio::task::spawn_blocking(move || process_file(&worker_path, &config)).await {
                    Ok(result) => result,
                    Err(e) => {
                        log_error(format!("{}: worker failed, {}", file_label(&path), e));
                        (Vec::new(), FileDiagnostics::failed(path, e))
                    }
                }
            }
        })
        .buffer_unordered(options.jobs.max(1))
        .collect()
        .await;

    let mut dataset = Dataset::new();
    let mut file_diagnostics = Vec::with_capacity(results.len());
    for (records, diagnostics) in results {
        dataset.merge(records);
        file_diagnostics.push(diagnostics);
    }
    dataset.finalize();

    let columns = canonical_columns(&config);
    let diagnostics = BatchDiagnostics::finalize(
        file_diagnostics,
        dataset.non_null_counts(&columns),
        dataset.len(),
        cancel.is_cancelled(),
    );
    diagnostics.log_summary();

    if let Some(report) = &options.report {
        let written = (!dataset.is_empty()).then_some(options.output.as_path());
        write_report(report, &diagnostics, &config, written)?;
    }

    if dataset.is_empty() {
        return Err(BatchError::NoRecords { files: file_count });
    }

    dataset.write_csv_file(&options.output, &columns)?;
    log_success(format!("💾 Output written to: {}", options.output.display()));

    Ok(BatchOutcome {
        dataset,
        columns,
        diagnostics,
    })
}

fn write_report(
    path: &Path,
    diagnostics: &BatchDiagnostics,
    config: &AliasConfig,
    output: Option<&Path>,
) -> OutputResult<()> {
    let json = RunReport::new(diagnostics, config.summary(), output).to_json()?;
    fs::write(path, json)?;
    log_info(format!("Report written to: {}", path.display()));
    Ok(())
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::FileStatus;
    use crate::logs::{LogLevel, LOG_BROADCASTER};

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn config() -> Arc<AliasConfig> {
        Arc::new(AliasConfig::bundled().unwrap())
    }

    #[test]
    fn test_list_input_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.csv", "x");
        write(dir.path(), "a.xlsx", "x");
        write(dir.path(), "~$a.xlsx", "x");
        write(dir.path(), "notes.md", "x");
        fs::create_dir(dir.path().join("sub.csv")).unwrap();

        let files = list_input_files(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|p| file_label(p)).collect();
        assert_eq!(names, vec!["a.xlsx", "b.csv"]);
    }

    #[test]
    fn test_list_input_files_missing_dir() {
        let err = list_input_files(Path::new("/nonexistent/racesheet/in")).unwrap_err();
        assert!(matches!(err, BatchError::InputDir { .. }));
    }

    #[test]
    fn test_process_file_skips_structural_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.csv", "馬番,馬名\n1,テスト\n");
        let (records, diag) = process_file(&path, &config());
        assert!(records.is_empty());
        assert!(matches!(diag.status, FileStatus::Skipped { .. }));
        assert!(diag.unresolved.contains(&"track_race".to_string()));
        assert!(diag.resolves("horse_number"));
    }

    #[test]
    fn test_process_file_reports_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "broken.xlsx", "not a zip archive");
        let (records, diag) = process_file(&path, &config());
        assert!(records.is_empty());
        assert!(matches!(diag.status, FileStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn test_run_batch_writes_sorted_output() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write(input.path(), "b.csv", "場R,馬番\n阪1,2\n阪1,1\n");
        write(input.path(), "a.csv", "場R,馬番\n中11,5\n");

        let mut options = BatchOptions::new(input.path(), out.path().join("out.csv"));
        options.jobs = 4;
        options.report = Some(out.path().join("report.json"));
        let outcome = run_batch(&options, config(), &CancelFlag::new()).await.unwrap();

        assert_eq!(outcome.dataset.len(), 3);
        let rows: Vec<_> = outcome
            .dataset
            .records()
            .iter()
            .map(|r| (r.provenance.file_name(), r.provenance.row))
            .collect();
        assert_eq!(rows, vec![("a.csv".into(), 0), ("b.csv".into(), 0), ("b.csv".into(), 1)]);
        assert!(options.output.exists());
        assert!(out.path().join("report.json").exists());
        assert!(!outcome.diagnostics.cancelled);
    }

    #[tokio::test]
    async fn test_cancel_between_files_keeps_finished_work() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write(input.path(), "first_of_two.csv", "場R,馬番\n中11,5\n中11,6\n");
        write(input.path(), "second_of_two.csv", "場R,馬番\n阪1,1\n");

        let cancel = CancelFlag::new();
        let trigger = cancel.clone();
        let mut rx = LOG_BROADCASTER.subscribe();
        let listener = tokio::spawn(async move {
            while let Ok(entry) = rx.recv().await {
                if entry.level == LogLevel::Success && entry.message.starts_with("first_of_two.csv:") {
                    trigger.cancel();
                    break;
                }
            }
        });

        let mut options = BatchOptions::new(input.path(), out.path().join("out.csv"));
        options.jobs = 1;
        let outcome = run_batch(&options, config(), &cancel).await.unwrap();
        listener.await.unwrap();

        assert!(outcome.diagnostics.cancelled);
        assert_eq!(outcome.dataset.len(), 2);
        assert!(outcome
            .dataset
            .records()
            .iter()
            .all(|r| r.provenance.file_name() == "first_of_two.csv"));

        let second = outcome
            .diagnostics
            .file(&input.path().join("second_of_two.csv"))
            .unwrap();
        assert_eq!(second.status, FileStatus::Cancelled);

        let text = fs::read_to_string(&options.output).unwrap();
        assert!(text.contains("first_of_two.csv"));
        assert!(!text.contains("second_of_two.csv"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write(input.path(), "a.csv", "場R,馬番\n中11,5\n");

        let cancel = CancelFlag::new();
        cancel.cancel();
        let options = BatchOptions::new(input.path(), out.path().join("out.csv"));
        let err = run_batch(&options, config(), &cancel).await.unwrap_err();

        assert!(matches!(err, BatchError::NoRecords { files: 1 }));
        assert!(!options.output.exists());
    }
}
