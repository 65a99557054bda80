//! # Racesheet - canonical tables from heterogeneous race exports
//!
//! Racesheet ingests race and horse spreadsheet exports whose column headers
//! differ from vendor to vendor, maps each header to a stable logical field
//! through an alias dictionary, types every cell, and writes one canonical
//! table for the whole batch.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ CSV / XLSX  │────▶│   Resolve   │────▶│   Extract   │────▶│  Canonical  │
//! │ (SJIS/UTF8) │     │  (aliases)  │     │ (normalize) │     │  CSV (BOM)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use racesheet::{run_batch, AliasConfig, BatchOptions, CancelFlag};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Arc::new(AliasConfig::load(None).unwrap());
//!     let options = BatchOptions::new("exports/", "canonical.csv");
//!     let outcome = run_batch(&options, config, &CancelFlag::new()).await.unwrap();
//!     println!("{} records", outcome.dataset.len());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`logs`] - Run log broadcaster
//! - [`config`] - Alias dictionary, field kinds, venue table
//! - [`text`] - Unicode normalization helpers
//! - [`resolve`] - Header resolution
//! - [`normalize`] - Cell parsers
//! - [`reader`] - Delimited text and workbook loading
//! - [`extract`] - Per-file row pipeline
//! - [`dataset`] - Canonical records and CSV output
//! - [`diagnostics`] - Per-file and batch diagnostics
//! - [`batch`] - Directory batch runner

// Core modules
pub mod error;
pub mod logs;
pub mod text;

// Configuration
pub mod config;

// Resolution and typing
pub mod resolve;
pub mod normalize;

// Input
pub mod reader;

// Pipeline
pub mod extract;
pub mod dataset;
pub mod diagnostics;
pub mod batch;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    BatchError,
    BatchResult,
    ConfigError,
    ConfigResult,
    ExtractError,
    OutputError,
    ReadError,
    ReadResult,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{
    AliasConfig,
    ConfigSource,
    EmptyPolicy,
    FieldKind,
    FieldSpec,
    Section,
    VenueTable,
    HORSE_NUMBER,
    REQUIRED_FIELDS,
    TRACK_RACE,
};

// =============================================================================
// Re-exports - Resolution
// =============================================================================

pub use resolve::{HeaderIndex, HeaderResolver, MatchTier, ResolvedColumn, ResolvedFieldMap};

// =============================================================================
// Re-exports - Normalization
// =============================================================================

pub use normalize::{
    parse_surface,
    parse_tightness_level,
    parse_track_and_race,
    preserve_identifier_string,
    to_numeric_or_null,
    FieldNormalizer,
    FieldValue,
    PreservedIdentifier,
    Surface,
};

// =============================================================================
// Re-exports - Reading
// =============================================================================

pub use reader::{
    detect_delimiter,
    detect_encoding,
    is_eligible,
    load_file,
    parse_bytes_auto,
    RawRow,
    RawTable,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use extract::{FileExtraction, RecordExtractor};
pub use dataset::{canonical_columns, CanonicalRecord, Dataset, Provenance};
pub use diagnostics::{BatchDiagnostics, DroppedRow, FieldSummary, FileDiagnostics, FileStatus, RunReport};
pub use batch::{
    default_jobs,
    list_input_files,
    process_file,
    run_batch,
    BatchOptions,
    BatchOutcome,
    CancelFlag,
};

// =============================================================================
// Re-exports - Logs
// =============================================================================

pub use logs::{LogEntry, LogLevel, LOG_BROADCASTER};
