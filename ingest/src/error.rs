//! Error types for the racesheet batch engine.
//!
//! One enum per layer, composed bottom-up:
//!
//! - [`ConfigError`] - alias dictionary missing or malformed (fatal)
//! - [`ReadError`] - one input file unreadable or corrupt (file skipped)
//! - [`ExtractError`] - a required field never resolved in a file (file skipped)
//! - [`OutputError`] - canonical table or report could not be written
//! - [`BatchError`] - top-level failures returned to the caller
//!
//! Row-level problems are not errors: a dropped row is recorded as a
//! [`crate::diagnostics::DroppedRow`] and processing continues.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Alias Configuration Errors
// =============================================================================

/// Errors while loading the alias dictionary.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Alias file could not be read.
    #[error("Cannot read alias file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Alias file is not valid JSON.
    #[error("Alias file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Alias file does not match the alias schema.
    #[error("Alias file does not match schema: {}", errors.join("; "))]
    Schema { errors: Vec<String> },

    /// A section is not an object of fields.
    #[error("Section '{0}' must be an object of logical fields")]
    InvalidSection(String),

    /// A field entry has an unusable shape.
    #[error("Field '{field}' in section '{section}': {message}")]
    InvalidField {
        section: String,
        field: String,
        message: String,
    },

    /// Same logical field declared in two sections.
    #[error("Logical field '{field}' declared in both '{first}' and '{second}'")]
    DuplicateField {
        field: String,
        first: String,
        second: String,
    },

    /// A required key has no aliases anywhere in the dictionary.
    #[error("Required field '{0}' has no aliases configured")]
    MissingRequiredField(String),

    /// Unknown field kind name.
    #[error("Unknown field kind '{0}'")]
    UnknownKind(String),
}

// =============================================================================
// Input File Errors
// =============================================================================

/// Errors while loading one input file.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Failed to read file bytes.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited text could not be parsed.
    #[error("Invalid delimited text: {0}")]
    Csv(#[from] csv::Error),

    /// Spreadsheet container could not be opened or read.
    #[error("Invalid workbook: {0}")]
    Workbook(String),

    /// Workbook has no worksheets.
    #[error("Workbook contains no sheets")]
    NoSheets,

    /// File has no header row.
    #[error("File is empty")]
    EmptyFile,

    /// Extension not handled by any reader.
    #[error("Unsupported file extension: {0}")]
    UnsupportedExtension(String),
}

impl From<calamine::Error> for ReadError {
    fn from(err: calamine::Error) -> Self {
        ReadError::Workbook(err.to_string())
    }
}

// =============================================================================
// Extraction Errors
// =============================================================================

/// Structural problems that make a whole file unusable.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// One or more required fields matched no header in the file.
    #[error("Required field(s) not found in headers: {}", fields.join(", "))]
    UnresolvedRequired { fields: Vec<String> },
}

// =============================================================================
// Output Errors
// =============================================================================

/// Errors while writing the canonical table or the diagnostics report.
#[derive(Debug, Error)]
pub enum OutputError {
    /// IO error.
    #[error("Output IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer error.
    #[error("Output CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Report serialization error.
    #[error("Report JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Batch Errors (top-level)
// =============================================================================

/// Failures that escalate out of a batch run.
///
/// Everything else (unreadable files, unresolved headers, dropped rows)
/// is absorbed into [`crate::diagnostics::BatchDiagnostics`].
#[derive(Debug, Error)]
pub enum BatchError {
    /// Alias configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Output error.
    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    /// Input directory could not be listed.
    #[error("Cannot list input directory '{path}': {source}")]
    InputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No file produced a kept record; output was not written.
    #[error("No records kept from {files} eligible file(s); output not written")]
    NoRecords { files: usize },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for alias configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for input reading.
pub type ReadResult<T> = Result<T, ReadError>;

/// Result type for extraction.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Result type for output writing.
pub type OutputResult<T> = Result<T, OutputError>;

/// Result type for batch runs.
pub type BatchResult<T> = Result<T, BatchError>;
