//! Input file loading.
//!
//! Two families are supported, chosen by extension:
//!
//! - delimited text (`.csv`, `.tsv`, `.txt`), see [`delimited`]
//! - spreadsheet containers (`.xlsx`, `.xlsm`, `.xls`, `.xlsb`, `.ods`), see [`workbook`]
//!
//! Both produce a [`RawTable`] of strings; no typing happens here.

pub mod delimited;
pub mod workbook;

use std::path::Path;

use serde::Serialize;

use crate::error::{ReadError, ReadResult};

pub use delimited::{detect_delimiter, detect_encoding, parse_bytes_auto, parse_delimited};
pub use workbook::read_workbook;

const DELIMITED_EXTENSIONS: [&str; 3] = ["csv", "tsv", "txt"];
const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// One data row: its 0-based position among the file's data rows, and its
/// cells aligned to the header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawRow {
    pub index: usize,
    pub cells: Vec<String>,
}

impl RawRow {
    /// Cell at `position`, or "" past the end.
    pub fn cell(&self, position: usize) -> &str {
        self.cells.get(position).map(String::as_str).unwrap_or("")
    }
}

/// A file's header row and data rows, all as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    /// Encoding name, or the container type for workbooks.
    pub encoding: String,
    pub delimiter: Option<char>,
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Load a file with the reader its extension selects.
pub fn load_file(path: &Path) -> ReadResult<RawTable> {
    let ext = extension(path).unwrap_or_default();
    if DELIMITED_EXTENSIONS.contains(&ext.as_str()) {
        delimited::read_delimited(path)
    } else if WORKBOOK_EXTENSIONS.contains(&ext.as_str()) {
        read_workbook(path)
    } else {
        Err(ReadError::UnsupportedExtension(ext))
    }
}

/// Whether a directory entry should be processed.
///
/// Rejects office lock files (`~$x.xlsx`, `.~lock.x.xlsx#`), dot-files,
/// editor backups and `.tmp` files, then checks the extension.
pub fn is_eligible(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with("~$") || name.starts_with('.') || name.ends_with('~') || name.ends_with('#') {
        return false;
    }
    match extension(path) {
        Some(ext) if ext == "tmp" => false,
        Some(ext) => {
            DELIMITED_EXTENSIONS.contains(&ext.as_str()) || WORKBOOK_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}
