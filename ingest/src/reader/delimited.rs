//! Delimited text with encoding and delimiter auto-detection.
//!
//! Vendor exports are usually Shift_JIS; newer tools write UTF-8 (often with
//! a BOM). Anything that isn't valid UTF-8 is handed to `chardet`, and unless
//! it reports EUC-JP the file is decoded as Shift_JIS.

use std::path::Path;

use encoding_rs::{Encoding, EUC_JP, SHIFT_JIS, UTF_8};

use super::{RawRow, RawTable};
use crate::error::{ReadError, ReadResult};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Detect the encoding of raw bytes.
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    if bytes.starts_with(UTF8_BOM) || std::str::from_utf8(bytes).is_ok() {
        return UTF_8;
    }

    let charset = chardet::detect(bytes).0;
    match charset.to_lowercase().as_str() {
        "euc-jp" | "eucjp" => EUC_JP,
        _ => SHIFT_JIS,
    }
}

/// Decode bytes, dropping any BOM. Malformed sequences become U+FFFD.
pub fn decode_content(bytes: &[u8], encoding: &'static Encoding) -> (String, &'static Encoding) {
    let (text, used, _had_errors) = encoding.decode(bytes);
    (text.into_owned(), used)
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', '\t', ';', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse decoded text with an explicit delimiter.
///
/// The first record is the header row. Short rows are padded with empty
/// strings. Zero-length lines are skipped by the csv reader; a line of bare
/// delimiters is a row of empty cells.
pub fn parse_delimited(content: &str, delimiter: char) -> ReadResult<(Vec<String>, Vec<RawRow>)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record?,
        None => return Err(ReadError::EmptyFile),
    };

    let headers: Vec<String> = header.iter().map(|h| h.trim().to_string()).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ReadError::EmptyFile);
    }

    let mut rows = Vec::new();
    for (index, record) in records.enumerate() {
        let record = record?;
        let cells = (0..headers.len())
            .map(|i| record.get(i).unwrap_or("").to_string())
            .collect();
        rows.push(RawRow { index, cells });
    }

    Ok((headers, rows))
}

/// Parse bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> ReadResult<RawTable> {
    let (content, encoding) = decode_content(bytes, detect_encoding(bytes));
    let delimiter = detect_delimiter(&content);
    let (headers, rows) = parse_delimited(&content, delimiter)?;

    Ok(RawTable {
        headers,
        rows,
        encoding: encoding.name().to_string(),
        delimiter: Some(delimiter),
    })
}

/// Read and parse a delimited file.
pub fn read_delimited(path: &Path) -> ReadResult<RawTable> {
    let bytes = std::fs::read(path)?;
    parse_bytes_auto(&bytes)
}
