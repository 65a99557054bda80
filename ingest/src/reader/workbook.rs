//! Spreadsheet containers (xlsx and friends), first worksheet only.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use super::{RawRow, RawTable};
use crate::error::{ReadError, ReadResult};

/// Read the first worksheet; row 0 is the header row.
pub fn read_workbook(path: &Path) -> ReadResult<RawTable> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook.worksheet_range_at(0).ok_or(ReadError::NoSheets)??;

    let mut rows = range.rows();
    let header = rows.next().ok_or(ReadError::EmptyFile)?;
    let headers: Vec<String> = header
        .iter()
        .map(|cell| cell_to_string(cell).trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ReadError::EmptyFile);
    }

    let mut table_rows = Vec::new();
    for (index, row) in rows.enumerate() {
        let cells: Vec<String> = (0..headers.len())
            .map(|i| row.get(i).map(cell_to_string).unwrap_or_default())
            .collect();
        table_rows.push(RawRow { index, cells });
    }

    Ok(RawTable {
        headers,
        rows: table_rows,
        encoding: "xlsx".to_string(),
        delimiter: None,
    })
}

/// Render a cell the way it reads in the sheet, without float artifacts.
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_float(*f),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Integral floats print every digit and no fraction, so an 18-digit
/// identifier stored as a number never turns into `1.2E+17`.
fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{:.0}", f)
    } else {
        f.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_rendering() {
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::String("中11".into())), "中11");
        assert_eq!(cell_to_string(&Data::Float(3.0)), "3");
        assert_eq!(cell_to_string(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_to_string(&Data::Int(7)), "7");
        assert_eq!(cell_to_string(&Data::Float(2019104308.0)), "2019104308");
    }

    #[test]
    fn test_large_integral_float_keeps_digits() {
        assert_eq!(format_float(1.2e17), "120000000000000000");
    }

    #[test]
    fn test_corrupt_workbook_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"this is not a zip archive").unwrap();
        assert!(read_workbook(&path).is_err());
    }
}
