//! Excel (.xlsx / .xls) input.
//!
//! Reads the first worksheet only; headers come from the first non-empty
//! row, mirroring the CSV boundary.

use calamine::{open_workbook_auto_from_rs, Data, Reader as _};
use serde_json::{Map, Value};
use std::io::Cursor;

use crate::error::{ParseError, ParseResult};

use super::ParsedTable;

/// Parse workbook bytes into a table.
pub fn parse_excel_bytes(bytes: &[u8]) -> ParseResult<ParsedTable> {
    if bytes.is_empty() {
        return Err(ParseError::EmptyFile);
    }

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ParseError::Excel(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ParseError::Excel("workbook has no worksheets".to_string()))?
        .map_err(|e| ParseError::Excel(e.to_string()))?;

    let mut rows_iter = range.rows();

    let header_cells = rows_iter
        .find(|r| r.iter().any(|c| !matches!(c, Data::Empty)))
        .ok_or(ParseError::NoHeaders)?;

    let headers: Vec<String> = header_cells
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let name = cell_to_string(cell);
            if name.trim().is_empty() {
                format!("column_{}", i + 1)
            } else {
                name.trim().to_string()
            }
        })
        .collect();

    let mut rows = Vec::new();
    for cells in rows_iter {
        if cells.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        let mut obj = Map::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            let value = cells.get(i).map(cell_to_value).unwrap_or(Value::Null);
            obj.insert(header.clone(), value);
        }
        rows.push(Value::Object(obj));
    }

    Ok(ParsedTable {
        headers,
        rows,
        encoding: None,
        delimiter: None,
    })
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::String(String::new()),
        Data::String(s) => Value::String(s.trim().to_string()),
        Data::Int(i) => Value::Number((*i).into()),
        Data::Float(f) => {
            // spreadsheets store integers as floats; keep them integral
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                Value::Number((*f as i64).into())
            } else {
                serde_json::Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null)
            }
        }
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => serde_json::Number::from_f64(dt.as_f64())
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(_) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn sample_workbook_bytes() -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "name").unwrap();
        sheet.write_string(0, 1, "score").unwrap();
        sheet.write_string(1, 0, "Alice").unwrap();
        sheet.write_number(1, 1, 42.0).unwrap();
        sheet.write_string(2, 0, "Bob").unwrap();
        sheet.write_number(2, 1, 3.5).unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_first_worksheet_parsed() {
        let bytes = sample_workbook_bytes();
        let table = parse_excel_bytes(&bytes).unwrap();
        assert_eq!(table.headers, vec!["name", "score"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0]["name"], "Alice");
        assert_eq!(table.rows[0]["score"], 42); // integral floats become ints
        assert_eq!(table.rows[1]["score"], 3.5);
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let err = parse_excel_bytes(b"definitely not a workbook").unwrap_err();
        assert!(matches!(err, ParseError::Excel(_)));
    }

    #[test]
    fn test_empty_bytes_rejected() {
        assert!(matches!(parse_excel_bytes(b""), Err(ParseError::EmptyFile)));
    }
}
