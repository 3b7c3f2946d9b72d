//! Dataset export to Excel.
//!
//! A single worksheet: the header row first, then one row per dataset row
//! with cells written as their native types where possible.

use chrono::Local;
use rust_xlsxwriter::{Workbook, Worksheet};
use serde_json::Value;
use std::path::Path;

use crate::error::{ExportError, ExportResult};
use crate::models::Dataset;

/// Build the workbook bytes for a dataset.
pub fn export_to_buffer(dataset: &Dataset) -> ExportResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    write_sheet(sheet, dataset)?;
    let bytes = workbook
        .save_to_buffer()
        .map_err(|e| ExportError::Workbook(e.to_string()))?;
    Ok(bytes)
}

/// Write a dataset to an `.xlsx` file on disk.
pub fn export_to_path(dataset: &Dataset, path: &Path) -> ExportResult<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    write_sheet(sheet, dataset)?;
    workbook
        .save(path)
        .map_err(|e| ExportError::Workbook(e.to_string()))?;
    Ok(())
}

/// `<stem>-YYYYMMDD-HHMMSS.xlsx`, for download filenames.
pub fn timestamped_filename(stem: &str) -> String {
    let stem = stem
        .trim_end_matches(".csv")
        .trim_end_matches(".xlsx")
        .trim_end_matches(".xls");
    let stem = if stem.is_empty() { "export" } else { stem };
    format!("{}-{}.xlsx", stem, Local::now().format("%Y%m%d-%H%M%S"))
}

fn write_sheet(sheet: &mut Worksheet, dataset: &Dataset) -> ExportResult<()> {
    for (col, header) in dataset.headers.iter().enumerate() {
        sheet
            .write_string(0, col as u16, header)
            .map_err(|e| ExportError::Workbook(e.to_string()))?;
    }

    for (i, row) in dataset.rows.iter().enumerate() {
        let row_num = (i + 1) as u32;
        let Some(obj) = row.as_object() else { continue };
        for (col, header) in dataset.headers.iter().enumerate() {
            let col = col as u16;
            match obj.get(header) {
                Some(Value::Number(n)) => {
                    let v = n.as_f64().unwrap_or(0.0);
                    sheet.write_number(row_num, col, v)
                }
                Some(Value::Bool(b)) => sheet.write_boolean(row_num, col, *b),
                Some(Value::String(s)) => sheet.write_string(row_num, col, s),
                Some(Value::Null) | None => sheet.write_string(row_num, col, ""),
                Some(other) => sheet.write_string(row_num, col, other.to_string()),
            }
            .map_err(|e| ExportError::Workbook(e.to_string()))?;
        }
    }
    Ok(())
}
