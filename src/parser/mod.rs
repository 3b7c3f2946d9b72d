//! File input boundary: CSV and Excel parsing.
//!
//! CSV parsing auto-detects text encoding and delimiter, skips empty lines
//! and treats the first row as headers. Excel parsing (see [`excel`]) reads
//! the first worksheet only. A parse failure never alters session state; the
//! caller only swaps the dataset in once parsing has fully succeeded.

pub mod excel;

use serde_json::{Map, Value};
use std::path::Path;

use crate::error::{ParseError, ParseResult};
use crate::models::Dataset;

/// A parsed table plus input metadata.
#[derive(Debug, Clone)]
pub struct ParsedTable {
    /// Ordered column headers.
    pub headers: Vec<String>,
    /// Rows as JSON objects keyed by header.
    pub rows: Vec<Value>,
    /// Detected text encoding (CSV only).
    pub encoding: Option<String>,
    /// Detected delimiter (CSV only).
    pub delimiter: Option<char>,
}

impl ParsedTable {
    /// Promote to a dataset named after the source file.
    pub fn into_dataset(self, name: impl Into<String>) -> Dataset {
        Dataset::new(name, self.headers, self.rows)
    }
}

/// Parse an uploaded file by extension: `.csv`, `.xlsx` or `.xls`.
pub fn parse_upload(filename: &str, bytes: &[u8]) -> ParseResult<Dataset> {
    let lower = filename.to_lowercase();
    let table = if lower.ends_with(".csv") {
        parse_csv_bytes(bytes)?
    } else if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
        excel::parse_excel_bytes(bytes)?
    } else {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();
        return Err(ParseError::UnsupportedFormat(ext));
    };
    Ok(table.into_dataset(filename))
}

/// Read and parse a file from disk.
pub fn parse_path(path: &Path) -> ParseResult<Dataset> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    parse_upload(&name, &bytes)
}

/// Detect the encoding of raw bytes using chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let (charset, _, _) = chardet::detect(bytes);
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to a string using the detected encoding.
pub fn decode_content(bytes: &[u8], encoding: &str) -> ParseResult<String> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };
    Ok(decoded)
}

/// Detect the delimiter by counting candidates in the first line.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");
    [',', ';', '\t', '|']
        .into_iter()
        .max_by_key(|sep| first_line.matches(*sep).count())
        .unwrap_or(',')
}

/// Parse CSV bytes with encoding and delimiter auto-detection.
pub fn parse_csv_bytes(bytes: &[u8]) -> ParseResult<ParsedTable> {
    if bytes.is_empty() {
        return Err(ParseError::EmptyFile);
    }
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    let mut table = parse_csv_str(&content, delimiter)?;
    table.encoding = Some(encoding);
    Ok(table)
}

/// Parse CSV text with an explicit delimiter.
///
/// First record is the header row; fully empty lines are skipped; short rows
/// are padded with empty strings, long rows truncated to the header width.
pub fn parse_csv_str(content: &str, delimiter: char) -> ParseResult<ParsedTable> {
    if content.trim().is_empty() {
        return Err(ParseError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ParseError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(ParseError::NoHeaders);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ParseError::Csv(e.to_string()))?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let mut obj = Map::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            let field = record.get(i).map(|f| f.trim()).unwrap_or("");
            obj.insert(header.clone(), Value::String(field.to_string()));
        }
        rows.push(Value::Object(obj));
    }

    Ok(ParsedTable {
        headers,
        rows,
        encoding: None,
        delimiter: Some(delimiter),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_simple_csv() {
        let table = parse_csv_str("name,age\nAlice,30\nBob,25", ',').unwrap();
        assert_eq!(table.headers, vec!["name", "age"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0]["name"], "Alice");
        assert_eq!(table.rows[1]["age"], "25");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let table = parse_csv_str("a,b\n1,2\n\n3,4\n", ',').unwrap();
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_quoted_fields() {
        let table = parse_csv_str("name,notes\nAlice,\"likes, commas\"", ',').unwrap();
        assert_eq!(table.rows[0]["notes"], "likes, commas");
    }

    #[test]
    fn test_short_rows_padded() {
        let table = parse_csv_str("a,b,c\n1,2", ',').unwrap();
        assert_eq!(table.rows[0]["c"], "");
    }

    #[test]
    fn test_header_order_preserved() {
        let table = parse_csv_str("zeta,alpha,mid\n1,2,3", ',').unwrap();
        assert_eq!(table.headers, vec!["zeta", "alpha", "mid"]);
        let keys: Vec<&String> = table.rows[0].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
    }

    #[test]
    fn test_empty_file_error() {
        assert!(matches!(parse_csv_bytes(b""), Err(ParseError::EmptyFile)));
        assert!(matches!(parse_csv_str("  \n ", ','), Err(ParseError::EmptyFile)));
    }

    #[test]
    fn test_latin1_auto_decoding() {
        // "Société;Ville" with é in ISO-8859-1
        let mut bytes: Vec<u8> = Vec::new();
        bytes.extend(b"Soci\xe9t\xe9;Ville\nSACEM;Paris");
        let table = parse_csv_bytes(&bytes).unwrap();
        assert_eq!(table.delimiter, Some(';'));
        assert!(table.headers[0].starts_with("Soci"));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = parse_upload("data.parquet", b"x").unwrap_err();
        assert!(err.to_string().contains("parquet"));
    }

    #[test]
    fn test_parse_path_roundtrip() {
        let mut f = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(f, "id,name\n1,Ada\n2,Grace").unwrap();
        let ds = parse_path(f.path()).unwrap();
        assert_eq!(ds.headers, vec!["id", "name"]);
        assert_eq!(ds.rows.len(), 2);
        assert!(ds.name.ends_with(".csv"));
    }
}
