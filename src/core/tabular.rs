//! Tabular upload parsing
//!
//! Turns an uploaded byte stream into an ordered table of header-keyed
//! string cells. Two shapes are supported: delimited text (CSV with a
//! header row) and spreadsheet workbooks (first worksheet only, behind
//! the `xlsx` feature). All cell values are text; a blank or absent
//! cell is the empty string, never null.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    /// The upload could not be parsed as a table
    #[error("unparseable upload: {0}")]
    FormatError(String),

    /// A spreadsheet was uploaded but no workbook reader is available
    #[error("spreadsheet uploads are not supported by this build (missing `xlsx` feature)")]
    UnsupportedFormat,
}

/// A parsed upload: column headers in source order plus data rows.
///
/// Rows may be shorter than the header list (trailing blanks); use
/// [`Table::cell`] to read a value, which maps missing cells to "".
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Cell value at (row, column), empty string when absent
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Parse raw upload bytes into a [`Table`], dispatching on the filename hint.
///
/// `.xlsx`/`.xls` uploads go through the workbook reader, everything else
/// is treated as delimited text.
pub fn parse(bytes: &[u8], filename: &str) -> Result<Table, ParseError> {
    let lower = filename.to_lowercase();
    if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
        parse_workbook(bytes)
    } else {
        parse_delimited(bytes)
    }
}

/// Parse delimited text (header row + data rows, values read as text)
fn parse_delimited(bytes: &[u8]) -> Result<Table, ParseError> {
    let text = String::from_utf8_lossy(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut headers: Vec<String> = reader
        .headers()
        .map_err(|e| ParseError::FormatError(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ParseError::FormatError(e.to_string()))?;
        // Records wider than the header row get synthetic colN headers
        while record.len() > headers.len() {
            headers.push(format!("col{}", headers.len() + 1));
        }
        rows.push(record.iter().map(|v| v.to_string()).collect());
    }

    Ok(Table { headers, rows })
}

/// Parse the first worksheet of a spreadsheet workbook
#[cfg(feature = "xlsx")]
fn parse_workbook(bytes: &[u8]) -> Result<Table, ParseError> {
    use calamine::Reader;

    let cursor = std::io::Cursor::new(bytes.to_vec());
    let mut workbook = calamine::open_workbook_auto_from_rs(cursor)
        .map_err(|e| ParseError::FormatError(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ParseError::FormatError("workbook has no worksheets".to_string()))?
        .map_err(|e| ParseError::FormatError(e.to_string()))?;

    let mut cells = range.rows();
    let header_row = cells
        .next()
        .ok_or_else(|| ParseError::FormatError("workbook has no rows".to_string()))?;

    let mut headers: Vec<String> = header_row
        .iter()
        .map(|c| c.to_string().trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for row in cells {
        while row.len() > headers.len() {
            headers.push(format!("col{}", headers.len() + 1));
        }
        // calamine renders empty cells as "" via Display
        rows.push(row.iter().map(|c| c.to_string()).collect());
    }

    Ok(Table { headers, rows })
}

#[cfg(not(feature = "xlsx"))]
fn parse_workbook(_bytes: &[u8]) -> Result<Table, ParseError> {
    Err(ParseError::UnsupportedFormat)
}
