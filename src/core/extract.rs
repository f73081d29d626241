//! Identifier column selection and normalization
//!
//! Picks exactly one column of a parsed table as the NPI column and
//! canonicalizes raw cell values to digits-only identifier strings.

use thiserror::Error;

use crate::core::tabular::Table;

/// Column names that immediately win selection (case-insensitive, trimmed)
const NPI_COLUMN_CANDIDATES: &[&str] = &["npi", "npi_id", "npi number", "npi_number"];

/// How many rows to sample when scoring columns heuristically
const DETECTION_SAMPLE_ROWS: usize = 200;

/// Canonical NPI length used for heuristic column scoring
const NPI_DIGITS: usize = 10;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The table has no data rows to select an identifier column from
    #[error("upload has no data rows, cannot identify an NPI column")]
    EmptyInput,
}

/// Canonicalize a raw cell value to a digits-only identifier.
///
/// An empty result means the row carries no usable identifier.
pub fn normalize_npi(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Select the identifier column of a table.
///
/// An exact candidate-name match wins immediately. Otherwise each column
/// is scored over the first 200 rows by how many of its values normalize
/// to exactly 10 digits; the highest score wins and ties keep the first
/// column scanned.
pub fn pick_npi_column(table: &Table) -> Result<usize, ExtractError> {
    if table.rows.is_empty() {
        return Err(ExtractError::EmptyInput);
    }

    for (idx, header) in table.headers.iter().enumerate() {
        let name = header.trim().to_lowercase();
        if NPI_COLUMN_CANDIDATES.contains(&name.as_str()) {
            return Ok(idx);
        }
    }

    let sample = table.rows.len().min(DETECTION_SAMPLE_ROWS);
    let mut best = 0;
    let mut best_score = -1i64;
    for col in 0..table.headers.len() {
        let score = (0..sample)
            .filter(|&row| normalize_npi(table.cell(row, col)).len() == NPI_DIGITS)
            .count() as i64;
        if score > best_score {
            best_score = score;
            best = col;
        }
    }

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn normalization_strips_non_digits() {
        assert_eq!(normalize_npi("123-456-7890"), "1234567890");
        assert_eq!(normalize_npi(" 1234567890 "), "1234567890");
        assert_eq!(normalize_npi("abcdef"), "");
        assert_eq!(normalize_npi(""), "");
    }

    #[test]
    fn exact_candidate_name_wins() {
        let t = table(
            &["Name", "NPI", "Score"],
            &[&["Dr. A", "1234567890", "5"]],
        );
        assert_eq!(pick_npi_column(&t).unwrap(), 1);
    }

    #[test]
    fn candidate_match_is_case_insensitive_and_trimmed() {
        let t = table(&["Name", " Npi_Number "], &[&["Dr. A", "1234567890"]]);
        assert_eq!(pick_npi_column(&t).unwrap(), 1);
    }

    #[test]
    fn heuristic_picks_column_of_ten_digit_values() {
        let t = table(
            &["Name", "ProviderId"],
            &[
                &["Dr. A", "1234567890"],
                &["Dr. B", "987-654-3210"],
                &["Dr. C", "n/a"],
            ],
        );
        assert_eq!(pick_npi_column(&t).unwrap(), 1);
    }

    #[test]
    fn ties_keep_the_first_column_scanned() {
        let t = table(
            &["left", "right"],
            &[&["1111111111", "2222222222"]],
        );
        assert_eq!(pick_npi_column(&t).unwrap(), 0);
    }

    #[test]
    fn no_rows_is_empty_input() {
        let t = table(&["npi"], &[]);
        assert!(matches!(pick_npi_column(&t), Err(ExtractError::EmptyInput)));
    }
}
