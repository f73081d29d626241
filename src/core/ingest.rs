//! Upload ingestion pipeline
//!
//! Parse -> pick identifier column -> dedupe into entries -> persist ->
//! compute network match. Parsing and extraction failures abort the
//! ingest; match failures degrade to a zero count with a warning so the
//! upload still completes.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::extract::{self, ExtractError};
use crate::core::matcher::Matcher;
use crate::core::store::{ListMeta, NewEntry, Store, StoreError};
use crate::core::tabular::{self, ParseError, Table};

/// Maximum number of auxiliary payload keys kept per entry.
/// Truncation is deterministic: the first N keys in source column order.
pub const MAX_EXTRA_KEYS: usize = 30;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// What an ingest produced
#[derive(Debug)]
pub struct IngestOutcome {
    pub list_id: i64,
    pub n_rows: u64,
    pub n_unique: u64,
    pub n_matched: u64,
    /// Set when match computation failed and the count degraded to zero
    pub warning: Option<String>,
}

/// Deduplicate table rows into entries, first occurrence wins.
///
/// Rows whose identifier normalizes to empty are skipped (they still
/// count toward `n_rows`); later rows with an already seen identifier
/// are dropped entirely, payload included.
pub fn build_entries(table: &Table, npi_col: usize) -> (Vec<NewEntry>, u64) {
    let mut seen = std::collections::HashSet::new();
    let mut entries = Vec::new();

    for row_idx in 0..table.rows.len() {
        let npi = extract::normalize_npi(table.cell(row_idx, npi_col));
        if npi.is_empty() || !seen.insert(npi.clone()) {
            continue;
        }

        let mut extra = Map::new();
        for (col, header) in table.headers.iter().enumerate() {
            if col == npi_col {
                continue;
            }
            if extra.len() >= MAX_EXTRA_KEYS {
                break;
            }
            extra.insert(
                header.clone(),
                Value::String(table.cell(row_idx, col).to_string()),
            );
        }

        entries.push(NewEntry {
            npi,
            extra: if extra.is_empty() { None } else { Some(extra) },
        });
    }

    (entries, table.rows.len() as u64)
}

/// Ingest an uploaded roster end to end.
///
/// The list and its entries persist atomically. The match count is
/// computed afterwards; if that fails the list keeps a zero count and
/// the outcome carries a warning for the operator.
pub fn ingest(
    store: &mut Store,
    matcher: &Matcher,
    bytes: &[u8],
    filename: &str,
    mut meta: ListMeta,
) -> Result<IngestOutcome, IngestError> {
    let table = tabular::parse(bytes, filename)?;
    let npi_col = extract::pick_npi_column(&table)?;
    let (entries, n_rows) = build_entries(&table, npi_col);

    if meta.filename.is_none() {
        meta.filename = Some(filename.to_string());
    }
    let n_unique = entries.len() as u64;
    let list_id = store.create_list(&meta, n_rows, &entries)?;

    let (n_matched, warning) = match matcher.recompute(store, list_id) {
        Ok(n) => (n, None),
        Err(e) => (0, Some(format!("network match skipped: {e}"))),
    };

    Ok(IngestOutcome {
        list_id,
        n_rows,
        n_unique,
        n_matched,
        warning,
    })
}
