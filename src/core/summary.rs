//! Read-only summaries over a list's auxiliary payloads
//!
//! Produces facet counts for a fixed set of expected payload keys,
//! percentile statistics for a fixed set of numeric keys, and a bounded
//! sample of raw entries for preview. Never mutates stored data.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::store::{Store, StoreError};

/// Facet keys with their top-N display cap
pub const FACET_KEYS: &[(&str, usize)] = &[("Specialty", 8), ("Segment", 8), ("Tier", 5)];

/// Payload keys summarized as numbers
pub const NUMERIC_KEYS: &[&str] = &["ActivityScore", "Score", "Rank"];

/// Entries scanned per summary, for cost control
pub const SCAN_LIMIT: usize = 20000;

/// Raw entries returned for preview
pub const SAMPLE_LIMIT: usize = 25;

#[derive(Debug, Serialize)]
pub struct FacetSummary {
    pub key: String,
    /// (value, occurrences), most frequent first
    pub top: Vec<(String, u64)>,
}

#[derive(Debug, Serialize)]
pub struct NumericSummary {
    pub key: String,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p90: f64,
}

#[derive(Debug, Serialize)]
pub struct SampleEntry {
    pub npi: String,
    pub extra: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct ListSummary {
    pub facets: Vec<FacetSummary>,
    pub numerics: Vec<NumericSummary>,
    pub sample: Vec<SampleEntry>,
}

/// Summarize a list's entries (first `SCAN_LIMIT` read)
pub fn summarize(store: &Store, list_id: i64) -> Result<ListSummary, StoreError> {
    let rows = store.entry_payloads(list_id, SCAN_LIMIT)?;

    let mut facet_counts: Vec<std::collections::HashMap<String, u64>> =
        vec![Default::default(); FACET_KEYS.len()];
    let mut numeric_values: Vec<Vec<f64>> = vec![Vec::new(); NUMERIC_KEYS.len()];
    let mut sample = Vec::new();

    for (npi, raw) in &rows {
        let extra = raw
            .as_deref()
            .and_then(|s| serde_json::from_str::<Map<String, Value>>(s).ok());

        if let Some(extra) = &extra {
            for (i, (key, _)) in FACET_KEYS.iter().enumerate() {
                if let Some(value) = payload_text(extra, key) {
                    if !value.is_empty() {
                        *facet_counts[i].entry(value).or_insert(0) += 1;
                    }
                }
            }
            for (i, key) in NUMERIC_KEYS.iter().enumerate() {
                if let Some(value) = payload_text(extra, key) {
                    if let Ok(n) = value.trim().parse::<f64>() {
                        numeric_values[i].push(n);
                    }
                }
            }
        }

        if sample.len() < SAMPLE_LIMIT {
            sample.push(SampleEntry {
                npi: npi.clone(),
                extra,
            });
        }
    }

    let facets = FACET_KEYS
        .iter()
        .zip(facet_counts)
        .filter(|(_, counts)| !counts.is_empty())
        .map(|((key, topn), counts)| {
            let mut top: Vec<(String, u64)> = counts.into_iter().collect();
            // Count descending, then value ascending for determinism
            top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            top.truncate(*topn);
            FacetSummary {
                key: key.to_string(),
                top,
            }
        })
        .collect();

    let numerics = NUMERIC_KEYS
        .iter()
        .zip(numeric_values)
        .filter(|(_, values)| !values.is_empty())
        .map(|(key, mut values)| {
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            NumericSummary {
                key: key.to_string(),
                count: values.len(),
                min: values[0],
                max: *values.last().unwrap(),
                p50: percentile(&values, 50.0),
                p90: percentile(&values, 90.0),
            }
        })
        .collect();

    Ok(ListSummary {
        facets,
        numerics,
        sample,
    })
}

fn payload_text(extra: &Map<String, Value>, key: &str) -> Option<String> {
    extra.get(key).map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Nearest-rank percentile: index = round(p/100 * (n-1)), clamped
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    let idx = ((p / 100.0) * (n as f64 - 1.0)).round() as usize;
    sorted[idx.min(n - 1)]
}
