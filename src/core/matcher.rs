//! Match engine: how much of a list is in the network
//!
//! Computes `n_matched_network` for a target list, either as a local SQL
//! intersection against the mirror (snapshot strategies) or by streaming
//! the authoritative source and testing membership in memory (live).
//!
//! Errors are returned, never swallowed; callers decide whether to
//! degrade to zero (ingest, detail views) or surface the failure
//! (explicit match recomputation).

use std::collections::HashSet;

use crate::core::config::{CacheStrategy, Config};
use crate::core::network::{NetworkError, NetworkSource, PgNetworkSource, LIVE_FETCH_ROWS};
use crate::core::store::Store;

/// Match engine, constructed once from immutable configuration
pub struct Matcher {
    strategy: CacheStrategy,
    source: SourceSpec,
}

/// The configured warehouse coordinates, if any
struct SourceSpec {
    network_url: Option<String>,
    network_npi_sql: Option<String>,
}

impl Matcher {
    pub fn new(config: &Config) -> Self {
        Self {
            strategy: config.cache_strategy,
            source: SourceSpec {
                network_url: config.network_url.clone(),
                network_npi_sql: config.network_npi_sql.clone(),
            },
        }
    }

    /// Compute the match count for a list without persisting it.
    ///
    /// Idempotent: the same list and network state yield the same count.
    pub fn compute(&self, store: &Store, list_id: i64) -> Result<u64, NetworkError> {
        if self.strategy.uses_mirror() {
            store.ensure_network_table()?;
            return Ok(store.cached_match_count(list_id)?);
        }

        // Live: intersect the in-memory list set with the streamed source
        let npis = store.list_npis(list_id)?;
        if npis.is_empty() {
            // Nothing to match; don't touch the warehouse
            return Ok(0);
        }

        let (url, fragment) = match (
            self.source.network_url.as_deref(),
            self.source.network_npi_sql.as_deref(),
        ) {
            (Some(url), Some(fragment)) => (url, fragment),
            _ => return Err(NetworkError::SourceNotConfigured),
        };
        let mut source = PgNetworkSource::live(url, fragment)?;
        live_match(&mut source, &npis)
    }

    /// Compute and persist the match count for a list
    pub fn recompute(&self, store: &Store, list_id: i64) -> Result<u64, NetworkError> {
        let matched = self.compute(store, list_id)?;
        store.set_match_count(list_id, matched)?;
        Ok(matched)
    }
}

/// Stream the authoritative set and count membership hits.
///
/// The source is fetched in bounded chunks; only the list's own
/// identifier set is held in memory.
pub fn live_match(
    source: &mut dyn NetworkSource,
    npis: &HashSet<String>,
) -> Result<u64, NetworkError> {
    let mut matched = 0u64;
    source.for_each_npi(LIVE_FETCH_ROWS, &mut |raw| {
        if npis.contains(raw.trim()) {
            matched += 1;
        }
        true
    })?;
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::network::tests::MockSource;
    use crate::core::network::NetworkCache;
    use crate::core::store::{ListMeta, NewEntry};

    fn store_with_list(npis: &[&str]) -> (Store, i64) {
        let mut store = Store::open_in_memory().unwrap();
        let entries: Vec<NewEntry> = npis
            .iter()
            .map(|n| NewEntry {
                npi: n.to_string(),
                extra: None,
            })
            .collect();
        let meta = ListMeta {
            name: "test".to_string(),
            ..Default::default()
        };
        let id = store
            .create_list(&meta, npis.len() as u64, &entries)
            .unwrap();
        (store, id)
    }

    #[test]
    fn live_match_counts_membership_hits() {
        let npis: HashSet<String> = ["1111111111", "2222222222"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut source = MockSource::new(&["1111111111", "9999999999", " 2222222222 "]);
        assert_eq!(live_match(&mut source, &npis).unwrap(), 2);
        assert_eq!(source.chunk_sizes_seen, vec![LIVE_FETCH_ROWS]);
    }

    #[test]
    fn live_match_propagates_source_faults() {
        let npis: HashSet<String> = ["1111111111".to_string()].into_iter().collect();
        let mut source = MockSource::new(&["1111111111"]);
        source.fail_after_chunks = Some(0);
        assert!(matches!(
            live_match(&mut source, &npis),
            Err(NetworkError::SourceUnavailable(_))
        ));
    }

    #[test]
    fn fault_after_first_chunk_discards_partial_progress() {
        let npis: HashSet<String> = ["1111111111", "2222222222"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        // Two-identifier chunks: the first streams fully, the second faults
        let mut source = MockSource::new(&["1111111111", "2222222222", "3333333333"]);
        source.chunk_len = Some(2);
        source.fail_after_chunks = Some(1);

        let result = live_match(&mut source, &npis);
        assert!(matches!(&result, Err(NetworkError::SourceUnavailable(_))));
        // Both hits streamed before the fault; the count is still discarded
        assert_eq!(source.delivered, 2);
        assert_eq!(result.unwrap_or(0), 0);
    }

    #[test]
    fn empty_list_short_circuits_without_a_source() {
        // No warehouse is configured; a non-empty list would fail with
        // SourceNotConfigured, so zero proves the short-circuit.
        let (store, id) = store_with_list(&[]);
        let matcher = Matcher::new(&Config::default());
        assert_eq!(matcher.compute(&store, id).unwrap(), 0);
    }

    #[test]
    fn live_without_source_is_not_configured() {
        let (store, id) = store_with_list(&["1111111111"]);
        let matcher = Matcher::new(&Config::default());
        assert!(matches!(
            matcher.compute(&store, id),
            Err(NetworkError::SourceNotConfigured)
        ));
    }

    #[test]
    fn cached_match_equals_live_match_for_same_network() {
        let network = ["1111111111"];
        let list = ["1111111111", "2222222222"];

        // Live mode
        let npis: HashSet<String> = list.iter().map(|s| s.to_string()).collect();
        let mut source = MockSource::new(&network);
        let live = live_match(&mut source, &npis).unwrap();

        // Cache mode over the same network set
        let (mut store, id) = store_with_list(&list);
        let cache = NetworkCache::new(CacheStrategy::Manual, None);
        let mut source = MockSource::new(&network);
        cache.refresh(&mut store, &mut source).unwrap();
        let config = Config {
            cache_strategy: CacheStrategy::Manual,
            ..Config::default()
        };
        let cached = Matcher::new(&config).compute(&store, id).unwrap();

        assert_eq!(live, 1);
        assert_eq!(cached, live);
    }

    #[test]
    fn recompute_persists_the_count_idempotently() {
        let (mut store, id) = store_with_list(&["1111111111", "2222222222"]);
        let cache = NetworkCache::new(CacheStrategy::Manual, None);
        let mut source = MockSource::new(&["1111111111"]);
        cache.refresh(&mut store, &mut source).unwrap();

        let config = Config {
            cache_strategy: CacheStrategy::Manual,
            ..Config::default()
        };
        let matcher = Matcher::new(&config);
        assert_eq!(matcher.recompute(&store, id).unwrap(), 1);
        assert_eq!(matcher.recompute(&store, id).unwrap(), 1);
        assert_eq!(store.get_list(id).unwrap().unwrap().n_matched_network, 1);
    }
}
