//! Authoritative network source and local mirror management
//!
//! The authoritative network is a warehouse reached over a configured
//! read-only connection plus a query fragment that yields a single
//! identifier column named `npi`. This module owns the seam to that
//! warehouse ([`NetworkSource`]) and the snapshot refresh procedure that
//! mirrors it into the local `network_npis` table.

use chrono::Utc;
use rusqlite::params;
use thiserror::Error;

use crate::core::config::{CacheStrategy, Config};
use crate::core::store::{Store, StoreError, META_REFRESHED_AT, META_ROW_COUNT};

/// Rows pulled from the warehouse per fetch during snapshot refresh
pub const REFRESH_FETCH_ROWS: usize = 5000;

/// Rows pulled from the warehouse per fetch during live matching
pub const LIVE_FETCH_ROWS: usize = 50000;

#[derive(Debug, Error)]
pub enum NetworkError {
    /// Refresh or live match attempted without a configured source
    #[error("authoritative source not configured (set RCT_NETWORK_URL and RCT_NETWORK_NPI_SQL)")]
    SourceNotConfigured,

    /// Transient connectivity or query failure against the source
    #[error("authoritative source unavailable: {0}")]
    SourceUnavailable(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// A streamable view of the authoritative identifier set.
///
/// Implementations fetch in bounded chunks of `chunk_size` rows; the full
/// set is never materialized. The visitor receives each raw identifier
/// and returns `false` to stop the stream early (row caps).
pub trait NetworkSource {
    fn for_each_npi(
        &mut self,
        chunk_size: usize,
        visit: &mut dyn FnMut(&str) -> bool,
    ) -> Result<(), NetworkError>;
}

/// Warehouse-backed source using a read-only portal cursor.
///
/// One connection per operation: the caller connects, streams, and drops.
pub struct PgNetworkSource {
    client: postgres::Client,
    sql: String,
}

impl PgNetworkSource {
    /// Connect for a snapshot refresh (identifiers as stored, duplicates allowed)
    pub fn for_refresh(config: &Config) -> Result<Self, NetworkError> {
        let (url, fragment) = configured_source(config)?;
        Self::snapshot(url, fragment)
    }

    /// Connect for a live match (distinct identifiers)
    pub fn for_live_match(config: &Config) -> Result<Self, NetworkError> {
        let (url, fragment) = configured_source(config)?;
        Self::live(url, fragment)
    }

    pub fn snapshot(url: &str, fragment: &str) -> Result<Self, NetworkError> {
        Self::connect(url, snapshot_query(fragment))
    }

    pub fn live(url: &str, fragment: &str) -> Result<Self, NetworkError> {
        Self::connect(url, live_query(fragment))
    }

    fn connect(url: &str, sql: String) -> Result<Self, NetworkError> {
        let client = postgres::Client::connect(url, postgres::NoTls)
            .map_err(|e| NetworkError::SourceUnavailable(e.to_string()))?;
        Ok(Self { client, sql })
    }
}

impl NetworkSource for PgNetworkSource {
    fn for_each_npi(
        &mut self,
        chunk_size: usize,
        visit: &mut dyn FnMut(&str) -> bool,
    ) -> Result<(), NetworkError> {
        let unavailable = |e: postgres::Error| NetworkError::SourceUnavailable(e.to_string());

        // Advisory read-only semantics; the backend may not enforce them
        let mut tx = self
            .client
            .build_transaction()
            .read_only(true)
            .start()
            .map_err(unavailable)?;

        let portal = tx.bind(self.sql.as_str(), &[]).map_err(unavailable)?;
        loop {
            let rows = tx
                .query_portal(&portal, chunk_size as i32)
                .map_err(unavailable)?;
            if rows.is_empty() {
                break;
            }
            for row in rows {
                let raw: Option<String> = row.try_get(0).map_err(unavailable)?;
                if let Some(raw) = raw {
                    if !visit(&raw) {
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }
}

/// Wrap the configured fragment so refresh reads a single text column
fn snapshot_query(fragment: &str) -> String {
    format!("SELECT (net.npi)::text AS npi FROM ({fragment}) AS net")
}

/// Wrap the configured fragment so live match streams distinct identifiers
fn live_query(fragment: &str) -> String {
    format!("SELECT DISTINCT (net.npi)::text AS npi FROM ({fragment}) AS net")
}

fn configured_source(config: &Config) -> Result<(&str, &str), NetworkError> {
    match (config.network_url.as_deref(), config.network_npi_sql.as_deref()) {
        (Some(url), Some(sql)) => Ok((url, sql)),
        _ => Err(NetworkError::SourceNotConfigured),
    }
}

/// Owns the mirror refresh procedure for one configured strategy
pub struct NetworkCache {
    strategy: CacheStrategy,
    limit: Option<u64>,
}

impl NetworkCache {
    pub fn new(strategy: CacheStrategy, limit: Option<u64>) -> Self {
        Self { strategy, limit }
    }

    pub fn strategy(&self) -> CacheStrategy {
        self.strategy
    }

    /// Whether opening the process should attempt a snapshot refresh
    pub fn refresh_on_startup(&self) -> bool {
        self.strategy == CacheStrategy::StartupSnapshot
    }

    /// Snapshot the authoritative set into the local mirror.
    ///
    /// Truncate-and-refill inside one local transaction: existing mirror
    /// rows are deleted first, then each streamed identifier is inserted
    /// with an idempotent upsert. Stops early at the configured row cap.
    /// Best-effort with respect to the source: no consistency checkpoint
    /// is taken against concurrent warehouse updates.
    ///
    /// Returns the number of rows inserted and records the refresh
    /// timestamp and count in `cache_meta`.
    pub fn refresh(
        &self,
        store: &mut Store,
        source: &mut dyn NetworkSource,
    ) -> Result<u64, NetworkError> {
        store.ensure_network_table()?;

        let mut inserted = 0u64;
        let limit = self.limit.unwrap_or(u64::MAX);
        {
            let conn = store.connection_mut();
            let tx = conn.transaction().map_err(StoreError::from)?;
            tx.execute("DELETE FROM network_npis", [])
                .map_err(StoreError::from)?;
            {
                let mut stmt = tx
                    .prepare("INSERT OR IGNORE INTO network_npis (npi) VALUES (?1)")
                    .map_err(StoreError::from)?;
                let mut insert_err: Option<rusqlite::Error> = None;
                source.for_each_npi(REFRESH_FETCH_ROWS, &mut |raw| {
                    let npi = raw.trim();
                    if npi.is_empty() {
                        return true;
                    }
                    match stmt.execute(params![npi]) {
                        Ok(changed) => {
                            inserted += changed as u64;
                            inserted < limit
                        }
                        Err(e) => {
                            insert_err = Some(e);
                            false
                        }
                    }
                })?;
                if let Some(e) = insert_err {
                    return Err(StoreError::from(e).into());
                }
            }
            tx.commit().map_err(StoreError::from)?;
        }

        store.meta_set(META_REFRESHED_AT, &Utc::now().to_rfc3339())?;
        store.meta_set(META_ROW_COUNT, &inserted.to_string())?;
        Ok(inserted)
    }
}
