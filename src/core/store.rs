//! SQLite-backed local store
//!
//! Owns the persistent state of the toolkit:
//! - `target_lists` / `target_list_entries` - uploaded rosters and their
//!   deduplicated identifier entries (unique per list + NPI, cascade delete)
//! - `network_npis` - the local mirror of the authoritative network set
//! - `cache_meta` - key/value observability state (last refresh time/count)
//!
//! The store opens in WAL mode and versions its schema for migrations.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use thiserror::Error;

/// Current schema version for migrations
const SCHEMA_VERSION: i32 = 1;

/// Meta key recording when the mirror was last refreshed
pub const META_REFRESHED_AT: &str = "network_refreshed_at";
/// Meta key recording how many rows the last refresh inserted
pub const META_ROW_COUNT: &str = "network_row_count";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("payload serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("target list {0} not found")]
    ListNotFound(i64),
}

/// One uploaded roster
#[derive(Debug, Clone, Serialize)]
pub struct TargetList {
    pub id: i64,
    pub name: String,
    pub client: Option<String>,
    pub notes: Option<String>,
    pub filename: Option<String>,
    pub n_rows: u64,
    pub n_unique_npi: u64,
    pub n_matched_network: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Descriptive metadata attached to a new or edited list
#[derive(Debug, Clone, Default)]
pub struct ListMeta {
    pub name: String,
    pub client: Option<String>,
    pub notes: Option<String>,
    pub filename: Option<String>,
}

/// A deduplicated entry ready for insertion
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub npi: String,
    /// Auxiliary payload: the non-identifier columns of the winning row
    pub extra: Option<serde_json::Map<String, serde_json::Value>>,
}

/// The local store backed by SQLite
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create the store at the given path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        // WAL for better concurrent access; foreign keys for cascade delete
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            -- Schema version for migrations
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            -- Uploaded rosters
            CREATE TABLE IF NOT EXISTS target_lists (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                client TEXT,
                notes TEXT,
                filename TEXT,
                n_rows INTEGER NOT NULL DEFAULT 0,
                n_unique_npi INTEGER NOT NULL DEFAULT 0,
                n_matched_network INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- One canonical identifier per (list, npi)
            CREATE TABLE IF NOT EXISTS target_list_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                target_list_id INTEGER NOT NULL
                    REFERENCES target_lists(id) ON DELETE CASCADE,
                npi TEXT NOT NULL,
                extra TEXT,
                UNIQUE (target_list_id, npi)
            );
            CREATE INDEX IF NOT EXISTS idx_entries_list ON target_list_entries(target_list_id);
            CREATE INDEX IF NOT EXISTS idx_entries_npi ON target_list_entries(npi);

            -- Local mirror of the authoritative network set
            CREATE TABLE IF NOT EXISTS network_npis (
                npi TEXT PRIMARY KEY
            );

            -- Observability state
            CREATE TABLE IF NOT EXISTS cache_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        self.conn.execute(
            "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;

        Ok(())
    }

    /// Crate-internal access for operations that manage their own transaction
    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    // ---- Target lists ----

    /// Persist a list and its entries as a single transaction.
    ///
    /// Either the list row and every entry commit together, or nothing
    /// does; a failure mid-insert rolls the whole operation back.
    pub fn create_list(
        &mut self,
        meta: &ListMeta,
        n_rows: u64,
        entries: &[NewEntry],
    ) -> Result<i64, StoreError> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        tx.execute(
            r#"INSERT INTO target_lists
               (name, client, notes, filename, n_rows, n_unique_npi, n_matched_network,
                created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?7)"#,
            params![
                meta.name,
                meta.client,
                meta.notes,
                meta.filename,
                n_rows as i64,
                entries.len() as i64,
                now
            ],
        )?;
        let list_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO target_list_entries (target_list_id, npi, extra) VALUES (?1, ?2, ?3)",
            )?;
            for entry in entries {
                let extra = entry
                    .extra
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;
                stmt.execute(params![list_id, entry.npi, extra])?;
            }
        }

        tx.commit()?;
        Ok(list_id)
    }

    /// Fetch one list by id
    pub fn get_list(&self, id: i64) -> Result<Option<TargetList>, StoreError> {
        let list = self
            .conn
            .query_row(
                r#"SELECT id, name, client, notes, filename, n_rows, n_unique_npi,
                          n_matched_network, created_at, updated_at
                   FROM target_lists WHERE id = ?1"#,
                params![id],
                row_to_list,
            )
            .optional()?;
        Ok(list)
    }

    /// All lists, newest first
    pub fn all_lists(&self) -> Result<Vec<TargetList>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"SELECT id, name, client, notes, filename, n_rows, n_unique_npi,
                      n_matched_network, created_at, updated_at
               FROM target_lists ORDER BY created_at DESC, id DESC"#,
        )?;
        let lists = stmt
            .query_map([], row_to_list)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lists)
    }

    /// Update descriptive metadata; counts are untouched.
    ///
    /// An absent field keeps its stored value; an explicitly empty
    /// `client` or `notes` clears the field to NULL.
    pub fn update_list_meta(
        &self,
        id: i64,
        name: Option<&str>,
        client: Option<&str>,
        notes: Option<&str>,
    ) -> Result<(), StoreError> {
        let existing = self.get_list(id)?.ok_or(StoreError::ListNotFound(id))?;
        let now = Utc::now().to_rfc3339();
        let client = match client {
            Some("") => None,
            Some(c) => Some(c),
            None => existing.client.as_deref(),
        };
        let notes = match notes {
            Some("") => None,
            Some(n) => Some(n),
            None => existing.notes.as_deref(),
        };
        self.conn.execute(
            "UPDATE target_lists SET name = ?1, client = ?2, notes = ?3, updated_at = ?4 WHERE id = ?5",
            params![name.unwrap_or(&existing.name), client, notes, now, id],
        )?;
        Ok(())
    }

    /// Persist a freshly computed match count
    pub fn set_match_count(&self, id: i64, n_matched: u64) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE target_lists SET n_matched_network = ?1, updated_at = ?2 WHERE id = ?3",
            params![n_matched as i64, now, id],
        )?;
        if changed == 0 {
            return Err(StoreError::ListNotFound(id));
        }
        Ok(())
    }

    /// Delete a list; entries cascade
    pub fn delete_list(&self, id: i64) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM target_lists WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    // ---- Entries ----

    /// The full set of a list's canonical identifiers
    pub fn list_npis(&self, list_id: i64) -> Result<HashSet<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT npi FROM target_list_entries WHERE target_list_id = ?1")?;
        let npis = stmt
            .query_map(params![list_id], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(npis)
    }

    /// (npi, raw payload JSON) pairs in insertion order, capped at `limit`
    pub fn entry_payloads(
        &self,
        list_id: i64,
        limit: usize,
    ) -> Result<Vec<(String, Option<String>)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT npi, extra FROM target_list_entries WHERE target_list_id = ?1 ORDER BY id LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![list_id, limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ---- Network mirror ----

    /// Create the mirror table if it doesn't exist.
    ///
    /// Kept separate from `init_schema` so match computation can recover
    /// a dropped table without a full reopen.
    pub fn ensure_network_table(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS network_npis (npi TEXT PRIMARY KEY);",
        )?;
        Ok(())
    }

    /// Total rows currently in the mirror
    pub fn network_count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM network_npis", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Mirror-side match: count of mirror identifiers present in the list
    pub fn cached_match_count(&self, list_id: i64) -> Result<u64, StoreError> {
        let n: i64 = self.conn.query_row(
            r#"SELECT COUNT(*) FROM network_npis
               WHERE npi IN (SELECT npi FROM target_list_entries WHERE target_list_id = ?1)"#,
            params![list_id],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    // ---- Meta ----

    pub fn meta_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM cache_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn meta_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO cache_meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

fn row_to_list(row: &rusqlite::Row<'_>) -> rusqlite::Result<TargetList> {
    Ok(TargetList {
        id: row.get(0)?,
        name: row.get(1)?,
        client: row.get(2)?,
        notes: row.get(3)?,
        filename: row.get(4)?,
        n_rows: row.get::<_, i64>(5)? as u64,
        n_unique_npi: row.get::<_, i64>(6)? as u64,
        n_matched_network: row.get::<_, i64>(7)? as u64,
        created_at: parse_datetime(row.get::<_, String>(8)?),
        updated_at: parse_datetime(row.get::<_, String>(9)?),
    })
}

/// Parse an RFC 3339 timestamp, falling back to epoch on corruption
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc.timestamp_opt(0, 0).unwrap())
}
