//! Configuration management with layered hierarchy
//!
//! Settings merge in priority order: built-in defaults, then the global
//! user config file, then environment variables. The resulting [`Config`]
//! is built once at process start and passed by value into the cache
//! manager and match engine; nothing mutates it afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Default local database file when neither config nor env set one
pub const DEFAULT_DATABASE: &str = "roster.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown cache strategy '{0}' (expected live, startup_snapshot or manual)")]
    UnknownStrategy(String),

    #[error("invalid cache limit '{0}' (expected a positive integer)")]
    InvalidLimit(String),
}

/// Consistency strategy for the local network mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    /// No mirror; every match streams the authoritative source
    #[default]
    Live,
    /// Snapshot refresh attempted once at process start (non-fatal)
    StartupSnapshot,
    /// Mirror refreshed only on explicit operator trigger
    Manual,
}

impl CacheStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStrategy::Live => "live",
            CacheStrategy::StartupSnapshot => "startup_snapshot",
            CacheStrategy::Manual => "manual",
        }
    }

    /// Whether match computation reads the local mirror instead of the source
    pub fn uses_mirror(&self) -> bool {
        matches!(self, CacheStrategy::StartupSnapshot | CacheStrategy::Manual)
    }
}

impl FromStr for CacheStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(CacheStrategy::Live),
            "startup_snapshot" => Ok(CacheStrategy::StartupSnapshot),
            "manual" => Ok(CacheStrategy::Manual),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RCT configuration with layered hierarchy
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the local SQLite database
    pub database: Option<PathBuf>,

    /// Connection string for the authoritative network warehouse
    pub network_url: Option<String>,

    /// Query fragment returning a single identifier column named `npi`
    pub network_npi_sql: Option<String>,

    /// Mirror consistency strategy
    pub cache_strategy: CacheStrategy,

    /// Optional row cap for snapshot refresh
    pub cache_limit: Option<u64>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/rct/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                if let Ok(contents) = std::fs::read_to_string(&global_path) {
                    if let Ok(global) = serde_yml::from_str::<Config>(&contents) {
                        config.merge(global);
                    }
                }
            }
        }

        // 3. Environment variables
        if let Ok(db) = std::env::var("RCT_DATABASE") {
            if !db.trim().is_empty() {
                config.database = Some(PathBuf::from(db));
            }
        }
        if let Ok(url) = std::env::var("RCT_NETWORK_URL") {
            if !url.trim().is_empty() {
                config.network_url = Some(url.trim().to_string());
            }
        }
        if let Ok(sql) = std::env::var("RCT_NETWORK_NPI_SQL") {
            if !sql.trim().is_empty() {
                config.network_npi_sql = Some(sql.trim().to_string());
            }
        }
        if let Ok(strategy) = std::env::var("RCT_CACHE_STRATEGY") {
            config.cache_strategy = strategy.parse()?;
        }
        if let Ok(limit) = std::env::var("RCT_CACHE_LIMIT") {
            let limit = limit.trim();
            if !limit.is_empty() {
                let n: u64 = limit
                    .parse()
                    .map_err(|_| ConfigError::InvalidLimit(limit.to_string()))?;
                config.cache_limit = if n == 0 { None } else { Some(n) };
            }
        }

        Ok(config)
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rct")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.database.is_some() {
            self.database = other.database;
        }
        if other.network_url.is_some() {
            self.network_url = other.network_url;
        }
        if other.network_npi_sql.is_some() {
            self.network_npi_sql = other.network_npi_sql;
        }
        if other.cache_strategy != CacheStrategy::default() {
            self.cache_strategy = other.cache_strategy;
        }
        if other.cache_limit.is_some() {
            self.cache_limit = other.cache_limit;
        }
    }

    /// Whether both halves of the authoritative source are configured
    pub fn source_configured(&self) -> bool {
        self.network_url.is_some() && self.network_npi_sql.is_some()
    }
}
