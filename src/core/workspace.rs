//! Process-level wiring: config, store, and the startup snapshot
//!
//! A [`Workspace`] is built once per invocation. Opening it loads the
//! layered configuration, opens (or creates) the local database and,
//! under the `startup_snapshot` strategy, attempts one mirror refresh.
//! That attempt is non-fatal: the toolkit stays usable when the
//! warehouse is unreachable at start.

use std::path::PathBuf;

use console::style;
use miette::IntoDiagnostic;

use crate::core::config::{Config, DEFAULT_DATABASE};
use crate::core::matcher::Matcher;
use crate::core::network::{NetworkCache, PgNetworkSource};
use crate::core::store::{Store, StoreError};

pub struct Workspace {
    pub config: Config,
    pub store: Store,
}

impl Workspace {
    /// Open the workspace, applying the startup snapshot if configured
    pub fn open(db_override: Option<PathBuf>) -> miette::Result<Self> {
        let config = Config::load().map_err(|e| miette::miette!("{}", e))?;
        let mut workspace = Self::open_with(config, db_override).into_diagnostic()?;

        let cache = workspace.network_cache();
        if cache.refresh_on_startup() && workspace.config.source_configured() {
            let refreshed = PgNetworkSource::for_refresh(&workspace.config)
                .and_then(|mut source| cache.refresh(&mut workspace.store, &mut source));
            if let Err(e) = refreshed {
                // Stale or empty mirror is acceptable at start
                eprintln!(
                    "{} startup snapshot failed, continuing with existing mirror: {}",
                    style("⚠").yellow(),
                    e
                );
            }
        }

        Ok(workspace)
    }

    /// Open without the startup snapshot (used by tests and by commands
    /// that must not touch the network implicitly)
    pub fn open_with(config: Config, db_override: Option<PathBuf>) -> Result<Self, StoreError> {
        let path = db_override
            .or_else(|| config.database.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE));
        let store = Store::open(&path)?;
        Ok(Self { config, store })
    }

    pub fn matcher(&self) -> Matcher {
        Matcher::new(&self.config)
    }

    pub fn network_cache(&self) -> NetworkCache {
        NetworkCache::new(self.config.cache_strategy, self.config.cache_limit)
    }
}
