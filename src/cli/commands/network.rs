//! `rct network` commands - manage the local network mirror

use clap::Subcommand;
use console::style;
use miette::Result;

use crate::cli::args::{GlobalOpts, OutputFormat};
use crate::core::network::PgNetworkSource;
use crate::core::store::{META_REFRESHED_AT, META_ROW_COUNT};
use crate::core::workspace::Workspace;

#[derive(Subcommand, Debug)]
pub enum NetworkCommands {
    /// Refresh the mirror from the authoritative source now
    Refresh,

    /// Show strategy, source configuration, and mirror state
    Status,
}

pub fn run(cmd: NetworkCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        NetworkCommands::Refresh => run_refresh(global),
        NetworkCommands::Status => run_status(global),
    }
}

fn run_refresh(global: &GlobalOpts) -> Result<()> {
    let mut workspace = Workspace::open(global.db.clone())?;

    // Manual trigger: failures are the operator's business, never swallowed
    let mut source = PgNetworkSource::for_refresh(&workspace.config)
        .map_err(|e| miette::miette!("{}", e))?;
    let cache = workspace.network_cache();
    let inserted = cache
        .refresh(&mut workspace.store, &mut source)
        .map_err(|e| miette::miette!("{}", e))?;

    if !global.quiet {
        println!(
            "{} Mirror refreshed: {} identifiers",
            style("✓").green(),
            style(inserted).cyan()
        );
    }
    Ok(())
}

fn run_status(global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::open(global.db.clone())?;
    let config = &workspace.config;
    let store = &workspace.store;

    let mirror_rows = store.network_count().map_err(|e| miette::miette!("{}", e))?;
    let refreshed_at = store
        .meta_get(META_REFRESHED_AT)
        .map_err(|e| miette::miette!("{}", e))?;
    let last_count = store
        .meta_get(META_ROW_COUNT)
        .map_err(|e| miette::miette!("{}", e))?;

    match global.format {
        OutputFormat::Json => {
            let status = serde_json::json!({
                "strategy": config.cache_strategy.as_str(),
                "source_configured": config.source_configured(),
                "cache_limit": config.cache_limit,
                "mirror_rows": mirror_rows,
                "last_refresh_at": refreshed_at,
                "last_refresh_count": last_count,
            });
            println!("{}", serde_json::to_string_pretty(&status).unwrap());
        }
        OutputFormat::Text => {
            println!("{}", style("Network Mirror").bold());
            println!("{}", style("─".repeat(40)).dim());
            println!("  Strategy:      {}", config.cache_strategy);
            println!(
                "  Source:        {}",
                if config.source_configured() {
                    "configured".to_string()
                } else {
                    style("not configured").yellow().to_string()
                }
            );
            if let Some(limit) = config.cache_limit {
                println!("  Row cap:       {}", limit);
            }
            println!("  Mirror rows:   {}", style(mirror_rows).cyan());
            println!(
                "  Last refresh:  {}",
                refreshed_at.as_deref().unwrap_or("never")
            );
            if let Some(count) = last_count {
                println!("  Last count:    {}", count);
            }
        }
    }
    Ok(())
}
