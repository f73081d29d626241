//! `rct list` commands - upload, inspect, and match target lists

use clap::Subcommand;
use console::style;
use miette::Result;
use serde::Serialize;
use std::path::PathBuf;
use tabled::{Table as DisplayTable, Tabled};

use crate::cli::args::{GlobalOpts, OutputFormat};
use crate::core::ingest;
use crate::core::store::{ListMeta, TargetList};
use crate::core::summary::{self, ListSummary};
use crate::core::workspace::Workspace;

#[derive(Subcommand, Debug)]
pub enum ListCommands {
    /// Upload a roster (CSV or XLSX with an NPI column)
    Upload {
        /// Path to the roster file
        file: PathBuf,

        /// Display name for the list
        #[arg(long)]
        name: Option<String>,

        /// Client the list belongs to
        #[arg(long)]
        client: Option<String>,

        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Show all target lists
    Ls,

    /// Show one list: metadata, refreshed match count, and summaries
    Show {
        /// List id
        id: i64,
    },

    /// Recompute the network match count for a list
    Match {
        /// List id
        id: i64,
    },

    /// Edit list metadata
    Edit {
        /// List id
        id: i64,

        #[arg(long)]
        name: Option<String>,

        /// Client the list belongs to (empty string clears)
        #[arg(long)]
        client: Option<String>,

        /// Free-text notes (empty string clears)
        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a list and all its entries
    Rm {
        /// List id
        id: i64,
    },
}

pub fn run(cmd: ListCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ListCommands::Upload {
            file,
            name,
            client,
            notes,
        } => run_upload(&file, name, client, notes, global),
        ListCommands::Ls => run_ls(global),
        ListCommands::Show { id } => run_show(id, global),
        ListCommands::Match { id } => run_match(id, global),
        ListCommands::Edit {
            id,
            name,
            client,
            notes,
        } => run_edit(id, name, client, notes, global),
        ListCommands::Rm { id } => run_rm(id, global),
    }
}

fn run_upload(
    file: &PathBuf,
    name: Option<String>,
    client: Option<String>,
    notes: Option<String>,
    global: &GlobalOpts,
) -> Result<()> {
    let mut workspace = Workspace::open(global.db.clone())?;
    let bytes =
        std::fs::read(file).map_err(|e| miette::miette!("cannot read {}: {}", file.display(), e))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file.display().to_string());

    let meta = ListMeta {
        name: name.unwrap_or_else(|| filename.clone()),
        client,
        notes,
        filename: Some(filename.clone()),
    };

    let matcher = workspace.matcher();
    let outcome = ingest::ingest(&mut workspace.store, &matcher, &bytes, &filename, meta)
        .map_err(|e| miette::miette!("failed to store target list: {}", e))?;

    if let Some(warning) = &outcome.warning {
        eprintln!("{} {}", style("⚠").yellow(), warning);
    }
    if !global.quiet {
        println!(
            "{} Stored list {} ({} rows, {} unique NPIs, {} in network)",
            style("✓").green(),
            style(outcome.list_id).cyan(),
            outcome.n_rows,
            outcome.n_unique,
            outcome.n_matched
        );
    }
    Ok(())
}

#[derive(Tabled)]
struct ListRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Client")]
    client: String,
    #[tabled(rename = "Rows")]
    n_rows: u64,
    #[tabled(rename = "Unique")]
    n_unique: u64,
    #[tabled(rename = "Matched")]
    n_matched: u64,
    #[tabled(rename = "Created")]
    created: String,
}

fn run_ls(global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::open(global.db.clone())?;
    let lists = workspace
        .store
        .all_lists()
        .map_err(|e| miette::miette!("{}", e))?;

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&lists).unwrap());
        }
        OutputFormat::Text => {
            if lists.is_empty() {
                println!("No target lists. Upload one with: rct list upload <FILE>");
                return Ok(());
            }
            let rows: Vec<ListRow> = lists
                .iter()
                .map(|l| ListRow {
                    id: l.id,
                    name: l.name.clone(),
                    client: l.client.clone().unwrap_or_default(),
                    n_rows: l.n_rows,
                    n_unique: l.n_unique_npi,
                    n_matched: l.n_matched_network,
                    created: l.created_at.format("%Y-%m-%d %H:%M").to_string(),
                })
                .collect();
            println!("{}", DisplayTable::new(rows));
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ShowOutput {
    list: TargetList,
    summary: ListSummary,
}

fn run_show(id: i64, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::open(global.db.clone())?;
    let mut list = workspace
        .store
        .get_list(id)
        .map_err(|e| miette::miette!("{}", e))?
        .ok_or_else(|| miette::miette!("target list {} not found", id))?;

    // Refresh coverage; degrade to the stored count on failure
    match workspace.matcher().recompute(&workspace.store, id) {
        Ok(n) => list.n_matched_network = n,
        Err(e) => eprintln!("{} network match skipped: {}", style("⚠").yellow(), e),
    }

    let summary =
        summary::summarize(&workspace.store, id).map_err(|e| miette::miette!("{}", e))?;

    match global.format {
        OutputFormat::Json => {
            let output = ShowOutput { list, summary };
            println!("{}", serde_json::to_string_pretty(&output).unwrap());
        }
        OutputFormat::Text => print_show(&list, &summary),
    }
    Ok(())
}

fn print_show(list: &TargetList, summary: &ListSummary) {
    println!("{}", style(&list.name).bold());
    println!("{}", style("─".repeat(40)).dim());
    println!("  ID:        {}", list.id);
    if let Some(client) = &list.client {
        println!("  Client:    {}", client);
    }
    if let Some(filename) = &list.filename {
        println!("  File:      {}", filename);
    }
    if let Some(notes) = &list.notes {
        println!("  Notes:     {}", notes);
    }
    println!("  Rows:      {}", list.n_rows);
    println!("  Unique:    {}", style(list.n_unique_npi).cyan());
    println!("  Matched:   {}", style(list.n_matched_network).cyan());
    println!("  Created:   {}", list.created_at.format("%Y-%m-%d %H:%M"));

    for facet in &summary.facets {
        println!();
        println!("  {}", style(&facet.key).bold());
        for (value, count) in &facet.top {
            println!("    {:<24} {}", value, count);
        }
    }

    for numeric in &summary.numerics {
        println!();
        println!(
            "  {}: n={} min={} p50={} p90={} max={}",
            style(&numeric.key).bold(),
            numeric.count,
            numeric.min,
            numeric.p50,
            numeric.p90,
            numeric.max
        );
    }

    if !summary.sample.is_empty() {
        println!();
        println!("  {} (first {})", style("Sample").bold(), summary.sample.len());
        for entry in &summary.sample {
            let extra = entry
                .extra
                .as_ref()
                .map(|e| serde_json::to_string(e).unwrap_or_default())
                .unwrap_or_default();
            println!("    {} {}", entry.npi, style(extra).dim());
        }
    }
}

fn run_match(id: i64, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::open(global.db.clone())?;
    workspace
        .store
        .get_list(id)
        .map_err(|e| miette::miette!("{}", e))?
        .ok_or_else(|| miette::miette!("target list {} not found", id))?;

    // Explicit recomputation surfaces failures instead of degrading
    let matched = workspace
        .matcher()
        .recompute(&workspace.store, id)
        .map_err(|e| miette::miette!("{}", e))?;

    if !global.quiet {
        println!(
            "{} List {}: {} NPIs in network",
            style("✓").green(),
            id,
            style(matched).cyan()
        );
    }
    Ok(())
}

fn run_edit(
    id: i64,
    name: Option<String>,
    client: Option<String>,
    notes: Option<String>,
    global: &GlobalOpts,
) -> Result<()> {
    let workspace = Workspace::open(global.db.clone())?;
    workspace
        .store
        .update_list_meta(id, name.as_deref(), client.as_deref(), notes.as_deref())
        .map_err(|e| miette::miette!("{}", e))?;
    if !global.quiet {
        println!("{} Updated list {}", style("✓").green(), id);
    }
    Ok(())
}

fn run_rm(id: i64, global: &GlobalOpts) -> Result<()> {
    let workspace = Workspace::open(global.db.clone())?;
    let deleted = workspace
        .store
        .delete_list(id)
        .map_err(|e| miette::miette!("{}", e))?;
    if !deleted {
        return Err(miette::miette!("target list {} not found", id));
    }
    if !global.quiet {
        println!("{} Deleted list {} and its entries", style("✓").green(), id);
    }
    Ok(())
}
