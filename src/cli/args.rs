//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    completions::CompletionsArgs, list::ListCommands, network::NetworkCommands,
};

#[derive(Parser)]
#[command(name = "rct")]
#[command(author, version, about = "Roster Coverage Toolkit")]
#[command(
    long_about = "Ingest provider target lists (CSV/XLSX rosters of NPIs) into a local store and measure their overlap with an authoritative network of identifiers."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Path to the local database (default: from config or ./roster.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Target list management (upload, inspect, match)
    #[command(subcommand)]
    List(ListCommands),

    /// Network identifier mirror management
    #[command(subcommand)]
    Network(NetworkCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format (for programming)
    Json,
}
