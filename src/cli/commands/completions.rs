//! Shell completion generation
//!
//! Generates shell completion scripts for bash, zsh, fish, and PowerShell.
//!
//! # Usage
//!
//! ```bash
//! # Bash - add to ~/.bashrc
//! source <(rct completions bash)
//!
//! # Zsh - add to ~/.zshrc
//! source <(rct completions zsh)
//!
//! # Fish - add to ~/.config/fish/completions/rct.fish
//! rct completions fish > ~/.config/fish/completions/rct.fish
//!
//! # PowerShell - add to $PROFILE
//! rct completions powershell >> $PROFILE
//! ```

use clap::{Args, CommandFactory};
use clap_complete::Shell;
use miette::Result;

use crate::cli::Cli;

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn run(args: CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(args.shell, &mut cmd, "rct", &mut std::io::stdout());
    Ok(())
}
