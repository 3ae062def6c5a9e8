//! # Completions Command Implementation
//!
//! `layer-depgraph completions <shell>` prints a completion script built by
//! `clap_complete` from the CLI definition, so every subcommand, flag and
//! value list (`--format`, `--color`, shell names) completes without a
//! hand-maintained script.
//!
//! ```bash
//! layer-depgraph completions bash > ~/.local/share/bash-completion/completions/layer-depgraph
//! layer-depgraph completions zsh > ~/.zfunc/_layer-depgraph
//! ```

use anyhow::Result;
use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};
use std::io::{self, Write};

use crate::cli::Cli;

/// Generate shell completion scripts
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// The shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write the completion script of `shell` to `out`.
pub fn write_completions(shell: Shell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, out);
}

/// Execute the `completions` command.
pub fn execute(args: CompletionsArgs) -> Result<()> {
    let mut stdout = io::stdout().lock();
    write_completions(args.shell, &mut stdout);
    stdout.flush()?;
    Ok(())
}
