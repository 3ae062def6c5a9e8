//! # Ls Command Implementation
//!
//! This module implements the `ls` subcommand, which lists the entries of the
//! namespace a layer would leave behind: the parent's entries that survive
//! plus everything the layer provides.
//!
//! ## Functionality
//!
//! - **Entry Listing**: Paths of the final namespace in path order
//! - **Pattern Filtering**: Supports glob patterns to filter the output
//! - **Detailed Output**: Optional long format showing type, permissions and
//!   owner, with symlink targets
//!
//! The layer must be consistent; the listing comes from the exported facts.

use anyhow::Result;
use clap::Args;

use layer_depgraph::namespace::{FileType, FsEntry};
use layer_depgraph::phases::orchestrator;
use layer_depgraph::suggestions;

use super::{engine_failure, LayerArgs};

/// List the entries of the namespace after the layer is built
#[derive(Args, Debug)]
pub struct LsArgs {
    #[command(flatten)]
    pub layer: LayerArgs,

    /// Filter entries by glob pattern (e.g., "/etc/*", "/usr/**/bin/*").
    #[arg(short, long, value_name = "PATTERN")]
    pub pattern: Option<String>,

    /// Use long listing format showing type, permissions and owner.
    #[arg(short, long)]
    pub long: bool,

    /// Show only the total count of entries.
    #[arg(long)]
    pub count: bool,
}

/// Execute the `ls` command.
pub fn execute(args: LsArgs) -> Result<()> {
    let pattern = match &args.pattern {
        Some(pattern) => Some(
            glob::Pattern::new(pattern).map_err(|e| suggestions::invalid_glob(pattern, &e))?,
        ),
        None => None,
    };

    let input = args.layer.load_input()?;
    let output = orchestrator::build_layer(&input, &args.layer.engine_config())
        .map_err(|e| engine_failure(&e))?;

    let entries: Vec<&FsEntry> = output
        .facts
        .namespace
        .entries()
        .into_iter()
        .filter(|entry| {
            pattern
                .as_ref()
                .map_or(true, |p| p.matches(entry.path.as_str()))
        })
        .collect();

    if args.count {
        println!("{}", entries.len());
        return Ok(());
    }

    for entry in &entries {
        if args.long {
            println!("{}", format_long(entry));
        } else {
            println!("{}", entry.path);
        }
    }
    Ok(())
}

fn type_char(file_type: &FileType) -> char {
    match file_type {
        FileType::File => '-',
        FileType::Directory => 'd',
        FileType::Symlink { .. } => 'l',
        FileType::CharDevice { .. } => 'c',
        FileType::BlockDevice { .. } => 'b',
    }
}

/// Format file permissions in Unix-style (e.g., "rw-r--r--")
fn format_permissions(mode: u32) -> String {
    let mut result = String::with_capacity(9);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        result.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        result.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        result.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    result
}

fn format_long(entry: &FsEntry) -> String {
    let mut line = format!(
        "{}{} {:<16} {}",
        type_char(&entry.file_type),
        format_permissions(entry.mode),
        entry.owner.to_string(),
        entry.path
    );
    match &entry.file_type {
        FileType::Symlink { target, .. } => line.push_str(&format!(" -> {}", target)),
        FileType::CharDevice { major, minor } | FileType::BlockDevice { major, minor } => {
            line.push_str(&format!(" ({}:{})", major, minor))
        }
        _ => {}
    }
    if entry.opaque {
        line.push_str(" [mount]");
    }
    line
}
