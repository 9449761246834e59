//! Command-line interface for the buildq inspection binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Inspect a build queue computed from a fixture snapshot.
#[derive(Debug, Parser)]
#[command(name = "buildq", version, about)]
pub struct Cli {
    /// Path to a YAML queue configuration.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to a JSON snapshot of repos and build history.
    #[arg(long)]
    pub snapshot: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the top N candidates across all builders.
    Top {
        #[arg(short, default_value_t = 10)]
        n: usize,
    },
    /// Pop candidates for the given builders until the queue drains.
    Pop {
        /// Builder names, in priority order.
        builders: Vec<String>,
    },
    /// Print the analysis-window commit hashes.
    Recent,
}
