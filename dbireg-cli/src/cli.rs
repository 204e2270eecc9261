//! CLI structure and command definitions.

use crate::commands::{
    CompletionsCommand, EnginesCommand, ProbeCommand, SessionCommand, ValidateCommand,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Inspect and exercise dbireg database handles.
#[derive(Parser)]
#[command(name = "dbireg")]
#[command(version, about = "Inspect and exercise dbireg database handles", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Override the data directory location
    #[arg(long, value_name = "PATH", global = true, env = "DBIREG_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Configuration file layered over the user configuration
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Existing database to use as the session database
    #[arg(long, value_name = "PATH", global = true)]
    pub session_db: Option<String>,

    /// Parent directory for tmp databases
    #[arg(long, value_name = "PATH", global = true)]
    pub tmp_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand)]
pub enum Command {
    /// List registered engines and their release policies
    Engines(EnginesCommand),

    /// Check whether a database can be opened
    Probe(ProbeCommand),

    /// Initialize the session database and print its identity
    Session(SessionCommand),

    /// Validate the configuration
    Validate(ValidateCommand),

    /// Generate shell completion scripts
    Completions(CompletionsCommand),
}
