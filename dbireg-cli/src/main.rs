//! Main entry point for the dbireg CLI.
//!
//! The CLI builds a registry from the layered configuration and runs one
//! command against it:
//! - `engines`: list registered engines
//! - `probe`: check whether a database can be opened
//! - `session`: initialize the session database
//! - `validate`: validate configuration
//! - `completions`: generate shell completions

mod cli;
mod commands;
mod error;
mod utils;

use clap::Parser;
use cli::Cli;
use utils::GlobalOptions;

fn main() {
    let cli = Cli::parse();

    let level = dbireg::init_logger(cli.verbose, cli.quiet);
    log::debug!("log level: {level:?}");

    let global = GlobalOptions {
        verbose: cli.verbose,
        quiet: cli.quiet,
        data_dir: cli.data_dir,
        config: cli.config,
        session_db: cli.session_db,
        tmp_dir: cli.tmp_dir,
    };

    let result = match cli.command {
        cli::Command::Engines(cmd) => cmd.execute(&global),
        cli::Command::Probe(cmd) => cmd.execute(&global),
        cli::Command::Session(cmd) => cmd.execute(&global),
        cli::Command::Validate(cmd) => cmd.execute(&global),
        cli::Command::Completions(cmd) => cmd.execute(&global),
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
