//! Build script for dbireg-cli.
//!
//! Renders the man page into `OUT_DIR/man/dbireg.1` with clap_mangen. The
//! command structure is declared here because a build script cannot depend
//! on the crate it builds; keep it in step with src/cli.rs.

use clap::{Arg, Command};
use clap_mangen::Man;
use std::fs;
use std::path::PathBuf;

fn global_path_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .help(help)
        .value_name("PATH")
        .global(true)
}

fn build_cli() -> Command {
    Command::new("dbireg")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect and exercise dbireg database handles")
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .help("Enable verbose output")
                .global(true)
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .help("Suppress non-essential output")
                .global(true)
                .action(clap::ArgAction::SetTrue),
        )
        .arg(global_path_arg("data-dir", "Override the data directory location").env("DBIREG_DATA_DIR"))
        .arg(global_path_arg("config", "Configuration file layered over the user configuration"))
        .arg(global_path_arg("session-db", "Existing database to use as the session database"))
        .arg(global_path_arg("tmp-dir", "Parent directory for tmp databases"))
        .subcommands(vec![
            Command::new("engines").about("List registered engines and their release policies"),
            Command::new("probe").about("Check whether a database can be opened"),
            Command::new("session").about("Initialize the session database and print its identity"),
            Command::new("validate").about("Validate the configuration"),
            Command::new("completions").about("Generate shell completion scripts"),
        ])
}

fn main() -> std::io::Result<()> {
    let out_dir = PathBuf::from(std::env::var_os("OUT_DIR").ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR is not set")
    })?);
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir)?;

    let mut buffer = Vec::new();
    Man::new(build_cli()).render(&mut buffer)?;
    fs::write(man_dir.join("dbireg.1"), buffer)?;

    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-changed=src/commands/");
    Ok(())
}
