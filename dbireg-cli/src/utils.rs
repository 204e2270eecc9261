//! Utility functions shared by CLI commands.

use crate::error::CliError;
use dbireg::{Config, ConfigBuilder, DbiRegistry, RegistryBuilder};
use std::path::PathBuf;

/// Global CLI options shared across all commands.
#[derive(Debug, Clone)]
#[allow(dead_code)] // verbose is consumed by the logger before dispatch
pub struct GlobalOptions {
    /// Enable verbose output.
    pub verbose: bool,

    /// Suppress non-essential output.
    pub quiet: bool,

    /// Override the data directory location.
    pub data_dir: Option<PathBuf>,

    /// Explicit configuration file.
    pub config: Option<PathBuf>,

    /// Session database override.
    pub session_db: Option<String>,

    /// Parent directory for tmp databases.
    pub tmp_dir: Option<PathBuf>,
}

/// Load hierarchical configuration.
///
/// Precedence, highest first: global options, environment variables, the
/// `--config` file, the user configuration, built-in defaults.
pub fn load_configuration(global: &GlobalOptions) -> Result<Config, CliError> {
    let mut builder = ConfigBuilder::new();
    if let Some(ref dir) = global.data_dir {
        builder = builder.with_data_dir(dir);
    }
    if let Some(ref path) = global.config {
        builder = builder.with_config_file(path);
    }

    let overrides = Config {
        session_db: global.session_db.clone(),
        tmp_dir: global.tmp_dir.as_ref().map(|p| p.display().to_string()),
        ..Config::default()
    };

    builder
        .with_config(overrides)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))
}

/// Build a registry for a one-shot command. The expiration sweep is not
/// started; the process exits long before it would fire.
pub fn build_registry(config: &Config) -> Result<DbiRegistry, CliError> {
    RegistryBuilder::from_config(config)
        .disable_sweep()
        .build()
        .map_err(CliError::from)
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| CliError::Io(e.into()))?;
    println!("{json}");
    Ok(())
}
