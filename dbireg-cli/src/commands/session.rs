//! Initialize the session database.

use crate::error::CliError;
use crate::utils::{build_registry, load_configuration, print_json, GlobalOptions};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Initialize the session database, print its identity and shut it down.
///
/// A tmp session database is deleted when the command exits unless
/// `--keep-as` copies it somewhere first.
#[derive(Args)]
pub struct SessionCommand {
    /// Copy the session database to PATH after shutting it down
    #[arg(long, value_name = "PATH")]
    pub keep_as: Option<PathBuf>,

    /// Print JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct SessionReport {
    dbi_id: String,
    engine: String,
    kept_as: Option<PathBuf>,
}

impl SessionCommand {
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let config = load_configuration(global)?;
        let registry = build_registry(&config)?;

        let dbi_ref = registry.session_dbi_ref()?;
        let dbi_id = registry.shutdown_session()?;

        let kept_as = match self.keep_as {
            Some(target) => {
                let source = Path::new(&dbi_id);
                if !source.is_file() {
                    return Err(CliError::SemanticFailure(format!(
                        "session database {dbi_id} is not a file"
                    )));
                }
                std::fs::copy(source, &target)?;
                Some(target)
            }
            None => None,
        };

        let report = SessionReport {
            dbi_id,
            engine: dbi_ref.engine.to_string(),
            kept_as,
        };
        if self.json {
            return print_json(&report);
        }

        println!("{}", report.dbi_id);
        if let (Some(path), false) = (&report.kept_as, global.quiet) {
            eprintln!("Session database copied to {}", path.display());
        }
        Ok(())
    }
}
