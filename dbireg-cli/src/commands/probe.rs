//! Check whether a database can be opened.

use crate::error::CliError;
use crate::utils::{build_registry, load_configuration, GlobalOptions};
use clap::Args;
use dbireg::{is_connectable, DbiRef, EngineId};

/// Check whether a database can be opened. Exits with status 1 if not.
#[derive(Args)]
pub struct ProbeCommand {
    /// Database identity (a path for file-backed engines)
    #[arg(value_name = "ID")]
    pub id: String,

    /// Engine to open the database with (defaults to the configured engine)
    #[arg(long, short)]
    pub engine: Option<String>,

    /// Create the database if it does not exist
    #[arg(long)]
    pub create: bool,
}

impl ProbeCommand {
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let config = load_configuration(global)?;
        let registry = build_registry(&config)?;

        let engine = self
            .engine
            .map_or_else(|| registry.default_engine().clone(), EngineId::from);
        let factory = registry
            .factory(&engine)
            .ok_or_else(|| CliError::from(dbireg::Error::InvalidFactory {
                engine: engine.to_string(),
            }))?;
        let url = factory.resolve_url(&self.id)?;
        let dbi_ref = DbiRef::new(self.id, engine);

        if is_connectable(registry.pool(), &dbi_ref, self.create) {
            if !global.quiet {
                println!("{dbi_ref}: connectable ({url})");
            }
            Ok(())
        } else {
            Err(CliError::SemanticFailure(format!(
                "{dbi_ref}: not connectable ({url})"
            )))
        }
    }
}
