//! List the engines a registry knows about.

use crate::error::CliError;
use crate::utils::{build_registry, load_configuration, print_json, GlobalOptions};
use clap::Args;
use serde::Serialize;

/// List registered engines and their release policies.
#[derive(Args)]
pub struct EnginesCommand {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct EngineInfo {
    id: String,
    release_policy: String,
    thread_scoped: bool,
    file_backed: bool,
    default: bool,
}

impl EnginesCommand {
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let config = load_configuration(global)?;
        let registry = build_registry(&config)?;

        let engines: Vec<EngineInfo> = registry
            .registered_engine_ids()
            .into_iter()
            .filter_map(|id| {
                let factory = registry.factory(&id)?;
                Some(EngineInfo {
                    default: &id == registry.default_engine(),
                    id: id.to_string(),
                    release_policy: factory.release_policy().to_string(),
                    thread_scoped: factory.thread_scoped(),
                    file_backed: factory.file_backed(),
                })
            })
            .collect();

        if self.json {
            return print_json(&engines);
        }

        if !global.quiet {
            println!("{:<12} {:<10} {:<14} {:<12}", "ENGINE", "POLICY", "THREAD-SCOPED", "FILE-BACKED");
        }
        for engine in &engines {
            let marker = if engine.default { " (default)" } else { "" };
            println!(
                "{:<12} {:<10} {:<14} {:<12}{marker}",
                engine.id, engine.release_policy, engine.thread_scoped, engine.file_backed
            );
        }
        Ok(())
    }
}
