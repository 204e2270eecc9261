//! CLI command implementations.
//!
//! - `engines`: list registered engines
//! - `probe`: check whether a database can be opened
//! - `session`: initialize the session database
//! - `validate`: validate configuration
//! - `completions`: generate shell completions

pub mod completions;
pub mod engines;
pub mod probe;
pub mod session;
pub mod validate;

pub use completions::CompletionsCommand;
pub use engines::EnginesCommand;
pub use probe::ProbeCommand;
pub use session::SessionCommand;
pub use validate::ValidateCommand;
