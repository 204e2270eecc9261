//! Configuration system for dbireg.
//!
//! Configuration is merged from several sources with the following
//! precedence (highest to lowest):
//!
//! 1. Programmatic overrides (via `ConfigBuilder::with_config`)
//! 2. Environment variables (`DBIREG_*`)
//! 3. An explicit file (via `ConfigBuilder::with_config_file`)
//! 4. User config (`~/.dbireg/config.yaml`, or under `DBIREG_DATA_DIR`)
//! 5. Built-in defaults
//!
//! # Examples
//!
//! ```
//! use dbireg::config::{Config, ConfigBuilder};
//!
//! let config = ConfigBuilder::new()
//!     .skip_files()
//!     .skip_env()
//!     .with_config(Config {
//!         default_engine: Some("memory".into()),
//!         ..Default::default()
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.default_engine_or_builtin(), "memory");
//! ```

pub mod builder;
pub mod environment;
pub mod loader;
pub mod merger;
pub mod schema;
pub mod validator;

pub use builder::ConfigBuilder;
pub use environment::EnvironmentConfig;
pub use loader::{default_data_dir, ConfigLoader, ConfigSource, DATA_DIR_ENV, USER_CONFIG_FILE};
pub use merger::ConfigMerger;
pub use schema::{Config, CredentialEntry, PoolConfig};
pub use validator::ConfigValidator;
