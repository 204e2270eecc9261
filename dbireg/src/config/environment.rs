//! Environment variable handling for configuration overrides.
//!
//! `DBIREG_*` variables override values from configuration files.

use crate::config::schema::Config;
use crate::error::{Error, Result};
use std::env;

/// Handles environment variable overrides for configuration.
///
/// # Examples
///
/// ```no_run
/// use dbireg::config::{Config, EnvironmentConfig};
///
/// let mut config = Config::default();
/// EnvironmentConfig::apply_overrides(&mut config).unwrap();
/// ```
pub struct EnvironmentConfig;

impl EnvironmentConfig {
    /// Apply environment variable overrides to config.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or boolean variable cannot be parsed.
    pub fn apply_overrides(config: &mut Config) -> Result<()> {
        if let Ok(engine) = env::var("DBIREG_DEFAULT_ENGINE") {
            config.default_engine = Some(engine);
        }

        if let Ok(path) = env::var("DBIREG_SESSION_DB") {
            config.session_db = Some(path);
        }

        if let Ok(dir) = env::var("DBIREG_TMP_DIR") {
            config.tmp_dir = Some(dir);
        }

        if let Ok(val) = env::var("DBIREG_BUSY_TIMEOUT_MS") {
            config.busy_timeout_ms = Some(Self::parse_u64("DBIREG_BUSY_TIMEOUT_MS", &val)?);
        }

        Self::apply_pool_overrides(config)
    }

    fn apply_pool_overrides(config: &mut Config) -> Result<()> {
        let mut pool = config.pool.clone().unwrap_or_default();
        let mut modified = false;

        if let Ok(val) = env::var("DBIREG_EXPIRATION_INTERVAL_SECS") {
            pool.expiration_interval_secs =
                Some(Self::parse_u64("DBIREG_EXPIRATION_INTERVAL_SECS", &val)?);
            modified = true;
        }

        if let Ok(val) = env::var("DBIREG_MAX_IDLE_RETENTION_SECS") {
            pool.max_idle_retention_secs =
                Some(Self::parse_u64("DBIREG_MAX_IDLE_RETENTION_SECS", &val)?);
            modified = true;
        }

        if let Ok(val) = env::var("DBIREG_DISABLE_SWEEP") {
            pool.disable_sweep = Some(Self::parse_bool("DBIREG_DISABLE_SWEEP", &val)?);
            modified = true;
        }

        if modified {
            config.pool = Some(pool);
        }
        Ok(())
    }

    fn parse_u64(field: &str, s: &str) -> Result<u64> {
        s.trim().parse().map_err(|_| Error::Validation {
            field: field.into(),
            message: format!("Must be a non-negative integer, got '{s}'"),
        })
    }

    fn parse_bool(field: &str, s: &str) -> Result<bool> {
        match s.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(Error::Validation {
                field: field.into(),
                message: format!(
                    "Invalid boolean value: '{s}' (expected true/false/1/0/yes/no/on/off)"
                ),
            }),
        }
    }
}
