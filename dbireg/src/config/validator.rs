//! Configuration validation.

use crate::config::schema::{Config, CredentialEntry, PoolConfig};
use crate::error::{Error, Result};
use std::collections::HashSet;

/// Validates a merged configuration.
///
/// # Examples
///
/// ```
/// use dbireg::config::{Config, ConfigValidator};
///
/// ConfigValidator::validate(&Config::default()).unwrap();
/// ```
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a complete configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first offending field.
    pub fn validate(config: &Config) -> Result<()> {
        if let Some(ref engine) = config.default_engine {
            Self::validate_non_empty("default_engine", engine)?;
        }

        if let Some(ref session_db) = config.session_db {
            Self::validate_non_empty("session_db", session_db)?;
        }

        if let Some(ref tmp_dir) = config.tmp_dir {
            Self::validate_non_empty("tmp_dir", tmp_dir)?;
        }

        if config.busy_timeout_ms == Some(0) {
            return Err(Error::Validation {
                field: "busy_timeout_ms".into(),
                message: "Timeout must be greater than 0".into(),
            });
        }

        if let Some(ref pool) = config.pool {
            Self::validate_pool(pool)?;
        }

        if let Some(ref credentials) = config.credentials {
            Self::validate_credentials(credentials)?;
        }

        Ok(())
    }

    fn validate_non_empty(field: &str, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(Error::Validation {
                field: field.into(),
                message: "Cannot be empty or only whitespace".into(),
            });
        }
        if value.contains('\0') {
            return Err(Error::Validation {
                field: field.into(),
                message: "Cannot contain null bytes".into(),
            });
        }
        Ok(())
    }

    fn validate_pool(pool: &PoolConfig) -> Result<()> {
        if pool.expiration_interval_secs == Some(0) {
            return Err(Error::Validation {
                field: "pool.expiration_interval_secs".into(),
                message: "Interval must be greater than 0".into(),
            });
        }

        if let Some(retention) = pool.max_idle_retention_secs {
            let interval = pool
                .expiration_interval_secs
                .unwrap_or(crate::pool::DEFAULT_EXPIRATION_INTERVAL.as_secs());
            if retention < interval {
                return Err(Error::Validation {
                    field: "pool.max_idle_retention_secs".into(),
                    message: format!(
                        "Retention ({retention}s) must not be shorter than the expiration interval ({interval}s)"
                    ),
                });
            }
        }

        Ok(())
    }

    fn validate_credentials(credentials: &[CredentialEntry]) -> Result<()> {
        let mut seen = HashSet::new();
        for (i, entry) in credentials.iter().enumerate() {
            let field = format!("credentials[{i}].url");
            Self::validate_non_empty(&field, &entry.url)?;
            if !seen.insert(entry.url.as_str()) {
                return Err(Error::Validation {
                    field,
                    message: format!("Duplicate credentials for '{}'", entry.url),
                });
            }
        }
        Ok(())
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_retention_bound_against_interval(interval in 1u64..10_000, retention in 0u64..20_000) {
            let config = Config {
                pool: Some(PoolConfig {
                    expiration_interval_secs: Some(interval),
                    max_idle_retention_secs: Some(retention),
                    disable_sweep: None,
                }),
                ..Default::default()
            };
            prop_assert_eq!(ConfigValidator::validate(&config).is_ok(), retention >= interval);
        }
    }
}
