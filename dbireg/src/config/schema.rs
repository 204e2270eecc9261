//! Configuration schema definitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::credentials::{Credentials, StaticCredentialStore};
use crate::engines::{DEFAULT_BUSY_TIMEOUT, SQLITE_ENGINE_ID};
use crate::pool::ExpirationPolicy;

/// Complete configuration structure.
///
/// Every field is optional so partial files can be layered on top of each
/// other; unset fields fall back to the library defaults.
///
/// # Examples
///
/// ```
/// use dbireg::config::{Config, PoolConfig};
///
/// let config: Config = serde_yaml::from_str(
///     "default_engine: memory\npool:\n  expiration_interval_secs: 60\n",
/// )
/// .unwrap();
/// assert_eq!(config.default_engine.as_deref(), Some("memory"));
/// assert_eq!(
///     config.pool,
///     Some(PoolConfig {
///         expiration_interval_secs: Some(60),
///         ..Default::default()
///     })
/// );
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Engine used for tmp databases when none is named.
    pub default_engine: Option<String>,

    /// Identity to use for the session database instead of a fresh tmp file.
    pub session_db: Option<String>,

    /// Parent directory of the process-private tmp area.
    pub tmp_dir: Option<String>,

    /// Busy timeout of file-backed `SQLite` connections (milliseconds).
    pub busy_timeout_ms: Option<u64>,

    /// Pool expiration settings.
    pub pool: Option<PoolConfig>,

    /// Per-URL credentials handed to engines on open.
    pub credentials: Option<Vec<CredentialEntry>>,
}

impl Config {
    /// Default engine id, falling back to `sqlite`.
    #[must_use]
    pub fn default_engine_or_builtin(&self) -> &str {
        self.default_engine.as_deref().unwrap_or(SQLITE_ENGINE_ID)
    }

    /// Busy timeout for file-backed connections.
    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        self.busy_timeout_ms
            .map_or(DEFAULT_BUSY_TIMEOUT, Duration::from_millis)
    }

    /// Expiration policy described by the `pool` section.
    #[must_use]
    pub fn expiration_policy(&self) -> ExpirationPolicy {
        let mut policy = ExpirationPolicy::default();
        if let Some(ref pool) = self.pool {
            if let Some(secs) = pool.expiration_interval_secs {
                policy = policy.with_interval(Duration::from_secs(secs));
            }
            if let Some(secs) = pool.max_idle_retention_secs {
                policy = policy.with_max_idle_retention(Duration::from_secs(secs));
            }
        }
        policy
    }

    /// Whether the background sweep should run.
    #[must_use]
    pub fn sweep_enabled(&self) -> bool {
        !self
            .pool
            .as_ref()
            .and_then(|p| p.disable_sweep)
            .unwrap_or(false)
    }

    /// Credential store holding the `credentials` entries.
    #[must_use]
    pub fn credential_store(&self) -> StaticCredentialStore {
        let mut store = StaticCredentialStore::default();
        for entry in self.credentials.iter().flatten() {
            store.insert(
                entry.url.clone(),
                Credentials {
                    login: entry.login.clone(),
                    password: entry.password.clone(),
                },
            );
        }
        store
    }
}

/// Pool expiration settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// Sweep period and surplus handle expiration age (seconds).
    pub expiration_interval_secs: Option<u64>,

    /// Upper bound on how long the last idle handle of an unused database
    /// is kept (seconds). Unset keeps it indefinitely.
    pub max_idle_retention_secs: Option<u64>,

    /// Do not start the background sweep.
    pub disable_sweep: Option<bool>,
}

/// Credentials for one database URL.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CredentialEntry {
    /// Resolved URL the credentials apply to.
    pub url: String,
    /// Login name.
    pub login: Option<String>,
    /// Password.
    pub password: Option<String>,
}
