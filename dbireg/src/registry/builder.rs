use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::credentials::{CredentialStore, NoCredentials};
use crate::dbi::EngineId;
use crate::engines::{register_builtin_engines, DEFAULT_BUSY_TIMEOUT, SQLITE_ENGINE_ID};
use crate::error::{Error, Result};
use crate::factory::{DbiFactory, FactoryCatalog};
use crate::pool::{ActiveRefSource, DbiPool, ExpirationPolicy};
use crate::tmp_area::TmpArea;

use super::DbiRegistry;

/// Builder for [`DbiRegistry`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use dbireg::{DbiRegistry, ExpirationPolicy};
///
/// let registry = DbiRegistry::builder()
///     .default_engine("memory")
///     .expiration_policy(ExpirationPolicy::default().with_interval(Duration::from_secs(60)))
///     .build()
///     .unwrap();
/// assert_eq!(registry.default_engine().as_str(), "memory");
/// ```
pub struct RegistryBuilder {
    default_engine: EngineId,
    session_db: Option<String>,
    tmp_dir: Option<PathBuf>,
    busy_timeout: Duration,
    builtin_engines: bool,
    factories: Vec<Arc<dyn DbiFactory>>,
    credentials: Arc<dyn CredentialStore>,
    active_refs: Option<Arc<dyn ActiveRefSource>>,
    policy: ExpirationPolicy,
    sweep: bool,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    /// A builder with the built-in engines, `sqlite` as default engine and
    /// the default expiration policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_engine: EngineId::from(SQLITE_ENGINE_ID),
            session_db: None,
            tmp_dir: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            builtin_engines: true,
            factories: Vec::new(),
            credentials: Arc::new(NoCredentials),
            active_refs: None,
            policy: ExpirationPolicy::default(),
            sweep: true,
        }
    }

    /// A builder initialized from a validated configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut builder = Self::new()
            .default_engine(config.default_engine_or_builtin())
            .busy_timeout(config.busy_timeout())
            .expiration_policy(config.expiration_policy())
            .credentials(Arc::new(config.credential_store()));
        if let Some(ref session_db) = config.session_db {
            builder = builder.session_db(session_db.clone());
        }
        if let Some(ref tmp_dir) = config.tmp_dir {
            builder = builder.tmp_dir(tmp_dir);
        }
        if !config.sweep_enabled() {
            builder = builder.disable_sweep();
        }
        builder
    }

    /// Engine used by [`DbiRegistry::attach_tmp_dbi`].
    #[must_use]
    pub fn default_engine(mut self, engine: impl Into<EngineId>) -> Self {
        self.default_engine = engine.into();
        self
    }

    /// Existing database to use as the session database.
    ///
    /// Ignored, with a warning, if it cannot be opened when the session is
    /// first attached.
    #[must_use]
    pub fn session_db(mut self, dbi_id: impl Into<String>) -> Self {
        self.session_db = Some(dbi_id.into());
        self
    }

    /// Parent directory of the tmp area. Defaults to the system temp dir.
    #[must_use]
    pub fn tmp_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.tmp_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Busy timeout of the built-in file-backed engine.
    #[must_use]
    pub const fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Do not register the built-in engines.
    #[must_use]
    pub const fn without_builtin_engines(mut self) -> Self {
        self.builtin_engines = false;
        self
    }

    /// Registers an additional factory. Factories given here win over
    /// built-in engines with the same id.
    #[must_use]
    pub fn factory(mut self, factory: Arc<dyn DbiFactory>) -> Self {
        self.factories.push(factory);
        self
    }

    /// Credential store consulted when handles are created.
    #[must_use]
    pub fn credentials(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = store;
        self
    }

    /// Source of the refs live documents use, consulted by the sweep.
    #[must_use]
    pub fn active_refs(mut self, source: Arc<dyn ActiveRefSource>) -> Self {
        self.active_refs = Some(source);
        self
    }

    /// Expiration policy of the pool.
    #[must_use]
    pub fn expiration_policy(mut self, policy: ExpirationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Do not start the background sweep.
    #[must_use]
    pub const fn disable_sweep(mut self) -> Self {
        self.sweep = false;
        self
    }

    /// Creates the tmp area, the pool and, unless disabled, the sweep timer.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the expiration interval is zero
    /// - [`Error::Allocation`] if the tmp area cannot be created
    /// - an I/O error if the sweep thread cannot be spawned
    pub fn build(self) -> Result<DbiRegistry> {
        if self.policy.interval.is_zero() {
            return Err(Error::Validation {
                field: "expiration_interval".into(),
                message: "Interval must be greater than 0".into(),
            });
        }

        let catalog = Arc::new(FactoryCatalog::new());
        for factory in self.factories {
            catalog.register(factory);
        }
        if self.builtin_engines {
            register_builtin_engines(&catalog, self.busy_timeout);
        }

        let tmp_area = match self.tmp_dir {
            Some(ref dir) => TmpArea::in_dir(dir)?,
            None => TmpArea::new()?,
        };

        let pool = Arc::new(DbiPool::with_options(
            Arc::clone(&catalog),
            self.credentials,
            self.policy,
        ));
        let timer = if self.sweep {
            Some(pool.start_expiration_timer(self.active_refs)?)
        } else {
            None
        };

        log::debug!(
            "dbi registry ready: engines {:?}, tmp area {}",
            catalog.engine_ids(),
            tmp_area.path().display()
        );
        Ok(DbiRegistry::from_parts(
            catalog,
            pool,
            tmp_area,
            self.default_engine,
            self.session_db,
            timer,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::engines::{MemoryFactory, MEMORY_ENGINE_ID};

    #[test]
    fn test_without_builtin_engines() {
        let registry = RegistryBuilder::new()
            .without_builtin_engines()
            .factory(Arc::new(MemoryFactory))
            .default_engine(MEMORY_ENGINE_ID)
            .disable_sweep()
            .build()
            .unwrap();
        assert_eq!(
            registry.registered_engine_ids(),
            vec![EngineId::from(MEMORY_ENGINE_ID)]
        );
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = RegistryBuilder::new()
            .expiration_policy(ExpirationPolicy::default().with_interval(Duration::ZERO))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "expiration_interval"));

        let err = RegistryBuilder::new()
            .expiration_policy(ExpirationPolicy::default().with_interval(Duration::ZERO))
            .disable_sweep()
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_from_config() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            default_engine: Some(MEMORY_ENGINE_ID.into()),
            tmp_dir: Some(tmp.path().display().to_string()),
            pool: Some(PoolConfig {
                expiration_interval_secs: Some(90),
                max_idle_retention_secs: None,
                disable_sweep: Some(true),
            }),
            ..Default::default()
        };
        let registry = RegistryBuilder::from_config(&config).build().unwrap();
        assert_eq!(registry.default_engine().as_str(), MEMORY_ENGINE_ID);
        assert!(registry.tmp_dir().starts_with(tmp.path()));
        assert_eq!(registry.pool().policy().interval, Duration::from_secs(90));
    }
}
