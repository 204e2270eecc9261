//! Configuration merging and precedence handling.

use crate::config::loader::ConfigSource;
use crate::config::schema::{Config, CredentialEntry, PoolConfig};

/// Merges configuration sources according to precedence rules.
///
/// # Examples
///
/// ```
/// use dbireg::config::{Config, ConfigMerger};
///
/// let low = Config { default_engine: Some("memory".into()), ..Default::default() };
/// let high = Config { default_engine: Some("sqlite".into()), ..Default::default() };
///
/// let mut result = low;
/// ConfigMerger::merge_into(&mut result, &high);
/// assert_eq!(result.default_engine.as_deref(), Some("sqlite"));
/// ```
pub struct ConfigMerger;

impl ConfigMerger {
    /// Merge sources given from lowest to highest precedence.
    #[must_use]
    pub fn merge(sources: Vec<ConfigSource>) -> Config {
        let mut result = Config::default();
        for source in sources {
            Self::merge_into(&mut result, &source.config);
        }
        result
    }

    /// Merge `source` into `target`, `source` winning.
    ///
    /// # Merging Rules
    ///
    /// - Simple fields: source overwrites if set
    /// - Pool config: field-by-field merge
    /// - Credentials: accumulated, a later entry for the same URL replaces
    ///   the earlier one
    pub fn merge_into(target: &mut Config, source: &Config) {
        if source.default_engine.is_some() {
            target.default_engine.clone_from(&source.default_engine);
        }

        if source.session_db.is_some() {
            target.session_db.clone_from(&source.session_db);
        }

        if source.tmp_dir.is_some() {
            target.tmp_dir.clone_from(&source.tmp_dir);
        }

        if source.busy_timeout_ms.is_some() {
            target.busy_timeout_ms = source.busy_timeout_ms;
        }

        if let Some(ref source_pool) = source.pool {
            target.pool = Some(match &target.pool {
                Some(target_pool) => Self::merge_pool(target_pool, source_pool),
                None => source_pool.clone(),
            });
        }

        if let Some(ref source_creds) = source.credentials {
            let merged = target.credentials.get_or_insert_with(Vec::new);
            Self::merge_credentials(merged, source_creds);
        }
    }

    fn merge_pool(target: &PoolConfig, source: &PoolConfig) -> PoolConfig {
        PoolConfig {
            expiration_interval_secs: source
                .expiration_interval_secs
                .or(target.expiration_interval_secs),
            max_idle_retention_secs: source
                .max_idle_retention_secs
                .or(target.max_idle_retention_secs),
            disable_sweep: source.disable_sweep.or(target.disable_sweep),
        }
    }

    fn merge_credentials(target: &mut Vec<CredentialEntry>, source: &[CredentialEntry]) {
        for entry in source {
            match target.iter_mut().find(|e| e.url == entry.url) {
                Some(existing) => *existing = entry.clone(),
                None => target.push(entry.clone()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn cred(url: &str, login: &str) -> CredentialEntry {
        CredentialEntry {
            url: url.into(),
            login: Some(login.into()),
            password: None,
        }
    }

    #[test]
    fn test_merge_pool_field_by_field() {
        let mut target = Config {
            pool: Some(PoolConfig {
                expiration_interval_secs: Some(60),
                max_idle_retention_secs: Some(600),
                disable_sweep: None,
            }),
            ..Default::default()
        };
        let source = Config {
            pool: Some(PoolConfig {
                expiration_interval_secs: Some(120),
                disable_sweep: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };
        ConfigMerger::merge_into(&mut target, &source);
        assert_eq!(
            target.pool,
            Some(PoolConfig {
                expiration_interval_secs: Some(120),
                max_idle_retention_secs: Some(600),
                disable_sweep: Some(true),
            })
        );
    }

    #[test]
    fn test_merge_credentials_by_url() {
        let mut target = Config {
            credentials: Some(vec![cred("a", "alice"), cred("b", "bob")]),
            ..Default::default()
        };
        let source = Config {
            credentials: Some(vec![cred("b", "bea"), cred("c", "carol")]),
            ..Default::default()
        };
        ConfigMerger::merge_into(&mut target, &source);
        let logins: Vec<_> = target
            .credentials
            .unwrap()
            .into_iter()
            .map(|c| c.login.unwrap())
            .collect();
        assert_eq!(logins, vec!["alice", "bea", "carol"]);
    }

    #[test]
    fn test_merge_sources_in_order() {
        let sources = vec![
            ConfigSource {
                path: PathBuf::from("user.yaml"),
                precedence: 1,
                config: Config {
                    session_db: Some("/a".into()),
                    tmp_dir: Some("/tmp".into()),
                    ..Default::default()
                },
            },
            ConfigSource {
                path: PathBuf::from("explicit.yaml"),
                precedence: 2,
                config: Config {
                    session_db: Some("/b".into()),
                    ..Default::default()
                },
            },
        ];
        let merged = ConfigMerger::merge(sources);
        assert_eq!(merged.session_db.as_deref(), Some("/b"));
        assert_eq!(merged.tmp_dir.as_deref(), Some("/tmp"));
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn pool_strategy() -> impl Strategy<Value = PoolConfig> {
        (
            prop::option::of(1u64..100_000),
            prop::option::of(1u64..100_000),
            prop::option::of(any::<bool>()),
        )
            .prop_map(|(interval, retention, disable)| PoolConfig {
                expiration_interval_secs: interval,
                max_idle_retention_secs: retention,
                disable_sweep: disable,
            })
    }

    fn config_strategy() -> impl Strategy<Value = Config> {
        (
            prop::option::of("[a-z]{1,12}"),
            prop::option::of("/[a-z]{1,12}"),
            prop::option::of(1u64..60_000),
            prop::option::of(pool_strategy()),
        )
            .prop_map(|(engine, session_db, timeout, pool)| Config {
                default_engine: engine,
                session_db,
                busy_timeout_ms: timeout,
                pool,
                ..Default::default()
            })
    }

    proptest! {
        #[test]
        fn prop_higher_precedence_wins(low in config_strategy(), high in config_strategy()) {
            let mut merged = low.clone();
            ConfigMerger::merge_into(&mut merged, &high);

            prop_assert_eq!(
                merged.default_engine,
                high.default_engine.or(low.default_engine)
            );
            prop_assert_eq!(merged.session_db, high.session_db.or(low.session_db));
            prop_assert_eq!(merged.busy_timeout_ms, high.busy_timeout_ms.or(low.busy_timeout_ms));

            let low_interval = low.pool.as_ref().and_then(|p| p.expiration_interval_secs);
            let high_interval = high.pool.as_ref().and_then(|p| p.expiration_interval_secs);
            prop_assert_eq!(
                merged.pool.and_then(|p| p.expiration_interval_secs),
                high_interval.or(low_interval)
            );
        }

        #[test]
        fn prop_merge_with_empty_is_identity(config in config_strategy()) {
            let mut merged = config.clone();
            ConfigMerger::merge_into(&mut merged, &Config::default());
            prop_assert_eq!(&merged, &config);

            let mut from_empty = Config::default();
            ConfigMerger::merge_into(&mut from_empty, &config);
            prop_assert_eq!(from_empty, config);
        }
    }
}
