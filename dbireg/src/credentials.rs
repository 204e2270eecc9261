//! Credential lookup for engines that authenticate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Login and password for one database URL. Absent fields are omitted from
/// the engine's init properties.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Login name.
    pub login: Option<String>,
    /// Password.
    pub password: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Source of credentials, keyed by resolved URL.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStore: Send + Sync {
    /// Returns the credentials stored for `url`, empty if there are none.
    fn lookup(&self, url: &str) -> Credentials;
}

/// A store that never has credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialStore for NoCredentials {
    fn lookup(&self, _url: &str) -> Credentials {
        Credentials::default()
    }
}

/// A fixed in-memory credential map, usually filled from configuration.
///
/// # Examples
///
/// ```
/// use dbireg::{CredentialStore, Credentials, StaticCredentialStore};
///
/// let mut store = StaticCredentialStore::default();
/// store.insert("db.example:3306/lab", Credentials {
///     login: Some("lab".into()),
///     password: None,
/// });
/// assert_eq!(store.lookup("db.example:3306/lab").login.as_deref(), Some("lab"));
/// assert_eq!(store.lookup("elsewhere"), Credentials::default());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    entries: HashMap<String, Credentials>,
}

impl StaticCredentialStore {
    /// Adds or replaces the entry for `url`.
    pub fn insert(&mut self, url: impl Into<String>, credentials: Credentials) {
        self.entries.insert(url.into(), credentials);
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CredentialStore for StaticCredentialStore {
    fn lookup(&self, url: &str) -> Credentials {
        self.entries.get(url).cloned().unwrap_or_default()
    }
}
