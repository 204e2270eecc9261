//! Pluggable engine factories and the catalog they are registered in.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::dbi::{Dbi, EngineId};
use crate::error::{Error, Result};

/// What the pool does with a handle once its last opener releases it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// Shut the handle down immediately. Used by single-writer engines where
    /// an idle connection would keep the database locked.
    Destroy,
    /// Keep the handle in the suspended pool for cheap reuse.
    Suspend,
}

impl fmt::Display for ReleasePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Destroy => write!(f, "destroy"),
            Self::Suspend => write!(f, "suspend"),
        }
    }
}

/// Constructor for one engine kind.
///
/// Only `engine_id`, `create_dbi` and `resolve_url` are required; the other
/// methods describe how the pool shares handles of this engine.
pub trait DbiFactory: Send + Sync {
    /// The engine kind this factory builds.
    fn engine_id(&self) -> EngineId;

    /// Builds a new, uninitialized engine object.
    fn create_dbi(&self) -> Box<dyn Dbi>;

    /// Resolves a raw identity to its canonical URL or path form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] for identities the engine cannot
    /// address.
    fn resolve_url(&self, dbi_id: &str) -> Result<String>;

    /// Disposition of a handle whose last opener released it.
    fn release_policy(&self) -> ReleasePolicy {
        ReleasePolicy::Suspend
    }

    /// Whether connections are bound to the thread that opened them.
    fn thread_scoped(&self) -> bool {
        false
    }

    /// Whether a tmp database of this engine lives in a file that must be
    /// created up front.
    fn file_backed(&self) -> bool {
        false
    }

    /// Key that deduplicates active handles for `url`.
    ///
    /// Thread-scoped engines get one key per calling thread, so two threads
    /// opening the same database receive independent handles.
    fn connection_key(&self, url: &str) -> String {
        if self.thread_scoped() {
            format!("{url}{THREAD_KEY_SEPARATOR}{:?}", std::thread::current().id())
        } else {
            url.to_owned()
        }
    }
}

/// Separator between the URL and the thread id in thread-scoped keys.
pub const THREAD_KEY_SEPARATOR: char = '|';

/// Registered factories, keyed by engine id.
#[derive(Default)]
pub struct FactoryCatalog {
    factories: RwLock<HashMap<EngineId, Arc<dyn DbiFactory>>>,
}

impl FactoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under its engine id.
    ///
    /// Returns `false` and leaves the existing registration untouched if the
    /// id is already taken.
    pub fn register(&self, factory: Arc<dyn DbiFactory>) -> bool {
        let id = factory.engine_id();
        let mut factories = self.factories.write();
        if factories.contains_key(&id) {
            log::warn!("factory for engine '{id}' is already registered");
            return false;
        }
        log::trace!("registered factory for engine '{id}'");
        factories.insert(id, factory);
        true
    }

    /// Returns the factory for `id`, if any.
    #[must_use]
    pub fn get(&self, id: &EngineId) -> Option<Arc<dyn DbiFactory>> {
        self.factories.read().get(id).cloned()
    }

    /// Returns the factory for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFactory`] if nothing is registered for `id`.
    pub fn require(&self, id: &EngineId) -> Result<Arc<dyn DbiFactory>> {
        self.get(id).ok_or_else(|| Error::InvalidFactory {
            engine: id.to_string(),
        })
    }

    /// All registered engine ids, sorted.
    #[must_use]
    pub fn engine_ids(&self) -> Vec<EngineId> {
        let mut ids: Vec<_> = self.factories.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl fmt::Debug for FactoryCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryCatalog")
            .field("engines", &self.engine_ids())
            .finish()
    }
}
