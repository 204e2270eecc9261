use crate::dbi::{DbiRef, EngineId};
use crate::error::Result;

use super::DbiRegistry;

/// An attachment to a tmp database, detached on drop.
///
/// # Examples
///
/// ```
/// use dbireg::{DbiRegistry, TmpDbiHandle};
///
/// let registry = DbiRegistry::builder().disable_sweep().build().unwrap();
/// {
///     let handle = TmpDbiHandle::new(&registry, "alignment").unwrap();
///     assert_eq!(registry.tmp_dbi_users("alignment"), Some(1));
///     assert!(std::path::Path::new(&handle.dbi_ref().dbi_id).exists());
/// }
/// assert_eq!(registry.tmp_dbi_users("alignment"), None);
/// ```
#[derive(Debug)]
pub struct TmpDbiHandle<'a> {
    registry: &'a DbiRegistry,
    alias: String,
    dbi_ref: DbiRef,
}

impl<'a> TmpDbiHandle<'a> {
    /// Attaches to `alias` with the registry's default engine.
    ///
    /// # Errors
    ///
    /// Returns any error from [`DbiRegistry::attach_tmp_dbi`].
    pub fn new(registry: &'a DbiRegistry, alias: &str) -> Result<Self> {
        let engine = registry.default_engine().clone();
        Self::with_engine(registry, alias, &engine)
    }

    /// Attaches to `alias`, creating it with `engine` if needed.
    ///
    /// # Errors
    ///
    /// Returns any error from [`DbiRegistry::attach_tmp_dbi_with`].
    pub fn with_engine(registry: &'a DbiRegistry, alias: &str, engine: &EngineId) -> Result<Self> {
        let dbi_ref = registry.attach_tmp_dbi_with(alias, engine)?;
        Ok(Self {
            registry,
            alias: alias.to_owned(),
            dbi_ref,
        })
    }

    /// The attached alias.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The attached database.
    #[must_use]
    pub const fn dbi_ref(&self) -> &DbiRef {
        &self.dbi_ref
    }
}

impl Drop for TmpDbiHandle<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.registry.detach_tmp_dbi(&self.alias) {
            log::error!("failed to detach tmp dbi '{}': {e}", self.alias);
        }
    }
}
