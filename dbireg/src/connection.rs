//! Scoped pool connections.
//!
//! A [`DbiConnection`] opens a handle from the pool and releases it when
//! dropped, so counters cannot leak on early returns or `?`.

use std::sync::Arc;

use crate::dbi::{DbiHandle, DbiRef};
use crate::error::Result;
use crate::pool::DbiPool;

/// A pool handle released on drop.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use dbireg::{DbiConnection, DbiPool, DbiRef, FactoryCatalog};
/// use dbireg::engines::{register_builtin_engines, DEFAULT_BUSY_TIMEOUT};
///
/// let catalog = Arc::new(FactoryCatalog::new());
/// register_builtin_engines(&catalog, DEFAULT_BUSY_TIMEOUT);
/// let pool = Arc::new(DbiPool::new(catalog));
///
/// {
///     let con = DbiConnection::open(&pool, &DbiRef::new("doc_connection", "memory"), true).unwrap();
///     assert_eq!(pool.openers(con.dbi()), Some(1));
/// }
/// assert_eq!(pool.active_count(), 0);
/// ```
#[derive(Debug)]
pub struct DbiConnection {
    pool: Arc<DbiPool>,
    dbi: DbiHandle,
    released: bool,
}

impl DbiConnection {
    /// Opens `dbi_ref` through `pool`.
    ///
    /// # Errors
    ///
    /// Returns any error from [`DbiPool::open`].
    pub fn open(pool: &Arc<DbiPool>, dbi_ref: &DbiRef, create: bool) -> Result<Self> {
        let dbi = pool.open(dbi_ref, create)?;
        Ok(Self {
            pool: Arc::clone(pool),
            dbi,
            released: false,
        })
    }

    /// The open handle.
    #[must_use]
    pub const fn dbi(&self) -> &DbiHandle {
        &self.dbi
    }

    /// The reference the connection was opened for.
    #[must_use]
    pub const fn dbi_ref(&self) -> &DbiRef {
        self.dbi.dbi_ref()
    }

    /// Releases the handle now, surfacing a release failure instead of
    /// logging it.
    ///
    /// # Errors
    ///
    /// Returns any error from [`DbiPool::release`].
    pub fn close(mut self) -> Result<()> {
        self.released = true;
        self.pool.release(&self.dbi)
    }
}

impl Drop for DbiConnection {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.pool.release(&self.dbi) {
            log::error!("failed to release {} ({}): {e}", self.dbi.id(), self.dbi.dbi_ref());
        }
    }
}

/// Whether `dbi_ref` names a database that can actually be opened.
///
/// The probe connection is released before returning.
#[must_use]
pub fn is_connectable(pool: &Arc<DbiPool>, dbi_ref: &DbiRef, create: bool) -> bool {
    match DbiConnection::open(pool, dbi_ref, create) {
        Ok(_con) => true,
        Err(e) => {
            log::debug!("{dbi_ref} is not connectable: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::{register_builtin_engines, DEFAULT_BUSY_TIMEOUT, SQLITE_ENGINE_ID};
    use crate::FactoryCatalog;
    use tempfile::tempdir;

    fn pool() -> Arc<DbiPool> {
        let catalog = Arc::new(FactoryCatalog::new());
        register_builtin_engines(&catalog, DEFAULT_BUSY_TIMEOUT);
        Arc::new(DbiPool::new(catalog))
    }

    fn sqlite_ref(dir: &std::path::Path, name: &str) -> DbiRef {
        DbiRef::new(dir.join(name).display().to_string(), SQLITE_ENGINE_ID)
    }

    #[test]
    fn test_released_on_error_path() {
        fn failing(pool: &Arc<DbiPool>, dbi_ref: &DbiRef) -> Result<()> {
            let _con = DbiConnection::open(pool, dbi_ref, true)?;
            Err(crate::Error::NotFound {
                resource: "something later".into(),
            })
        }

        let dir = tempdir().unwrap();
        let pool = pool();
        assert!(failing(&pool, &sqlite_ref(dir.path(), "a.db")).is_err());
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_close_releases() {
        let dir = tempdir().unwrap();
        let pool = pool();
        let con = DbiConnection::open(&pool, &sqlite_ref(dir.path(), "a.db"), true).unwrap();
        let handle = con.dbi().clone();
        con.close().unwrap();
        assert!(!handle.is_open());
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_is_connectable() {
        let dir = tempdir().unwrap();
        let pool = pool();
        let missing = sqlite_ref(dir.path(), "missing.db");
        assert!(!is_connectable(&pool, &missing, false));
        assert!(is_connectable(&pool, &missing, true));
        assert!(is_connectable(&pool, &missing, false));
        assert_eq!(pool.active_count(), 0);

        let garbage = dir.path().join("garbage.db");
        std::fs::write(&garbage, vec![0x5A_u8; 4096]).unwrap();
        assert!(!is_connectable(
            &pool,
            &DbiRef::new(garbage.display().to_string(), SQLITE_ENGINE_ID),
            false
        ));
    }
}
