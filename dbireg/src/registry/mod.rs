//! Registry of engine factories and named tmp databases.
//!
//! A tmp database is addressed by a short alias and reference counted by
//! [`DbiRegistry::attach_tmp_dbi`] / [`DbiRegistry::detach_tmp_dbi`]. When the
//! count reaches zero every connection to it is closed and its backing file
//! is deleted. The `"session"` alias is reserved for the database of the
//! current application run; the registry keeps a dedicated connection to it
//! once it has been attached.

mod builder;
mod handle;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

pub use builder::RegistryBuilder;
pub use handle::TmpDbiHandle;

use crate::connection::{is_connectable, DbiConnection};
use crate::dbi::{DbiRef, EngineId};
use crate::error::{Error, Result};
use crate::factory::{DbiFactory, FactoryCatalog};
use crate::pool::{DbiPool, ExpirationTimer};
use crate::tmp_area::{TmpArea, TMP_DBI_EXTENSION};

/// Alias of the session database.
pub const SESSION_TMP_DBI_ALIAS: &str = "session";

/// One named tmp database in the registry catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmpDbiRef {
    /// Alias the database was attached under.
    pub alias: String,
    /// The database itself.
    pub dbi_ref: DbiRef,
    /// Number of attachments; never zero while listed.
    pub users: usize,
    /// Whether the backing file is ours to delete.
    pub disposable: bool,
}

enum SessionState {
    Uninitialized,
    Open(DbiConnection),
    ShutDown,
}

struct RegistryState {
    tmp_dbis: Vec<TmpDbiRef>,
    session: SessionState,
}

/// Owner of the factory catalog, the pool and all tmp databases.
///
/// Build one with [`DbiRegistry::builder`] and share it by reference (or
/// `Arc`) with the components that need database handles. Dropping the
/// registry releases everything it still tracks.
///
/// # Examples
///
/// ```
/// use dbireg::DbiRegistry;
///
/// let registry = DbiRegistry::builder().disable_sweep().build().unwrap();
/// let dbi_ref = registry.attach_tmp_dbi("scratch").unwrap();
/// assert!(std::path::Path::new(&dbi_ref.dbi_id).exists());
///
/// registry.detach_tmp_dbi("scratch").unwrap();
/// assert!(!std::path::Path::new(&dbi_ref.dbi_id).exists());
/// ```
pub struct DbiRegistry {
    catalog: Arc<FactoryCatalog>,
    pool: Arc<DbiPool>,
    tmp_area: TmpArea,
    default_engine: EngineId,
    session_override: Option<String>,
    state: Mutex<RegistryState>,
    timer: Option<ExpirationTimer>,
}

impl DbiRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub(crate) fn from_parts(
        catalog: Arc<FactoryCatalog>,
        pool: Arc<DbiPool>,
        tmp_area: TmpArea,
        default_engine: EngineId,
        session_override: Option<String>,
        timer: Option<ExpirationTimer>,
    ) -> Self {
        Self {
            catalog,
            pool,
            tmp_area,
            default_engine,
            session_override,
            state: Mutex::new(RegistryState {
                tmp_dbis: Vec::new(),
                session: SessionState::Uninitialized,
            }),
            timer,
        }
    }

    /// The pool backing this registry.
    #[must_use]
    pub fn pool(&self) -> &Arc<DbiPool> {
        &self.pool
    }

    /// The engine used when no engine is named.
    #[must_use]
    pub const fn default_engine(&self) -> &EngineId {
        &self.default_engine
    }

    /// The process-private directory tmp databases are created in.
    #[must_use]
    pub fn tmp_dir(&self) -> &Path {
        self.tmp_area.path()
    }

    /// Registers a factory. Returns `false` if its engine id is taken.
    pub fn register_factory(&self, factory: Arc<dyn DbiFactory>) -> bool {
        self.catalog.register(factory)
    }

    /// The factory registered for `id`.
    #[must_use]
    pub fn factory(&self, id: &EngineId) -> Option<Arc<dyn DbiFactory>> {
        self.catalog.get(id)
    }

    /// Ids of all registered engines, sorted.
    #[must_use]
    pub fn registered_engine_ids(&self) -> Vec<EngineId> {
        self.catalog.engine_ids()
    }

    /// Attaches to the tmp database `alias` using the default engine.
    ///
    /// # Errors
    ///
    /// See [`DbiRegistry::attach_tmp_dbi_with`].
    pub fn attach_tmp_dbi(&self, alias: &str) -> Result<DbiRef> {
        let engine = self.default_engine.clone();
        self.attach_tmp_dbi_with(alias, &engine)
    }

    /// Attaches to the tmp database `alias`, creating it with `engine` on
    /// first use. Later attachments return the same ref whatever engine they
    /// name.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidFactory`] if `engine` is not registered
    /// - [`Error::Allocation`] if no backing location can be prepared
    /// - [`Error::EngineOpen`] if the backing database cannot be created or
    ///   the session connection cannot be opened
    pub fn attach_tmp_dbi_with(&self, alias: &str, engine: &EngineId) -> Result<DbiRef> {
        let mut state = self.state.lock();

        if let Some(entry) = state.tmp_dbis.iter_mut().find(|r| r.alias == alias) {
            entry.users += 1;
            return Ok(entry.dbi_ref.clone());
        }

        log::trace!("allocating a tmp dbi with alias: {alias}");
        let mut entry = self.allocate_tmp_dbi(alias, engine)?;
        log::trace!("allocated tmp dbi: {}", entry.dbi_ref.dbi_id);

        if alias == SESSION_TMP_DBI_ALIAS && matches!(state.session, SessionState::Uninitialized) {
            match DbiConnection::open(&self.pool, &entry.dbi_ref, false) {
                Ok(con) => {
                    state.session = SessionState::Open(con);
                    entry.users += 1;
                }
                Err(e) => {
                    if let Err(cleanup) = self.deallocate_tmp_dbi(&entry) {
                        log::error!("failed to clean up tmp dbi '{alias}': {cleanup}");
                    }
                    return Err(e);
                }
            }
        }

        let dbi_ref = entry.dbi_ref.clone();
        state.tmp_dbis.push(entry);
        Ok(dbi_ref)
    }

    /// Detaches from the tmp database `alias`. The last detach closes every
    /// connection to it and deletes its backing file.
    ///
    /// An unknown alias is logged as an error and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns the first failure from closing connections or deleting the
    /// file. The alias is removed either way.
    pub fn detach_tmp_dbi(&self, alias: &str) -> Result<()> {
        let mut state = self.state.lock();

        let Some(index) = state.tmp_dbis.iter().position(|r| r.alias == alias) else {
            log::error!("the tmp dbi is not found: {alias}");
            return Ok(());
        };

        let entry = &mut state.tmp_dbis[index];
        entry.users -= 1;
        if entry.users > 0 {
            return Ok(());
        }

        let entry = state.tmp_dbis.remove(index);
        log::trace!(
            "deallocating a tmp dbi {} with alias: {}",
            entry.dbi_ref.dbi_id,
            entry.alias
        );
        self.deallocate_tmp_dbi(&entry)
    }

    /// Refs of all tmp databases currently attached.
    #[must_use]
    pub fn list_tmp_dbis(&self) -> Vec<DbiRef> {
        self.state
            .lock()
            .tmp_dbis
            .iter()
            .map(|r| r.dbi_ref.clone())
            .collect()
    }

    /// Attachment count of `alias`, or `None` if it is not attached.
    #[must_use]
    pub fn tmp_dbi_users(&self, alias: &str) -> Option<usize> {
        self.state
            .lock()
            .tmp_dbis
            .iter()
            .find(|r| r.alias == alias)
            .map(|r| r.users)
    }

    /// The session database, initializing it on first use.
    ///
    /// # Errors
    ///
    /// Returns any error from attaching the session alias.
    pub fn session_dbi_ref(&self) -> Result<DbiRef> {
        let handle = TmpDbiHandle::new(self, SESSION_TMP_DBI_ALIAS)?;
        Ok(handle.dbi_ref().clone())
    }

    /// Whether the dedicated session connection is open.
    #[must_use]
    pub fn is_session_open(&self) -> bool {
        matches!(self.state.lock().session, SessionState::Open(_))
    }

    /// Releases the dedicated session connection and returns the session
    /// database identity, so the caller can archive or remove it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the session was never opened or
    /// was already shut down, or the pool's error if releasing fails.
    pub fn shutdown_session(&self) -> Result<String> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut state.session, SessionState::ShutDown) {
            SessionState::Open(con) => {
                let dbi_id = con.dbi_ref().dbi_id.clone();
                con.close()?;
                log::trace!("session dbi shut down: {dbi_id}");
                Ok(dbi_id)
            }
            other => {
                state.session = other;
                Err(Error::NotInitialized {
                    what: "session database".into(),
                })
            }
        }
    }

    fn allocate_tmp_dbi(&self, alias: &str, engine: &EngineId) -> Result<TmpDbiRef> {
        let factory = self.catalog.require(engine)?;

        let (dbi_id, disposable) = match self.session_override_for(alias, engine) {
            Some(id) => (id, false),
            None => {
                let path = self.tmp_area.prepare_location(alias, TMP_DBI_EXTENSION)?;
                (path.display().to_string(), true)
            }
        };
        let entry = TmpDbiRef {
            alias: alias.to_owned(),
            dbi_ref: DbiRef::new(dbi_id, engine.clone()),
            users: 1,
            disposable,
        };

        if factory.file_backed() {
            // Creates the database file; the exclusive engine closes it again on release.
            if let Err(e) = DbiConnection::open(&self.pool, &entry.dbi_ref, true) {
                if let Err(cleanup) = self.remove_backing_file(&entry) {
                    log::error!("failed to clean up tmp dbi '{alias}': {cleanup}");
                }
                return Err(e);
            }
        }
        Ok(entry)
    }

    fn session_override_for(&self, alias: &str, engine: &EngineId) -> Option<String> {
        if alias != SESSION_TMP_DBI_ALIAS {
            return None;
        }
        let dbi_id = self.session_override.as_ref()?;
        let dbi_ref = DbiRef::new(dbi_id.clone(), engine.clone());
        if is_connectable(&self.pool, &dbi_ref, true) {
            Some(dbi_id.clone())
        } else {
            log::warn!("session database {dbi_id} cannot be opened, using a tmp file instead");
            None
        }
    }

    fn deallocate_tmp_dbi(&self, entry: &TmpDbiRef) -> Result<()> {
        let closed = self.pool.close_all(&entry.dbi_ref).map(|_| ());
        let removed = self.remove_backing_file(entry);
        closed.and(removed)
    }

    fn remove_backing_file(&self, entry: &TmpDbiRef) -> Result<()> {
        if !entry.disposable {
            return Ok(());
        }
        let path = Path::new(&entry.dbi_ref.dbi_id);
        if path.is_file() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl fmt::Debug for DbiRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbiRegistry")
            .field("engines", &self.catalog.engine_ids())
            .field("default_engine", &self.default_engine)
            .field("tmp_dir", &self.tmp_area.path())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl Drop for DbiRegistry {
    fn drop(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }

        let session = std::mem::replace(&mut self.state.get_mut().session, SessionState::ShutDown);
        let session_initialized = !matches!(session, SessionState::Uninitialized);
        if let SessionState::Open(con) = session {
            if let Err(e) = con.close() {
                log::error!("failed to close the session dbi: {e}");
            }
        }
        if session_initialized {
            if let Err(e) = self.detach_tmp_dbi(SESSION_TMP_DBI_ALIAS) {
                log::error!("failed to detach the session dbi: {e}");
            }
        }

        log::trace!("deallocating dbi registry");
        let leaked: Vec<String> = {
            let state = self.state.get_mut();
            for entry in &mut state.tmp_dbis {
                log::warn!(
                    "tmp dbi was not deallocated: {} {} [{}]",
                    entry.alias,
                    entry.dbi_ref.dbi_id,
                    entry.users
                );
                entry.users = 1;
            }
            state.tmp_dbis.iter().map(|r| r.alias.clone()).collect()
        };
        for alias in leaked {
            if let Err(e) = self.detach_tmp_dbi(&alias) {
                log::error!("failed to deallocate tmp dbi '{alias}': {e}");
            }
        }
    }
}
