//! Pool of opened database handles.
//!
//! The pool deduplicates open handles by canonical id (the resolved URL, plus
//! the thread id for thread-scoped engines) and counts openers. When the last
//! opener releases a handle, the engine's [`ReleasePolicy`] decides whether
//! it is destroyed or suspended for reuse. Suspended handles are expired by
//! [`DbiPool::check_expiration`], usually driven by an [`ExpirationTimer`].
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use dbireg::{DbiPool, DbiRef, FactoryCatalog};
//! use dbireg::engines::{register_builtin_engines, DEFAULT_BUSY_TIMEOUT};
//!
//! let catalog = Arc::new(FactoryCatalog::new());
//! register_builtin_engines(&catalog, DEFAULT_BUSY_TIMEOUT);
//! let pool = DbiPool::new(catalog);
//!
//! let dbi_ref = DbiRef::new("pool_doc_example", "memory");
//! let first = pool.open(&dbi_ref, true).unwrap();
//! pool.release(&first).unwrap();
//!
//! // The in-memory engine is shareable: the handle was suspended, not destroyed.
//! let again = pool.open(&dbi_ref, true).unwrap();
//! assert_eq!(first.id(), again.id());
//! pool.release(&again).unwrap();
//! ```

mod expiration;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

pub use expiration::{
    ActiveRefSource, ExpirationPolicy, ExpirationTimer, DEFAULT_EXPIRATION_INTERVAL,
};

use crate::credentials::{CredentialStore, NoCredentials};
use crate::dbi::{DbiHandle, DbiRef, HandleId, InitProperties};
use crate::error::{Error, Result};
use crate::factory::{DbiFactory, FactoryCatalog, ReleasePolicy};

struct ActiveEntry {
    handle: DbiHandle,
    url: String,
    openers: i64,
}

struct SuspendedDbi {
    handle: DbiHandle,
    suspended_at: Instant,
}

#[derive(Default)]
struct PoolState {
    active: HashMap<String, ActiveEntry>,
    keys: HashMap<HandleId, String>,
    suspended: HashMap<DbiRef, Vec<SuspendedDbi>>,
}

impl PoolState {
    fn take_suspended(&mut self, dbi_ref: &DbiRef) -> Option<DbiHandle> {
        let queue = self.suspended.get_mut(dbi_ref)?;
        let revived = if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0).handle)
        };
        if queue.is_empty() {
            self.suspended.remove(dbi_ref);
        }
        revived
    }
}

/// Reference-counting cache of opened handles.
pub struct DbiPool {
    catalog: Arc<FactoryCatalog>,
    credentials: Arc<dyn CredentialStore>,
    policy: ExpirationPolicy,
    state: Mutex<PoolState>,
}

impl DbiPool {
    /// Creates a pool with no credentials and the default expiration policy.
    #[must_use]
    pub fn new(catalog: Arc<FactoryCatalog>) -> Self {
        Self::with_options(catalog, Arc::new(NoCredentials), ExpirationPolicy::default())
    }

    /// Creates a pool with an explicit credential store and expiration policy.
    #[must_use]
    pub fn with_options(
        catalog: Arc<FactoryCatalog>,
        credentials: Arc<dyn CredentialStore>,
        policy: ExpirationPolicy,
    ) -> Self {
        Self {
            catalog,
            credentials,
            policy,
            state: Mutex::new(PoolState::default()),
        }
    }

    /// The expiration policy in effect.
    #[must_use]
    pub const fn policy(&self) -> &ExpirationPolicy {
        &self.policy
    }

    /// The factory catalog the pool builds handles from.
    #[must_use]
    pub fn catalog(&self) -> &Arc<FactoryCatalog> {
        &self.catalog
    }

    /// Opens `dbi_ref`, reusing an active or suspended handle when possible.
    ///
    /// Every successful call must be matched by one [`DbiPool::release`].
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidIdentity`] if the identity is empty or unresolvable
    /// - [`Error::InvalidFactory`] if the engine is not registered
    /// - [`Error::EngineOpen`] if a new connection cannot be initialized;
    ///   nothing is registered in that case
    pub fn open(&self, dbi_ref: &DbiRef, create: bool) -> Result<DbiHandle> {
        if dbi_ref.dbi_id.is_empty() {
            return Err(Error::InvalidIdentity {
                identity: String::new(),
                reason: "database id is empty".into(),
            });
        }
        let factory = self.catalog.require(&dbi_ref.engine)?;
        let url = factory.resolve_url(&dbi_ref.dbi_id)?;
        let key = factory.connection_key(&url);

        let mut state = self.state.lock();

        if let Some(entry) = state.active.get_mut(&key) {
            entry.openers += 1;
            log::trace!("reusing {} for {dbi_ref} ({} openers)", entry.handle.id(), entry.openers);
            return Ok(entry.handle.clone());
        }

        let handle = if let Some(handle) = state.take_suspended(dbi_ref) {
            log::trace!("revived suspended {} for {dbi_ref}", handle.id());
            handle
        } else {
            let handle = self.create_handle(factory.as_ref(), dbi_ref, url.clone(), create)?;
            log::trace!("opened {} for {dbi_ref}", handle.id());
            handle
        };

        state.keys.insert(handle.id(), key.clone());
        state.active.insert(
            key,
            ActiveEntry {
                handle: handle.clone(),
                url,
                openers: 1,
            },
        );
        Ok(handle)
    }

    /// Registers one more opener of an already open handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the handle is not active in this pool.
    pub fn add_ref(&self, handle: &DbiHandle) -> Result<()> {
        let mut state = self.state.lock();
        let entry = Self::active_entry(&mut state, handle)?;

        if entry.openers <= 0 {
            debug_assert!(false, "invalid opener counter for {}", handle.id());
            log::error!(
                "invalid opener counter {} for {} ({})",
                entry.openers,
                handle.id(),
                handle.dbi_ref()
            );
            return Ok(());
        }
        entry.openers += 1;
        Ok(())
    }

    /// Releases one opener. The last release destroys or suspends the handle
    /// according to the engine's [`ReleasePolicy`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the handle is not active in this pool,
    /// or the engine's error if destroying the handle fails.
    pub fn release(&self, handle: &DbiHandle) -> Result<()> {
        let mut state = self.state.lock();
        let entry = Self::active_entry(&mut state, handle)?;

        entry.openers -= 1;
        if entry.openers > 0 {
            return Ok(());
        }
        if entry.openers < 0 {
            debug_assert!(false, "opener counter went negative for {}", handle.id());
            log::error!("opener counter went negative for {}", handle.id());
        }

        if let Some(key) = state.keys.remove(&handle.id()) {
            state.active.remove(&key);
        }

        match self.release_policy(handle.dbi_ref()) {
            ReleasePolicy::Destroy => {
                drop(state);
                log::trace!("destroying {} ({})", handle.id(), handle.dbi_ref());
                handle.shutdown()
            }
            ReleasePolicy::Suspend => {
                log::trace!("suspending {} ({})", handle.id(), handle.dbi_ref());
                state
                    .suspended
                    .entry(handle.dbi_ref().clone())
                    .or_default()
                    .push(SuspendedDbi {
                        handle: handle.clone(),
                        suspended_at: Instant::now(),
                    });
                Ok(())
            }
        }
    }

    /// Destroys every open handle to `dbi_ref`: all active entries for its
    /// URL (one per thread for thread-scoped engines) and its suspended
    /// handles.
    ///
    /// Returns how many opener references were still outstanding.
    ///
    /// # Errors
    ///
    /// Returns an error if the ref cannot be resolved. Failures to shut a
    /// handle down are logged and the first one is returned after every
    /// handle has been processed.
    pub fn close_all(&self, dbi_ref: &DbiRef) -> Result<usize> {
        let factory = self.catalog.require(&dbi_ref.engine)?;
        let url = factory.resolve_url(&dbi_ref.dbi_id)?;

        let mut doomed = Vec::new();
        let mut outstanding = 0_usize;
        {
            let mut state = self.state.lock();
            let keys: Vec<String> = state
                .active
                .iter()
                .filter(|(_, e)| e.url == url && e.handle.dbi_ref().engine == dbi_ref.engine)
                .map(|(k, _)| k.clone())
                .collect();
            for key in keys {
                if let Some(entry) = state.active.remove(&key) {
                    state.keys.remove(&entry.handle.id());
                    outstanding += usize::try_from(entry.openers).unwrap_or(0);
                    doomed.push(entry.handle);
                }
            }
            if let Some(queue) = state.suspended.remove(dbi_ref) {
                doomed.extend(queue.into_iter().map(|s| s.handle));
            }
        }

        log::trace!(
            "closing all connections to {dbi_ref}: {} handle(s), {outstanding} active reference(s)",
            doomed.len()
        );

        let mut first_err = None;
        for handle in doomed {
            if let Err(e) = handle.shutdown() {
                log::error!("failed to close {} ({dbi_ref}): {e}", handle.id());
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(outstanding), Err)
    }

    /// Runs one expiration sweep now. See [`DbiPool::check_expiration_at`].
    pub fn check_expiration(&self, in_use: &HashSet<DbiRef>) -> usize {
        self.check_expiration_at(Instant::now(), in_use)
    }

    /// Runs one expiration sweep as of `now`.
    ///
    /// For each ref, oldest handles first: a handle that is the only one left
    /// for its ref is kept; any other handle is destroyed once it is older than
    /// the expiration interval or its ref is not in `in_use`. With a
    /// `max_idle_retention` bound, a sole handle whose ref is not in use is
    /// also destroyed once it reaches that age.
    ///
    /// Returns the number of handles destroyed. Shutdown failures are logged.
    pub fn check_expiration_at(&self, now: Instant, in_use: &HashSet<DbiRef>) -> usize {
        let mut state = self.state.lock();
        let mut destroyed = 0;

        state.suspended.retain(|dbi_ref, queue| {
            queue.sort_by_key(|s| s.suspended_at);
            let referenced = in_use.contains(dbi_ref);

            let mut i = 0;
            while i < queue.len() {
                let age = now.saturating_duration_since(queue[i].suspended_at);
                let expire = if queue.len() == 1 {
                    !referenced
                        && self
                            .policy
                            .max_idle_retention
                            .is_some_and(|bound| age >= bound)
                } else {
                    age >= self.policy.interval || !referenced
                };

                if expire {
                    let victim = queue.remove(i);
                    log::trace!("expiring suspended {} ({dbi_ref})", victim.handle.id());
                    if let Err(e) = victim.handle.shutdown() {
                        log::error!("failed to expire {} ({dbi_ref}): {e}", victim.handle.id());
                    }
                    destroyed += 1;
                } else {
                    i += 1;
                }
            }
            !queue.is_empty()
        });

        destroyed
    }

    /// Starts a background thread running [`DbiPool::check_expiration`] every
    /// policy interval until the returned timer is dropped.
    ///
    /// `source` is asked for the refs in use before each sweep takes the pool
    /// lock. Without a source every ref counts as unused.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn start_expiration_timer(
        self: &Arc<Self>,
        source: Option<Arc<dyn ActiveRefSource>>,
    ) -> Result<ExpirationTimer> {
        ExpirationTimer::spawn(Arc::downgrade(self), source, self.policy.interval)
    }

    /// Number of active (opened and not yet fully released) handles.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    /// Number of suspended handles held for `dbi_ref`.
    #[must_use]
    pub fn suspended_count(&self, dbi_ref: &DbiRef) -> usize {
        self.state.lock().suspended.get(dbi_ref).map_or(0, Vec::len)
    }

    /// Total number of suspended handles.
    #[must_use]
    pub fn suspended_total(&self) -> usize {
        self.state.lock().suspended.values().map(Vec::len).sum()
    }

    /// Current opener count of `handle`, or `None` if it is not active.
    #[must_use]
    pub fn openers(&self, handle: &DbiHandle) -> Option<usize> {
        let state = self.state.lock();
        let key = state.keys.get(&handle.id())?;
        state
            .active
            .get(key)
            .and_then(|e| usize::try_from(e.openers).ok())
    }

    fn active_entry<'a>(state: &'a mut PoolState, handle: &DbiHandle) -> Result<&'a mut ActiveEntry> {
        let not_found = || Error::NotFound {
            resource: format!("pooled handle {} for {}", handle.id(), handle.dbi_ref()),
        };
        let key = state.keys.get(&handle.id()).ok_or_else(not_found)?;
        state.active.get_mut(key).ok_or_else(not_found)
    }

    fn release_policy(&self, dbi_ref: &DbiRef) -> ReleasePolicy {
        self.catalog
            .get(&dbi_ref.engine)
            .map_or(ReleasePolicy::Destroy, |f| f.release_policy())
    }

    fn create_handle(
        &self,
        factory: &dyn DbiFactory,
        dbi_ref: &DbiRef,
        url: String,
        create: bool,
    ) -> Result<DbiHandle> {
        let credentials = self.credentials.lookup(&url);
        let props = InitProperties {
            url: url.clone(),
            create,
            login: credentials.login,
            password: credentials.password,
        };

        let mut dbi = factory.create_dbi();
        dbi.init(dbi_ref, &props)?;
        Ok(DbiHandle::new(dbi_ref.clone(), url, dbi))
    }
}

impl fmt::Debug for DbiPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DbiPool")
            .field("active", &state.active.len())
            .field("suspended", &state.suspended.values().map(Vec::len).sum::<usize>())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Drop for DbiPool {
    fn drop(&mut self) {
        let state = std::mem::take(self.state.get_mut());

        for entry in state.active.into_values() {
            log::warn!(
                "pool dropped with {} still open by {} opener(s)",
                entry.handle.dbi_ref(),
                entry.openers
            );
            if let Err(e) = entry.handle.shutdown() {
                log::error!("failed to close {}: {e}", entry.handle.id());
            }
        }
        for suspended in state.suspended.into_values().flatten() {
            if let Err(e) = suspended.handle.shutdown() {
                log::error!("failed to close suspended {}: {e}", suspended.handle.id());
            }
        }
    }
}
