//! Common test utilities for integration tests.
//!
//! [`CountingFactory`] is an engine that records how many handles were
//! created, initialized and shut down, so tests can tell destroyed handles
//! from suspended ones without a real database.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use dbireg::{
    Dbi, DbiFactory, DbiRef, DbiRegistry, EngineId, Error, InitProperties, ReleasePolicy, Result,
};

/// Counters shared between a [`CountingFactory`] and its handles.
#[derive(Debug, Default)]
pub struct Counters {
    pub created: AtomicUsize,
    pub initialized: AtomicUsize,
    pub shut_down: AtomicUsize,
    pub fail_init: AtomicBool,
    pub fail_shutdown: AtomicBool,
}

#[allow(dead_code)]
impl Counters {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn initialized(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn shut_down(&self) -> usize {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Handles initialized and not yet shut down.
    pub fn live(&self) -> usize {
        self.initialized() - self.shut_down()
    }

    pub fn set_fail_init(&self, fail: bool) {
        self.fail_init.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_shutdown(&self, fail: bool) {
        self.fail_shutdown.store(fail, Ordering::SeqCst);
    }
}

/// A fake engine whose handles only count lifecycle calls.
#[derive(Debug)]
pub struct CountingFactory {
    id: EngineId,
    policy: ReleasePolicy,
    thread_scoped: bool,
    file_backed: bool,
    pub counters: Arc<Counters>,
}

#[allow(dead_code)]
impl CountingFactory {
    /// An exclusive engine: idle handles are destroyed.
    pub fn exclusive(id: &str) -> Self {
        Self {
            id: EngineId::from(id),
            policy: ReleasePolicy::Destroy,
            thread_scoped: false,
            file_backed: false,
            counters: Arc::default(),
        }
    }

    /// A shareable engine: idle handles are suspended.
    pub fn shareable(id: &str) -> Self {
        Self {
            id: EngineId::from(id),
            policy: ReleasePolicy::Suspend,
            thread_scoped: false,
            file_backed: false,
            counters: Arc::default(),
        }
    }

    /// A shareable engine with one connection per thread.
    pub fn per_thread(id: &str) -> Self {
        Self {
            thread_scoped: true,
            ..Self::shareable(id)
        }
    }

    /// An exclusive engine whose tmp databases are created on allocation.
    pub fn file_backed(id: &str) -> Self {
        Self {
            file_backed: true,
            ..Self::exclusive(id)
        }
    }
}

impl DbiFactory for CountingFactory {
    fn engine_id(&self) -> EngineId {
        self.id.clone()
    }

    fn create_dbi(&self) -> Box<dyn Dbi> {
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Box::new(CountingDbi {
            counters: Arc::clone(&self.counters),
            open: false,
        })
    }

    fn resolve_url(&self, dbi_id: &str) -> Result<String> {
        Ok(format!("counting://{dbi_id}"))
    }

    fn release_policy(&self) -> ReleasePolicy {
        self.policy
    }

    fn thread_scoped(&self) -> bool {
        self.thread_scoped
    }

    fn file_backed(&self) -> bool {
        self.file_backed
    }
}

#[derive(Debug)]
struct CountingDbi {
    counters: Arc<Counters>,
    open: bool,
}

impl Dbi for CountingDbi {
    fn init(&mut self, _dbi_ref: &DbiRef, props: &InitProperties) -> Result<()> {
        if self.counters.fail_init.load(Ordering::SeqCst) {
            return Err(Error::engine_open(
                props.url.clone(),
                std::io::Error::other("init failure requested by test"),
            ));
        }
        self.counters.initialized.fetch_add(1, Ordering::SeqCst);
        self.open = true;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.counters.fail_shutdown.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other(
                "shutdown failure requested by test",
            )));
        }
        if self.open {
            self.open = false;
            self.counters.shut_down.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A registry with the built-in engines plus `factory`, and no sweep thread.
#[allow(dead_code)]
pub fn registry_with(factory: CountingFactory) -> (DbiRegistry, Arc<Counters>) {
    let counters = Arc::clone(&factory.counters);
    let registry = DbiRegistry::builder()
        .factory(Arc::new(factory))
        .disable_sweep()
        .build()
        .expect("registry");
    (registry, counters)
}
