//! Core handle types shared by the pool, the registry and the engines.
//!
//! A [`DbiRef`] names a database (an engine-specific identity plus the engine
//! kind). A [`DbiHandle`] is an opened engine object handed out by the pool;
//! clones share the same underlying connection and the same [`HandleId`].

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Identifier of a storage-engine kind.
///
/// # Examples
///
/// ```
/// use dbireg::EngineId;
///
/// let id = EngineId::from("sqlite");
/// assert_eq!(id.as_str(), "sqlite");
/// assert_eq!(id.to_string(), "sqlite");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineId(String);

impl EngineId {
    /// Creates an engine id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EngineId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for EngineId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Reference to a database: its engine-specific identity and engine kind.
///
/// Two refs are equal iff both fields are equal.
///
/// # Examples
///
/// ```
/// use dbireg::DbiRef;
///
/// let a = DbiRef::new("/tmp/a.db", "sqlite");
/// let b = DbiRef::new("/tmp/a.db", "memory");
/// assert_ne!(a, b);
/// assert_eq!(a, DbiRef::new("/tmp/a.db", "sqlite"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DbiRef {
    /// Engine-specific identity (a file path, an endpoint, a name).
    pub dbi_id: String,
    /// Engine kind that understands `dbi_id`.
    pub engine: EngineId,
}

impl DbiRef {
    /// Creates a reference.
    #[must_use]
    pub fn new(dbi_id: impl Into<String>, engine: impl Into<EngineId>) -> Self {
        Self {
            dbi_id: dbi_id.into(),
            engine: engine.into(),
        }
    }
}

impl fmt::Display for DbiRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.engine, self.dbi_id)
    }
}

/// Parameters passed to [`Dbi::init`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitProperties {
    /// Resolved URL of the database.
    pub url: String,
    /// Create the database if it does not exist.
    pub create: bool,
    /// Login from the credential store, if any.
    pub login: Option<String>,
    /// Password from the credential store, if any.
    pub password: Option<String>,
}

/// An engine-specific database connection object.
///
/// Objects are created uninitialized by a factory, then initialized once by
/// the pool. `shutdown` is called exactly once before the object is dropped.
pub trait Dbi: Send + fmt::Debug + Any {
    /// Opens the connection.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::EngineOpen`] when the engine cannot connect.
    fn init(&mut self, dbi_ref: &DbiRef, props: &InitProperties) -> Result<()>;

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to close cleanly.
    fn shutdown(&mut self) -> Result<()>;

    /// Whether the connection is currently open.
    fn is_open(&self) -> bool;

    /// Downcasting hook used by [`DbiHandle::with_engine`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Process-unique identity of one opened engine object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared handle to an initialized engine object.
///
/// Cloning does not change the pool's opener count; use
/// [`crate::DbiPool::add_ref`] for that.
#[derive(Clone)]
pub struct DbiHandle {
    id: HandleId,
    dbi_ref: DbiRef,
    url: String,
    dbi: Arc<Mutex<Box<dyn Dbi>>>,
}

impl DbiHandle {
    pub(crate) fn new(dbi_ref: DbiRef, url: String, dbi: Box<dyn Dbi>) -> Self {
        Self {
            id: HandleId::next(),
            dbi_ref,
            url,
            dbi: Arc::new(Mutex::new(dbi)),
        }
    }

    /// Identity of the underlying engine object.
    #[must_use]
    pub const fn id(&self) -> HandleId {
        self.id
    }

    /// The reference this handle was opened for.
    #[must_use]
    pub const fn dbi_ref(&self) -> &DbiRef {
        &self.dbi_ref
    }

    /// The resolved URL the engine was initialized with.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the engine object is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.dbi.lock().is_open()
    }

    /// Runs `f` against the engine object if it is of type `E`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dbireg::engines::SqliteDbi;
    /// # fn demo(handle: &dbireg::DbiHandle) {
    /// let version = handle.with_engine(|db: &mut SqliteDbi| db.schema_version());
    /// # }
    /// ```
    pub fn with_engine<E: Dbi, R>(&self, f: impl FnOnce(&mut E) -> R) -> Option<R> {
        let mut guard = self.dbi.lock();
        guard.as_any_mut().downcast_mut::<E>().map(f)
    }

    pub(crate) fn shutdown(&self) -> Result<()> {
        self.dbi.lock().shutdown()
    }
}

impl fmt::Debug for DbiHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbiHandle")
            .field("id", &self.id)
            .field("dbi_ref", &self.dbi_ref)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}
