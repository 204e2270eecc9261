//! File-backed `SQLite` engine.
//!
//! Connections are opened with WAL journaling and a busy timeout. The engine
//! is single-writer per file, so the pool destroys idle handles instead of
//! suspending them.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use crate::dbi::{Dbi, DbiRef, EngineId, InitProperties};
use crate::error::{Error, Result};
use crate::factory::{DbiFactory, ReleasePolicy};

/// Engine id of the file-backed `SQLite` engine.
pub const SQLITE_ENGINE_ID: &str = "sqlite";

/// Default busy timeout for lock contention.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Factory for [`SqliteDbi`] handles.
///
/// # Examples
///
/// ```
/// use dbireg::engines::SqliteFactory;
/// use dbireg::DbiFactory;
/// use std::time::Duration;
///
/// let factory = SqliteFactory::default().with_busy_timeout(Duration::from_secs(10));
/// assert_eq!(factory.engine_id().as_str(), "sqlite");
/// assert!(factory.file_backed());
/// ```
#[derive(Debug, Clone)]
pub struct SqliteFactory {
    busy_timeout: Duration,
}

impl Default for SqliteFactory {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl SqliteFactory {
    /// Sets the busy timeout applied to every connection.
    #[must_use]
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

impl DbiFactory for SqliteFactory {
    fn engine_id(&self) -> EngineId {
        EngineId::from(SQLITE_ENGINE_ID)
    }

    fn create_dbi(&self) -> Box<dyn Dbi> {
        Box::new(SqliteDbi::new(self.busy_timeout))
    }

    /// Makes the path absolute without touching the filesystem, so databases
    /// that do not exist yet still resolve.
    fn resolve_url(&self, dbi_id: &str) -> Result<String> {
        let raw = dbi_id.strip_prefix("file://").unwrap_or(dbi_id);
        if raw.trim().is_empty() {
            return Err(Error::InvalidIdentity {
                identity: dbi_id.to_owned(),
                reason: "database path is empty".into(),
            });
        }
        if raw.contains('\0') {
            return Err(Error::InvalidIdentity {
                identity: dbi_id.to_owned(),
                reason: "database path contains a null byte".into(),
            });
        }

        let path = Path::new(raw);
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        Ok(absolute.display().to_string())
    }

    fn release_policy(&self) -> ReleasePolicy {
        ReleasePolicy::Destroy
    }

    fn file_backed(&self) -> bool {
        true
    }
}

/// A `SQLite` connection to a database file.
#[derive(Debug)]
pub struct SqliteDbi {
    conn: Option<Connection>,
    path: Option<PathBuf>,
    busy_timeout: Duration,
}

impl SqliteDbi {
    /// Creates an unopened engine object.
    #[must_use]
    pub const fn new(busy_timeout: Duration) -> Self {
        Self {
            conn: None,
            path: None,
            busy_timeout,
        }
    }

    /// Returns the underlying connection while open.
    #[must_use]
    pub const fn connection(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }

    /// Returns the underlying connection mutably while open, e.g. for
    /// transactions.
    pub fn connection_mut(&mut self) -> Option<&mut Connection> {
        self.conn.as_mut()
    }

    /// Path of the database file once initialized.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reads `PRAGMA schema_version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or the query fails.
    pub fn schema_version(&self) -> Result<i64> {
        let conn = self.conn.as_ref().ok_or_else(|| Error::NotInitialized {
            what: "sqlite connection".into(),
        })?;
        Ok(conn.query_row("PRAGMA schema_version", [], |row| row.get(0))?)
    }

    fn open_connection(&self, path: &Path, create: bool) -> rusqlite::Result<Connection> {
        let flags = if create {
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX
        };
        let conn = Connection::open_with_flags(path, flags)?;

        // Reading the schema version fails early on files that are not databases.
        let _: i64 = conn.query_row("PRAGMA schema_version", [], |row| row.get(0))?;

        // PRAGMA journal_mode returns a row, so it goes through query_row
        let _: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA synchronous = NORMAL")?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}

impl Dbi for SqliteDbi {
    fn init(&mut self, dbi_ref: &DbiRef, props: &InitProperties) -> Result<()> {
        if self.conn.is_some() {
            return Err(Error::Validation {
                field: "sqlite".into(),
                message: format!("{dbi_ref} is already initialized"),
            });
        }
        if props.login.is_some() || props.password.is_some() {
            log::debug!("sqlite ignores credentials supplied for {}", props.url);
        }

        let path = PathBuf::from(&props.url);
        if props.create {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::engine_open(props.url.clone(), e))?;
            }
        }

        let conn = self
            .open_connection(&path, props.create)
            .map_err(|e| Error::engine_open(props.url.clone(), e))?;
        self.conn = Some(conn);
        self.path = Some(path);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| Error::Database(e))?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
