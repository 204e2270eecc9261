//! Shared in-memory `SQLite` engine.
//!
//! Every connection to the same name sees the same database through
//! `SQLite`'s shared cache. The database only exists while at least one
//! connection is open, which is what makes suspension worth having here.
//! Connections are thread scoped.

use std::any::Any;

use rusqlite::{Connection, OpenFlags};

use crate::dbi::{Dbi, DbiRef, EngineId, InitProperties};
use crate::error::{Error, Result};
use crate::factory::{DbiFactory, ReleasePolicy};

/// Engine id of the shared in-memory engine.
pub const MEMORY_ENGINE_ID: &str = "memory";

/// Factory for [`MemoryDbi`] handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryFactory;

impl DbiFactory for MemoryFactory {
    fn engine_id(&self) -> EngineId {
        EngineId::from(MEMORY_ENGINE_ID)
    }

    fn create_dbi(&self) -> Box<dyn Dbi> {
        Box::new(MemoryDbi::default())
    }

    fn resolve_url(&self, dbi_id: &str) -> Result<String> {
        if dbi_id.starts_with("file:") {
            return Ok(dbi_id.to_owned());
        }
        let name = dbi_id.trim();
        if name.is_empty() {
            return Err(Error::InvalidIdentity {
                identity: dbi_id.to_owned(),
                reason: "database name is empty".into(),
            });
        }
        if name.contains(['?', '#']) {
            return Err(Error::InvalidIdentity {
                identity: dbi_id.to_owned(),
                reason: "database name must not contain '?' or '#'".into(),
            });
        }
        Ok(format!("file:{name}?mode=memory&cache=shared"))
    }

    fn release_policy(&self) -> ReleasePolicy {
        ReleasePolicy::Suspend
    }

    fn thread_scoped(&self) -> bool {
        true
    }
}

/// A connection to a shared in-memory database.
#[derive(Debug, Default)]
pub struct MemoryDbi {
    conn: Option<Connection>,
}

impl MemoryDbi {
    /// Returns the underlying connection while open.
    #[must_use]
    pub const fn connection(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }
}

impl Dbi for MemoryDbi {
    fn init(&mut self, dbi_ref: &DbiRef, props: &InitProperties) -> Result<()> {
        if self.conn.is_some() {
            return Err(Error::Validation {
                field: "memory".into(),
                message: format!("{dbi_ref} is already initialized"),
            });
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&props.url, flags)
            .map_err(|e| Error::engine_open(props.url.clone(), e))?;
        self.conn = Some(conn);
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

#[cfg(test)]
mod tests {
    use super::*;

    fn open(name: &str) -> MemoryDbi {
        let factory = MemoryFactory;
        let url = factory.resolve_url(name).unwrap();
        let mut dbi = MemoryDbi::default();
        dbi.init(
            &DbiRef::new(name, MEMORY_ENGINE_ID),
            &InitProperties {
                url,
                create: true,
                ..InitProperties::default()
            },
        )
        .unwrap();
        dbi
    }

    #[test]
    fn test_resolve_url() {
        let factory = MemoryFactory;
        assert_eq!(
            factory.resolve_url("scratch").unwrap(),
            "file:scratch?mode=memory&cache=shared"
        );
        assert_eq!(
            factory.resolve_url("file:x?mode=memory").unwrap(),
            "file:x?mode=memory"
        );
        assert!(factory.resolve_url("").is_err());
        assert!(factory.resolve_url("a?b").is_err());
        assert_eq!(
            factory.resolve_url("/tmp/x.dbiregdb").unwrap(),
            "file:/tmp/x.dbiregdb?mode=memory&cache=shared"
        );
    }

    #[test]
    fn test_connections_share_data() {
        let a = open("memory_engine_share");
        let b = open("memory_engine_share");

        a.connection()
            .unwrap()
            .execute_batch("CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (7);")
            .unwrap();
        let v: i64 = b
            .connection()
            .unwrap()
            .query_row("SELECT v FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(v, 7);
    }

    #[test]
    fn test_shutdown_closes() {
        let mut dbi = open("memory_engine_shutdown");
        assert!(dbi.is_open());
        dbi.shutdown().unwrap();
        assert!(!dbi.is_open());
        dbi.shutdown().unwrap();
    }
}
