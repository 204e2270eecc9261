//! Built-in storage engines.
//!
//! - [`SqliteFactory`]: file-backed `SQLite`, the default engine for tmp
//!   databases. Single writer, so idle handles are destroyed.
//! - [`MemoryFactory`]: shared in-memory `SQLite`. Shareable and thread
//!   scoped, so idle handles are suspended.
//!
//! Other engines plug in through [`crate::DbiFactory`].

mod memory;
mod sqlite;

use std::sync::Arc;
use std::time::Duration;

pub use memory::{MemoryDbi, MemoryFactory, MEMORY_ENGINE_ID};
pub use sqlite::{SqliteDbi, SqliteFactory, DEFAULT_BUSY_TIMEOUT, SQLITE_ENGINE_ID};

use crate::factory::FactoryCatalog;

/// Registers the built-in engines, skipping any id already taken.
pub fn register_builtin_engines(catalog: &FactoryCatalog, busy_timeout: Duration) {
    catalog.register(Arc::new(
        SqliteFactory::default().with_busy_timeout(busy_timeout),
    ));
    catalog.register(Arc::new(MemoryFactory));
}
