#![deny(missing_docs, unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # dbireg
//!
//! Lifecycle management for shared database handles.
//!
//! The crate keeps track of which databases are open, who is using them and
//! when they can be closed:
//!
//! - [`DbiRegistry`]: engine factories plus named, reference-counted tmp
//!   databases, including the reserved `"session"` database
//! - [`DbiPool`]: deduplicated open handles with opener counts, suspension
//!   of idle handles and a timer-driven expiration sweep
//! - [`DbiConnection`] and [`TmpDbiHandle`]: scoped acquisition that releases
//!   on drop
//! - [`DbiFactory`]: the seam through which storage engines plug in
//!
//! ## Examples
//!
//! ```
//! use dbireg::{DbiConnection, DbiRegistry, TmpDbiHandle};
//!
//! let registry = DbiRegistry::builder().disable_sweep().build().unwrap();
//!
//! let tmp = TmpDbiHandle::new(&registry, "alignment").unwrap();
//! let con = DbiConnection::open(registry.pool(), tmp.dbi_ref(), false).unwrap();
//! let version = con
//!     .dbi()
//!     .with_engine(|db: &mut dbireg::engines::SqliteDbi| db.schema_version())
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(version, 0);
//! ```

pub mod config;
pub mod connection;
pub mod credentials;
pub mod dbi;
pub mod engines;
pub mod error;
pub mod factory;
pub mod logging;
pub mod pool;
pub mod registry;
pub mod tmp_area;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigBuilder};
pub use connection::{is_connectable, DbiConnection};
pub use credentials::{CredentialStore, Credentials, NoCredentials, StaticCredentialStore};
pub use dbi::{Dbi, DbiHandle, DbiRef, EngineId, HandleId, InitProperties};
pub use error::{Error, Result};
pub use factory::{DbiFactory, FactoryCatalog, ReleasePolicy};
pub use logging::{init_logger, LogLevel, Logger};
pub use pool::{ActiveRefSource, DbiPool, ExpirationPolicy, ExpirationTimer};
pub use registry::{DbiRegistry, RegistryBuilder, TmpDbiHandle, TmpDbiRef, SESSION_TMP_DBI_ALIAS};
pub use tmp_area::TmpArea;
