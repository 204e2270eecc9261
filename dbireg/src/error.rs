//! Error types for the dbireg library.
//!
//! Every fallible registry and pool operation reports failure through
//! [`Error`], using `thiserror` for the display and source plumbing.

use thiserror::Error;

/// Result type alias for operations that may fail with a dbireg error.
///
/// # Examples
///
/// ```
/// use dbireg::{Error, Result};
///
/// fn example_operation() -> Result<usize> {
///     Ok(1)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the dbireg library.
#[derive(Debug, Error)]
pub enum Error {
    /// No factory is registered for the requested engine.
    #[error("invalid database type: {engine}")]
    InvalidFactory {
        /// The engine id that has no registered factory.
        engine: String,
    },

    /// A database identity was empty or could not be resolved.
    #[error("invalid database id '{identity}': {reason}")]
    InvalidIdentity {
        /// The rejected identity.
        identity: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No writable backing location could be prepared for a tmp database.
    #[error("cannot allocate tmp database '{alias}': {reason}")]
    Allocation {
        /// The alias the allocation was made for.
        alias: String,
        /// The reason the allocation failed.
        reason: String,
    },

    /// The operation referenced a handle or alias with no record.
    #[error("not found: {resource}")]
    NotFound {
        /// The resource that was not found.
        resource: String,
    },

    /// A session operation ran before the session database existed.
    #[error("{what} is not initialized")]
    NotInitialized {
        /// What was expected to be initialized.
        what: String,
    },

    /// The engine failed to open or initialize a connection.
    #[error("cannot open database {url}: {source}")]
    EngineOpen {
        /// The resolved URL the engine tried to open.
        url: String,
        /// The engine-specific cause.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A `SQLite` error outside of connection opening.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A configuration file could not be parsed.
    #[error("configuration error: {0}")]
    Configuration(#[from] serde_yaml::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A validation error occurred.
    #[error("validation error for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// A description of the validation failure.
        message: String,
    },
}

impl Error {
    /// Wraps an engine failure for the given URL.
    pub fn engine_open(
        url: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::EngineOpen {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Check if error indicates a missing handle or alias.
    ///
    /// # Examples
    ///
    /// ```
    /// use dbireg::Error;
    ///
    /// let err = Error::NotFound { resource: "alias x".into() };
    /// assert!(err.is_not_found());
    /// ```
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if error is a session-not-initialized failure.
    #[must_use]
    pub fn is_not_initialized(&self) -> bool {
        matches!(self, Self::NotInitialized { .. })
    }
}
