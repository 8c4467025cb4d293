//! Error types for the entry store.
//!
//! This module provides a unified `Error` type for every backend operation.

use thiserror::Error;
use uuid::Uuid;

/// A specialized `Result` type for entry store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Defines the errors that can occur while storing, loading or searching entries.
#[derive(Error, Debug)]
pub enum Error {
    /// No record with the requested UUID exists in the backend.
    #[error("entry {0} not found")]
    NotFound(Uuid),

    /// A save collided with a record that is already stored under the same UUID.
    #[error("entry {0} already exists, try updating it instead")]
    AlreadyExists(Uuid),

    /// The stored record differs from the caller's copy of it.
    #[error("entry {0} is out of sync with the version in the backend")]
    OutOfSync(Uuid),

    /// A search term used an unknown operator or an incompatible comparison.
    #[error("malformed query: {0}")]
    MalformedQuery(String),

    /// The storage layout on disk is not what the backend expects.
    #[error("storage error: {0}")]
    Storage(String),

    /// An error occurred while encoding or decoding JSON.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An error from the underlying I/O system.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error related to the store configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The requested backend was not compiled into this build.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl Error {
    /// Returns `true` for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedQuery(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Self::MalformedQuery(err.to_string())
    }
}
