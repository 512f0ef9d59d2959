//! Error taxonomy shared by the hierarchy, the path engine, and persistence.
//!
//! Every variant is a usage or data error reported to the caller. Nothing in
//! the core retries.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::orbat::UnitId;

/// Errors returned by sandtable operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The referenced unit id does not exist.
    #[error("unit not found: {0}")]
    NotFound(UnitId),
    /// The operation is not valid in the current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    /// A symbol code that is not 20 printable ASCII characters.
    #[error("invalid symbol code: {0:?}")]
    InvalidSymbolCode(String),
    /// Stored data breaks a forest invariant.
    #[error("corrupt unit forest: {0}")]
    Corrupt(String),
    /// The key-value store has nothing under this key.
    #[error("no stored value for key {0:?}")]
    MissingKey(String),
    #[error("config file {path:?}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidOperation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
