//! Crate-wide error type and result alias.

use std::io;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors surfaced by the store, the engine, and the service layers.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The backing store rejected or failed a read/write.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    /// A request parameter was outside its allowed domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(String),
    /// Registration or login was rejected.
    #[error("{0}")]
    Auth(String),
    /// Configuration file could not be parsed.
    #[error("config error: {0}")]
    Config(String),
    /// An internal invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
}
