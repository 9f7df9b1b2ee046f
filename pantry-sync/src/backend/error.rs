//! Backend selector error types

use thiserror::Error;

use crate::store::StoreError;

/// Configuration errors, reported synchronously from `configure`
#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Missing credential")]
    MissingCredential,

    /// Client handle could not be constructed
    #[error("Client error: {0}")]
    Client(String),

    /// Saved configuration could not be read or written
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}
