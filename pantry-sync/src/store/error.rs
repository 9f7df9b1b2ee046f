//! Storage errors

use thiserror::Error;

/// Errors from either backing store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local capacity exceeded
    #[error("Quota exceeded for {collection}: {size} bytes > {limit} bytes")]
    QuotaExceeded {
        collection: &'static str,
        size: usize,
        limit: usize,
    },

    /// Network / server failure from the remote backend
    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Remote request timed out")]
    Timeout,

    /// Remote rejected the request with a non-success status
    #[error("Remote returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Stock moved between validation and commit
    #[error("Stock changed concurrently for {0}")]
    Conflict(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout
        } else {
            StoreError::Remote(err.to_string())
        }
    }
}

impl StoreError {
    /// Transport-level failure (worth retrying)
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Remote(_) | StoreError::Timeout => true,
            StoreError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
