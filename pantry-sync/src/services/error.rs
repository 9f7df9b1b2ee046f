//! Service error types

use shared::InvalidTransition;
use thiserror::Error;

use crate::store::StoreError;

/// Errors returned by [`super::InventoryService`] mutations
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// An order line references an item that is gone from the catalog
    #[error("{0}: item no longer exists")]
    ItemMissing(String),

    #[error("Not enough stock for {name}, only {available} left")]
    InsufficientStock { name: String, available: u32 },

    /// Another device changed the stock between our read and our write
    #[error("Stock for {0} changed on another device, try again")]
    StockChanged(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
