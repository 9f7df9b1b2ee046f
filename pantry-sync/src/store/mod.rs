//! 存储适配层
//!
//! Both backing stores implement [`StoreAdapter`]. The four collection
//! operations are required; record-level operations default to a
//! read-modify-write of the whole collection, which is what the local store
//! wants. The remote store overrides them with per-row requests.
//!
//! | Adapter | Backing | Notes |
//! |---------|---------|-------|
//! | [`LocalStore`] | redb file | immediate durability, optional byte quota |
//! | [`RemoteStore`] | PostgREST-style HTTP | snake_case rows, realtime feed |

mod error;
pub mod local;
pub mod remote;

pub use error::{StoreError, StoreResult};
pub use local::LocalStore;
pub use remote::{RemoteStore, RealtimeSubscription};

use async_trait::async_trait;
use shared::{Order, PantryItem};

/// One line of stock deduction, computed at validation time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDeduction {
    pub item_id: String,
    /// Item name (for error reporting)
    pub name: String,
    pub requested: u32,
    /// Quantity observed when the order was validated
    pub expected: u32,
}

impl StockDeduction {
    pub fn remaining(&self) -> u32 {
        self.expected.saturating_sub(self.requested)
    }
}

/// A deduction that did not land after the order was recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeductionFailure {
    pub item_id: String,
    pub name: String,
    pub requested: u32,
    pub reason: String,
}

/// Result of [`StoreAdapter::commit_order`]
///
/// Empty `failures` means every deduction was applied. A non-empty list means
/// the order is recorded but some stock was not deducted (partial commit).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub failures: Vec<DeductionFailure>,
}

impl CommitReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Storage contract shared by the local and remote adapters
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Short adapter name for logs
    fn name(&self) -> &'static str;

    /// Full catalog; a missing collection is empty
    async fn read_items(&self) -> StoreResult<Vec<PantryItem>>;

    /// Overwrite the whole catalog
    async fn write_items(&self, items: &[PantryItem]) -> StoreResult<()>;

    async fn read_orders(&self) -> StoreResult<Vec<Order>>;

    async fn write_orders(&self, orders: &[Order]) -> StoreResult<()>;

    /// Replace the item with the same id, or prepend it
    async fn upsert_item(&self, item: &PantryItem) -> StoreResult<()> {
        let mut items = self.read_items().await?;
        match items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => *existing = item.clone(),
            None => items.insert(0, item.clone()),
        }
        self.write_items(&items).await
    }

    /// Write a restocked item, provided its quantity is still `expected`.
    ///
    /// Default: plain upsert. The local store is only written by this process
    /// and the service holds its mutation lock across the read and the write.
    /// Adapters shared with other devices must check `expected` and return
    /// [`StoreError::Conflict`] when the stored quantity moved.
    async fn restock_item(&self, item: &PantryItem, _expected: u32) -> StoreResult<()> {
        self.upsert_item(item).await
    }

    /// Remove an item. Returns `false` (and writes nothing) when absent.
    async fn delete_item(&self, id: &str) -> StoreResult<bool> {
        let mut items = self.read_items().await?;
        let before = items.len();
        items.retain(|i| i.id != id);
        if items.len() == before {
            return Ok(false);
        }
        self.write_items(&items).await?;
        Ok(true)
    }

    /// Replace the order with the same id, or prepend it
    async fn upsert_order(&self, order: &Order) -> StoreResult<()> {
        let mut orders = self.read_orders().await?;
        match orders.iter_mut().find(|o| o.id == order.id) {
            Some(existing) => *existing = order.clone(),
            None => orders.insert(0, order.clone()),
        }
        self.write_orders(&orders).await
    }

    /// Deduct stock and record the order.
    ///
    /// Default: deduct on a fresh copy of the catalog, persist it, then record
    /// the order. If recording fails the previous catalog is written back, so
    /// the caller sees either both effects or neither.
    async fn commit_order(
        &self,
        order: &Order,
        deductions: &[StockDeduction],
    ) -> StoreResult<CommitReport> {
        let previous = self.read_items().await?;
        let mut items = previous.clone();
        for deduction in deductions {
            let item = items
                .iter_mut()
                .find(|i| i.id == deduction.item_id)
                .ok_or_else(|| StoreError::Conflict(deduction.name.clone()))?;
            item.quantity = item
                .quantity
                .checked_sub(deduction.requested)
                .ok_or_else(|| StoreError::Conflict(deduction.name.clone()))?;
        }
        self.write_items(&items).await?;

        let recorded = async {
            let mut orders = self.read_orders().await?;
            orders.insert(0, order.clone());
            self.write_orders(&orders).await
        }
        .await;

        if let Err(e) = recorded {
            tracing::warn!(order_id = %order.id, error = %e, "Recording order failed, restoring stock");
            if let Err(restore_err) = self.write_items(&previous).await {
                tracing::error!(
                    order_id = %order.id,
                    error = %restore_err,
                    "Failed to restore stock after order write failure"
                );
            }
            return Err(e);
        }

        Ok(CommitReport::default())
    }
}
