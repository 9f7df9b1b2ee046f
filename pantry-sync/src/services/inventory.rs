//! InventoryService - 库存与订单门面
//!
//! Every call resolves the active backend through the [`BackendSelector`],
//! so callers never care whether the data lives on this device or on the
//! shared backend. Nothing is cached between calls.
//!
//! # Order placement
//!
//! ```text
//! place_order(request)
//!     ├─ 1. Shape checks (room, lines, quantities)
//!     ├─ 2. Fetch the catalog
//!     ├─ 3. Aggregate lines per item, check existence and stock (all-or-nothing)
//!     ├─ 4. Snapshot name/unit into the order lines
//!     ├─ 5. StoreAdapter::commit_order (deduct + record)
//!     └─ 6. Signal change (local mode)
//! ```

use std::sync::Arc;
use tokio::sync::Mutex;

use shared::{ItemCandidate, NewOrder, Order, OrderItem, OrderStatus, PantryItem};

use super::error::{ServiceError, ServiceResult};
use super::seed;
use crate::backend::{Backend, BackendSelector};
use crate::message::ChangeSubscriber;
use crate::store::{DeductionFailure, StockDeduction, StoreError};

/// Default threshold for [`InventoryService::get_low_stock_items`]
pub const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 10;

/// Result of a merge-add
#[derive(Debug, Clone, PartialEq)]
pub enum AddItemOutcome {
    /// Matched an existing `(name, unit)`; quantity was added
    Restocked(PantryItem),
    /// New catalog entry
    Added(PantryItem),
}

impl AddItemOutcome {
    pub fn item(&self) -> &PantryItem {
        match self {
            AddItemOutcome::Restocked(item) | AddItemOutcome::Added(item) => item,
        }
    }

    pub fn is_restock(&self) -> bool {
        matches!(self, AddItemOutcome::Restocked(_))
    }

    /// User-facing summary
    pub fn message(&self) -> String {
        match self {
            AddItemOutcome::Restocked(item) => format!(
                "Restocked {}: now {} {}",
                item.name, item.quantity, item.unit
            ),
            AddItemOutcome::Added(item) => format!(
                "Added {} ({} {}) to the pantry",
                item.name, item.quantity, item.unit
            ),
        }
    }
}

/// Result of [`InventoryService::place_order`]
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlacement {
    pub order: Order,
    /// Deductions that did not land after the order was recorded (remote only)
    pub stock_failures: Vec<DeductionFailure>,
}

impl OrderPlacement {
    pub fn is_complete(&self) -> bool {
        self.stock_failures.is_empty()
    }
}

/// Catalog counts derived from a single read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StockSummary {
    pub items: usize,
    pub low_stock: usize,
    pub out_of_stock: usize,
}

impl StockSummary {
    pub fn of(items: &[PantryItem], low_stock_threshold: u32) -> Self {
        Self {
            items: items.len(),
            low_stock: items
                .iter()
                .filter(|i| i.is_low_stock(low_stock_threshold))
                .count(),
            out_of_stock: items.iter().filter(|i| i.is_out_of_stock()).count(),
        }
    }
}

/// 库存与订单服务
pub struct InventoryService {
    selector: Arc<BackendSelector>,
    /// Serializes read-compute-write mutations within this process
    mutation: Mutex<()>,
}

impl InventoryService {
    pub fn new(selector: Arc<BackendSelector>) -> Self {
        Self {
            selector,
            mutation: Mutex::new(()),
        }
    }

    pub fn selector(&self) -> &Arc<BackendSelector> {
        &self.selector
    }

    /// Subscribe to change signals
    pub fn subscribe(&self) -> ChangeSubscriber {
        self.selector.bus().subscribe()
    }

    /// Publish a change in local mode. In remote mode the realtime feed does it.
    fn signal(&self, backend: &Backend) {
        if !backend.is_remote() {
            self.selector.bus().notify();
        }
    }

    // ========== Catalog ==========

    /// Catalog sorted by name (case-insensitive). Failures read as empty.
    pub async fn get_items(&self) -> Vec<PantryItem> {
        let backend = self.selector.backend().await;
        let mut items = match backend.store().read_items().await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(store = backend.store().name(), "Failed to read items: {e}");
                return Vec::new();
            }
        };
        items.sort_by_cached_key(|i| i.name.to_lowercase());
        items
    }

    /// Merge-add: restock a matching `(name, unit)` or create a new entry.
    ///
    /// The restock is written conditionally on the quantity read here. If
    /// another device changed that item's stock in between, nothing is written
    /// and [`ServiceError::StockChanged`] is returned; the caller retries.
    pub async fn add_or_update_item(&self, candidate: ItemCandidate) -> ServiceResult<AddItemOutcome> {
        if candidate.name.trim().is_empty() {
            return Err(ServiceError::Validation("Item name is required".into()));
        }

        let _guard = self.mutation.lock().await;
        let backend = self.selector.backend().await;
        let store = backend.store();
        let items = store.read_items().await?;

        let outcome = match items.into_iter().find(|i| i.matches(&candidate)) {
            Some(mut item) => {
                let seen = item.quantity;
                item.quantity = seen.saturating_add(candidate.quantity);
                if !candidate.category.is_default() {
                    item.category = candidate.category;
                }
                if candidate.expiry_date.is_some() {
                    item.expiry_date = candidate.expiry_date;
                }
                if candidate.notes.is_some() {
                    item.notes = candidate.notes;
                }
                if candidate.image_url.is_some() {
                    item.image_url = candidate.image_url;
                }
                store
                    .restock_item(&item, seen)
                    .await
                    .map_err(|e| match e {
                        StoreError::Conflict(name) => ServiceError::StockChanged(name),
                        e => e.into(),
                    })?;
                tracing::info!(item_id = %item.id, quantity = item.quantity, "Item restocked");
                AddItemOutcome::Restocked(item)
            }
            None => {
                let item = PantryItem::from_candidate(candidate);
                store.upsert_item(&item).await?;
                tracing::info!(item_id = %item.id, name = %item.name, "Item added");
                AddItemOutcome::Added(item)
            }
        };

        self.signal(&backend);
        Ok(outcome)
    }

    /// Remove an item; absent ids are a no-op
    pub async fn delete_item(&self, id: &str) -> ServiceResult<()> {
        let _guard = self.mutation.lock().await;
        let backend = self.selector.backend().await;
        if backend.store().delete_item(id).await? {
            tracing::info!(item_id = %id, "Item deleted");
        } else {
            tracing::debug!(item_id = %id, "Delete skipped, item not found");
        }
        self.signal(&backend);
        Ok(())
    }

    /// Items with `0 < quantity <= threshold`
    pub async fn get_low_stock_items(&self, threshold: u32) -> Vec<PantryItem> {
        let mut items = self.get_items().await;
        items.retain(|i| i.is_low_stock(threshold));
        items
    }

    pub async fn get_out_of_stock_items(&self) -> Vec<PantryItem> {
        let mut items = self.get_items().await;
        items.retain(PantryItem::is_out_of_stock);
        items
    }

    /// Counts for status displays, from one catalog read
    pub async fn stock_summary(&self, low_stock_threshold: u32) -> StockSummary {
        StockSummary::of(&self.get_items().await, low_stock_threshold)
    }

    // ========== Orders ==========

    /// All orders, newest first. Failures read as empty.
    pub async fn get_orders(&self) -> Vec<Order> {
        let backend = self.selector.backend().await;
        let mut orders = match backend.store().read_orders().await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::warn!(store = backend.store().name(), "Failed to read orders: {e}");
                return Vec::new();
            }
        };
        orders.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        orders
    }

    /// Staff queue: pending/preparing, oldest first
    pub async fn get_active_orders(&self) -> Vec<Order> {
        let mut orders = self.get_orders().await;
        orders.retain(Order::is_active);
        orders.reverse();
        orders
    }

    pub async fn find_order(&self, id: &str) -> Option<Order> {
        self.get_orders().await.into_iter().find(|o| o.id == id)
    }

    /// Validate against current stock, deduct, and record a `pending` order
    pub async fn place_order(&self, request: NewOrder) -> ServiceResult<OrderPlacement> {
        if request.room_number.trim().is_empty() {
            return Err(ServiceError::Validation("Room number is required".into()));
        }
        if request.items.is_empty() {
            return Err(ServiceError::Validation("Order has no items".into()));
        }
        if let Some(line) = request.items.iter().find(|l| l.quantity == 0) {
            return Err(ServiceError::Validation(format!(
                "Quantity for {} must be positive",
                line.name
            )));
        }

        let _guard = self.mutation.lock().await;
        let backend = self.selector.backend().await;
        let store = backend.store();
        let catalog = store.read_items().await?;

        // 同一商品多行合并后再校验库存
        let mut requested: Vec<(&str, &str, u32)> = Vec::new();
        for line in &request.items {
            match requested.iter_mut().find(|(id, _, _)| *id == line.item_id) {
                Some(entry) => entry.2 = entry.2.saturating_add(line.quantity),
                None => requested.push((line.item_id.as_str(), line.name.as_str(), line.quantity)),
            }
        }

        let mut deductions = Vec::with_capacity(requested.len());
        for (item_id, line_name, quantity) in requested {
            let item = catalog
                .iter()
                .find(|i| i.id == item_id)
                .ok_or_else(|| ServiceError::ItemMissing(line_name.to_string()))?;
            if item.quantity < quantity {
                return Err(ServiceError::InsufficientStock {
                    name: item.name.clone(),
                    available: item.quantity,
                });
            }
            deductions.push(StockDeduction {
                item_id: item.id.clone(),
                name: item.name.clone(),
                requested: quantity,
                expected: item.quantity,
            });
        }

        let lines: Vec<OrderItem> = request
            .items
            .into_iter()
            .map(|line| match catalog.iter().find(|i| i.id == line.item_id) {
                Some(item) => OrderItem::snapshot(item, line.quantity),
                None => line,
            })
            .collect();
        let order = Order::from_request(NewOrder::new(request.room_number, lines));

        let report = store.commit_order(&order, &deductions).await?;
        if report.is_complete() {
            tracing::info!(
                order_id = %order.id,
                room = %order.room_number,
                items = order.total_quantity(),
                "Order placed"
            );
        } else {
            tracing::warn!(
                order_id = %order.id,
                failures = report.failures.len(),
                "Order recorded with unapplied stock deductions"
            );
        }

        self.signal(&backend);
        Ok(OrderPlacement {
            order,
            stock_failures: report.failures,
        })
    }

    /// Move an order along the status machine.
    ///
    /// Returns `false` when nothing changed (unknown id or same status).
    pub async fn update_order_status(&self, id: &str, status: OrderStatus) -> ServiceResult<bool> {
        let _guard = self.mutation.lock().await;
        let backend = self.selector.backend().await;
        let store = backend.store();

        let Some(mut order) = store.read_orders().await?.into_iter().find(|o| o.id == id) else {
            tracing::debug!(order_id = %id, "Status update skipped, order not found");
            return Ok(false);
        };
        let from = order.status;
        if !order.transition(status, shared::util::now())? {
            return Ok(false);
        }

        store.upsert_order(&order).await?;
        tracing::info!(order_id = %id, %from, to = %status, "Order status updated");
        self.signal(&backend);
        Ok(true)
    }

    // ========== Bootstrap ==========

    /// Populate the starter catalog when local and empty.
    ///
    /// Returns whether anything was written.
    pub async fn seed_initial_data(&self) -> ServiceResult<bool> {
        let _guard = self.mutation.lock().await;
        let backend = self.selector.backend().await;
        if backend.is_remote() {
            tracing::debug!("Remote mode, skipping seed");
            return Ok(false);
        }
        let store = backend.store();
        if !store.read_items().await?.is_empty() {
            return Ok(false);
        }

        let items = seed::starter_catalog();
        store.write_items(&items).await?;
        tracing::info!(count = items.len(), "Seeded starter catalog");
        self.signal(&backend);
        Ok(true)
    }
}
