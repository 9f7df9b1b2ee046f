//! Guest Order Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::item::{PantryItem, Unit};
use crate::util::{new_id, now};

/// Order status
///
/// ```text
/// pending ──▶ preparing ──▶ delivered
///    │            │
///    └────────────┴──────▶ cancelled
/// ```
///
/// `delivered` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Preparing,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Whether `self -> next` is an edge of the status machine.
    /// Re-applying the current status is not an edge.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Preparing) | (Pending, Cancelled) | (Preparing, Delivered) | (Preparing, Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown order status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "preparing" => Ok(OrderStatus::Preparing),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// Illegal status change (e.g. out of a terminal state)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid status transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// Order line, snapshotted at order time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Catalog reference (not ownership)
    pub item_id: String,
    pub name: String,
    pub unit: Unit,
    pub quantity: u32,
}

impl OrderItem {
    /// Snapshot the catalog entry's name and unit
    pub fn snapshot(item: &PantryItem, quantity: u32) -> Self {
        Self {
            item_id: item.id.clone(),
            name: item.name.clone(),
            unit: item.unit.clone(),
            quantity,
        }
    }
}

/// Guest order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub room_number: String,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    /// Set once, on entering a terminal status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Build a `pending` order from a request (fresh id, stamped now)
    pub fn from_request(request: NewOrder) -> Self {
        Self {
            id: new_id(),
            room_number: request.room_number.trim().to_string(),
            items: request.items,
            status: OrderStatus::Pending,
            timestamp: now(),
            completed_at: None,
        }
    }

    /// Still in the staff queue (pending or preparing)
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Units across all lines (u64: lines are u32 each and may sum past it)
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Apply a status change.
    ///
    /// Returns `Ok(false)` when `next` equals the current status (nothing
    /// changes, `completed_at` is preserved).
    pub fn transition(
        &mut self,
        next: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, InvalidTransition> {
        if self.status == next {
            return Ok(false);
        }
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(at);
        }
        Ok(true)
    }
}

/// Order placement request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub room_number: String,
    pub items: Vec<OrderItem>,
}

impl NewOrder {
    pub fn new(room_number: impl Into<String>, items: Vec<OrderItem>) -> Self {
        Self {
            room_number: room_number.into(),
            items,
        }
    }
}
