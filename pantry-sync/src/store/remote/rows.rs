//! Remote row shapes and field translation
//!
//! The remote tables use snake_case columns (`added_date`, `room_number`, ...)
//! while entities use camelCase. Every read and write in the remote adapter
//! goes through the conversions in this file and nowhere else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{Order, OrderItem, OrderStatus, PantryItem, Unit};

pub const ITEMS_TABLE: &str = "pantry_items";
pub const ORDERS_TABLE: &str = "orders";

/// `pantry_items` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRow {
    pub id: String,
    pub name: String,
    pub quantity: i64,
    pub unit: String,
    #[serde(default)]
    pub category: Option<String>,
    pub added_date: DateTime<Utc>,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl From<&PantryItem> for ItemRow {
    fn from(item: &PantryItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            quantity: i64::from(item.quantity),
            unit: item.unit.as_str().to_string(),
            category: Some(item.category.as_str().to_string()),
            added_date: item.added_date,
            expiry_date: item.expiry_date,
            notes: item.notes.clone(),
            image_url: item.image_url.clone(),
        }
    }
}

impl From<ItemRow> for PantryItem {
    fn from(row: ItemRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            quantity: clamp_quantity(row.quantity),
            unit: Unit::from(row.unit),
            category: row.category.map(Into::into).unwrap_or_default(),
            added_date: row.added_date,
            expiry_date: row.expiry_date,
            notes: row.notes,
            image_url: row.image_url,
        }
    }
}

/// Embedded line inside `orders.items`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRow {
    // Peers that wrote camelCase lines are still readable
    #[serde(alias = "itemId")]
    pub item_id: String,
    pub name: String,
    pub unit: String,
    pub quantity: i64,
}

impl From<&OrderItem> for OrderLineRow {
    fn from(line: &OrderItem) -> Self {
        Self {
            item_id: line.item_id.clone(),
            name: line.name.clone(),
            unit: line.unit.as_str().to_string(),
            quantity: i64::from(line.quantity),
        }
    }
}

impl From<OrderLineRow> for OrderItem {
    fn from(row: OrderLineRow) -> Self {
        Self {
            item_id: row.item_id,
            name: row.name,
            unit: Unit::from(row.unit),
            quantity: clamp_quantity(row.quantity),
        }
    }
}

/// `orders` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRow {
    pub id: String,
    pub room_number: String,
    pub items: Vec<OrderLineRow>,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.clone(),
            room_number: order.room_number.clone(),
            items: order.items.iter().map(OrderLineRow::from).collect(),
            status: order.status,
            timestamp: order.timestamp,
            completed_at: order.completed_at,
        }
    }
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            room_number: row.room_number,
            items: row.items.into_iter().map(OrderItem::from).collect(),
            status: row.status,
            timestamp: row.timestamp,
            completed_at: row.completed_at,
        }
    }
}

/// Partial update body for a stock change
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QuantityPatch {
    pub quantity: i64,
}

fn clamp_quantity(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
