//! Shared types for the pantry ordering system
//!
//! Domain entities (catalog items, guest orders) and small helpers used by the
//! storage adapters and the inventory service.

pub mod message;
pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use message::ChangeSignal;
pub use models::{
    Category, InvalidTransition, ItemCandidate, NewOrder, Order, OrderItem, OrderStatus,
    PantryItem, Unit,
};
