//! Data models
//!
//! Entity shapes as persisted by the local store (camelCase JSON).
//! The remote adapter translates these to snake_case rows at its boundary.

pub mod item;
pub mod order;

// Re-exports
pub use item::*;
pub use order::*;
