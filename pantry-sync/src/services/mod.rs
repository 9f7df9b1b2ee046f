//! Services - 库存与订单业务门面

mod error;
mod inventory;
pub mod seed;

pub use error::{ServiceError, ServiceResult};
pub use inventory::{
    AddItemOutcome, DEFAULT_LOW_STOCK_THRESHOLD, InventoryService, OrderPlacement, StockSummary,
};
