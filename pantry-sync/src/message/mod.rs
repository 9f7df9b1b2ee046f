//! 消息模块 - 变更通知总线

mod bus;

pub use bus::{ChangeBus, ChangeSubscriber, DEFAULT_BUS_CAPACITY};
pub use shared::ChangeSignal;
