//! Pantry Sync - 库存与订单同步层
//!
//! # 架构概述
//!
//! - **变更总线** (`message`): 无负载的变更信号，观察者收到后重新拉取
//! - **后端选择** (`backend`): Local / Remote 模式切换与配置持久化
//! - **存储适配** (`store`): redb 本地存储、PostgREST 风格远程存储 + realtime 推送
//! - **服务** (`services`): 库存合并、低库存查询、下单扣库存、订单状态机
//!
//! # 模块结构
//!
//! ```text
//! pantry-sync/src/
//! ├── core/          # 配置
//! ├── message/       # 变更总线
//! ├── backend/       # 后端选择器
//! ├── store/         # 存储适配 (local / remote)
//! ├── services/      # 库存与订单服务
//! └── utils/         # 日志
//! ```

pub mod backend;
pub mod core;
pub mod message;
pub mod services;
pub mod store;
pub mod utils;

// Re-export 公共类型
pub use backend::{Backend, BackendMode, BackendSelector, RemoteConfig, SelectorError};
pub use core::Config;
pub use message::{ChangeBus, ChangeSubscriber};
pub use services::{
    AddItemOutcome, InventoryService, OrderPlacement, ServiceError, ServiceResult, StockSummary,
};
pub use store::{LocalStore, RemoteStore, StoreAdapter, StoreError, StoreResult};

pub use utils::logger::{init_logger, init_logger_with_file};

/// 创建工作目录和日志目录，并初始化日志
pub fn setup_environment(config: &Config) -> std::io::Result<()> {
    std::fs::create_dir_all(&config.work_dir)?;
    if let Some(dir) = &config.log_dir {
        std::fs::create_dir_all(dir)?;
    }
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());
    Ok(())
}
