//! 后端选择 - Local/Remote 模式的统一入口
//!
//! - Local 模式: redb 本地存储，服务层直接发布变更信号
//! - Remote 模式: 共享后端 (HTTP + realtime websocket)，由推送订阅发布变更信号

mod config;
mod error;
mod selector;
mod types;

pub use config::{BACKEND_CONFIG_KEY, RemoteConfig};
pub use error::SelectorError;
pub use selector::{BackendSelector, DEFAULT_REMOTE_TIMEOUT};
pub use types::{Backend, BackendMode, RemoteContext};
