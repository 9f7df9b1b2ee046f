//! 变更通知消息类型
//!
//! 存储层每次成功写入（或收到远端行变更推送）时广播一个 [`ChangeSignal`]。
//! 信号不携带任何数据：订阅者只能把它理解为"有东西变了，重新拉取"。

use serde::{Deserialize, Serialize};

/// Payload-less "something changed" signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSignal;
