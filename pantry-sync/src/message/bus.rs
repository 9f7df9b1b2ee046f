//! 变更通知总线
//!
//! # 架构
//!
//! ```text
//! InventoryService (local write) ──┐
//!                                  ├──▶ broadcast::Sender<ChangeSignal> ──▶ observers
//! RealtimeSubscription (remote) ───┘
//! ```
//!
//! 信号没有载荷，也不保证顺序；观察者收到信号后必须重新拉取完整数据。

use shared::ChangeSignal;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Default capacity of the broadcast channel
pub const DEFAULT_BUS_CAPACITY: usize = 64;

/// 变更总线 - 进程内发布/订阅
///
/// Cheap to clone; every clone publishes on the same channel.
#[derive(Debug, Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeSignal>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// 发布变更信号 (fire-and-forget)
    ///
    /// Having no subscribers is not an error.
    pub fn notify(&self) {
        let receivers = self.tx.send(ChangeSignal).unwrap_or(0);
        tracing::trace!(receivers, "Change signal published");
    }

    /// 订阅变更信号
    pub fn subscribe(&self) -> ChangeSubscriber {
        ChangeSubscriber {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer handle returned by [`ChangeBus::subscribe`]
#[derive(Debug)]
pub struct ChangeSubscriber {
    rx: broadcast::Receiver<ChangeSignal>,
}

impl ChangeSubscriber {
    /// Wait for the next change.
    ///
    /// Returns `false` once the bus is gone. A lagged receiver still reports
    /// `true`: missed signals collapse into one "refetch".
    pub async fn changed(&mut self) -> bool {
        match self.rx.recv().await {
            Ok(_) => true,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Change subscriber lagged, collapsing signals");
                true
            }
            Err(RecvError::Closed) => false,
        }
    }

    /// Drain pending signals without waiting. Returns whether any were pending.
    pub fn take_pending(&mut self) -> bool {
        let mut any = false;
        loop {
            match self.rx.try_recv() {
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => any = true,
                Err(_) => return any,
            }
        }
    }
}
