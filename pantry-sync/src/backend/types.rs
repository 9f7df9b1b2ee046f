//! Backend type definitions

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::config::RemoteConfig;
use crate::store::{RealtimeSubscription, StoreAdapter};

/// 运行模式类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Local,
    Remote,
}

impl std::fmt::Display for BackendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendMode::Local => write!(f, "local"),
            BackendMode::Remote => write!(f, "remote"),
        }
    }
}

/// Remote mode context: client handle + its standing subscription
///
/// Built once per `configure` and replaced wholesale on reconfiguration.
pub struct RemoteContext {
    config: RemoteConfig,
    store: Arc<dyn StoreAdapter>,
    subscription: Option<RealtimeSubscription>,
}

impl RemoteContext {
    pub fn new(
        config: RemoteConfig,
        store: Arc<dyn StoreAdapter>,
        subscription: Option<RealtimeSubscription>,
    ) -> Self {
        Self {
            config,
            store,
            subscription,
        }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Whether the realtime feed is still running
    pub fn is_live(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(RealtimeSubscription::is_active)
    }

    pub(crate) fn stop_subscription(&self) {
        if let Some(subscription) = &self.subscription {
            subscription.cancel();
        }
    }
}

/// Active backing store (tagged; never a half-initialized handle)
pub enum Backend {
    /// Single-device storage
    Local(Arc<dyn StoreAdapter>),
    /// Shared backend with push notifications
    Remote(RemoteContext),
}

impl Backend {
    pub fn store(&self) -> &dyn StoreAdapter {
        match self {
            Backend::Local(store) => store.as_ref(),
            Backend::Remote(ctx) => ctx.store.as_ref(),
        }
    }

    pub fn mode(&self) -> BackendMode {
        match self {
            Backend::Local(_) => BackendMode::Local,
            Backend::Remote(_) => BackendMode::Remote,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Backend::Remote(_))
    }

    pub fn remote_config(&self) -> Option<&RemoteConfig> {
        match self {
            Backend::Local(_) => None,
            Backend::Remote(ctx) => Some(ctx.config()),
        }
    }
}
