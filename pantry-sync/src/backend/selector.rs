//! BackendSelector - 本地/远程模式切换
//!
//! Holds the active [`Backend`] behind an `Arc` that is swapped, never
//! mutated, on `configure` / `teardown`. Callers take a snapshot with
//! [`BackendSelector::backend`] and run a whole operation against it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::config::{BACKEND_CONFIG_KEY, RemoteConfig};
use super::error::SelectorError;
use super::types::{Backend, BackendMode, RemoteContext};
use crate::message::ChangeBus;
use crate::store::{LocalStore, RemoteStore, StoreAdapter};

/// Default per-request timeout for the remote backend
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// 后端选择器
pub struct BackendSelector {
    /// Settings storage (and the default local adapter)
    local: LocalStore,
    /// Adapter used in local mode
    local_adapter: Arc<dyn StoreAdapter>,
    bus: ChangeBus,
    remote_timeout: Duration,
    active: RwLock<Arc<Backend>>,
}

impl BackendSelector {
    /// Start in local mode on the given store
    pub fn new(local: LocalStore, bus: ChangeBus) -> Self {
        let local_adapter: Arc<dyn StoreAdapter> = Arc::new(local.clone());
        Self {
            active: RwLock::new(Arc::new(Backend::Local(local_adapter.clone()))),
            local,
            local_adapter,
            bus,
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }

    /// Start with an explicit backend (used to inject fake adapters)
    pub fn with_backend(local: LocalStore, bus: ChangeBus, backend: Backend) -> Self {
        let selector = Self::new(local, bus);
        Self {
            active: RwLock::new(Arc::new(backend)),
            ..selector
        }
    }

    /// Set the remote request timeout
    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    pub fn local_store(&self) -> &LocalStore {
        &self.local
    }

    /// Snapshot of the active backend
    pub async fn backend(&self) -> Arc<Backend> {
        self.active.read().await.clone()
    }

    pub async fn mode(&self) -> BackendMode {
        self.active.read().await.mode()
    }

    pub async fn is_remote(&self) -> bool {
        self.active.read().await.is_remote()
    }

    pub async fn current_config(&self) -> Option<RemoteConfig> {
        self.active.read().await.remote_config().cloned()
    }

    /// Switch to remote mode.
    ///
    /// On error nothing changes: the previous backend (local or remote) stays
    /// active and the saved configuration is untouched.
    pub async fn configure(&self, endpoint: &str, credential: &str) -> Result<(), SelectorError> {
        let mut active = self.active.write().await;

        let config = RemoteConfig::new(endpoint, credential);
        let url = config.validate()?;
        let store = RemoteStore::new(url, config.credential.clone(), self.remote_timeout)
            .map_err(|e| SelectorError::Client(e.to_string()))?;

        self.local.put_setting(BACKEND_CONFIG_KEY, &config)?;

        // At most one standing subscription: stop the old feed first
        if let Backend::Remote(previous) = active.as_ref() {
            previous.stop_subscription();
        }
        let subscription = store.subscribe(self.bus.clone());
        *active = Arc::new(Backend::Remote(RemoteContext::new(
            config.clone(),
            Arc::new(store),
            Some(subscription),
        )));
        drop(active);

        tracing::info!(endpoint = %config.endpoint, "Remote backend configured");
        self.bus.notify();
        Ok(())
    }

    /// Revert to local mode and forget the saved configuration.
    ///
    /// Remote data is not touched. The in-memory switch happens even if the
    /// saved record cannot be removed; that failure is returned.
    pub async fn teardown(&self) -> Result<(), SelectorError> {
        let mut active = self.active.write().await;
        let was_remote = active.is_remote();
        if let Backend::Remote(ctx) = active.as_ref() {
            ctx.stop_subscription();
        }
        *active = Arc::new(Backend::Local(self.local_adapter.clone()));
        drop(active);

        let cleared = self.local.remove_setting(BACKEND_CONFIG_KEY);
        if was_remote {
            tracing::info!("Remote backend torn down, back to local mode");
            self.bus.notify();
        }
        cleared.map_err(SelectorError::from)
    }

    /// Stop the realtime feed at process exit. Mode and saved config are kept.
    pub async fn shutdown(&self) {
        if let Backend::Remote(ctx) = self.active.read().await.as_ref() {
            ctx.stop_subscription();
        }
    }

    /// Restore the saved configuration at startup.
    ///
    /// Never fails: any problem is logged and local mode is kept.
    pub async fn restore_saved(&self) -> BackendMode {
        match self.local.get_setting::<RemoteConfig>(BACKEND_CONFIG_KEY) {
            Ok(Some(config)) => {
                tracing::info!(endpoint = %config.endpoint, "Restoring remote backend...");
                if let Err(e) = self.configure(&config.endpoint, &config.credential).await {
                    tracing::warn!("Failed to restore remote backend, staying local: {e}");
                }
            }
            Ok(None) => {
                tracing::info!("No saved backend configuration, starting in local mode");
            }
            Err(e) => {
                tracing::warn!("Saved backend configuration unreadable, staying local: {e}");
            }
        }
        self.mode().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Nothing listens here; realtime workers just sit in backoff
    const DEAD_ENDPOINT: &str = "http://127.0.0.1:9";

    fn selector() -> BackendSelector {
        BackendSelector::new(LocalStore::open_in_memory().unwrap(), ChangeBus::new())
    }

    fn saved(selector: &BackendSelector) -> Option<RemoteConfig> {
        selector
            .local_store()
            .get_setting(BACKEND_CONFIG_KEY)
            .unwrap()
    }

    #[tokio::test]
    async fn test_starts_local() {
        let selector = selector();
        assert!(!selector.is_remote().await);
        assert_eq!(selector.mode().await, BackendMode::Local);
        assert!(selector.current_config().await.is_none());
        assert_eq!(selector.backend().await.store().name(), "local");
    }

    #[tokio::test]
    async fn test_invalid_configure_keeps_local() {
        let selector = selector();
        assert!(selector.configure("not a url", "key").await.is_err());
        assert!(selector.configure(DEAD_ENDPOINT, "").await.is_err());
        assert!(!selector.is_remote().await);
        assert!(saved(&selector).is_none());
    }

    #[tokio::test]
    async fn test_configure_persists_and_notifies() {
        let selector = selector();
        let mut changes = selector.bus().subscribe();

        selector.configure(DEAD_ENDPOINT, "anon-key").await.unwrap();

        assert!(selector.is_remote().await);
        assert_eq!(selector.backend().await.store().name(), "remote");
        let expected = RemoteConfig::new(DEAD_ENDPOINT, "anon-key");
        assert_eq!(selector.current_config().await, Some(expected.clone()));
        assert_eq!(saved(&selector), Some(expected));
        assert!(changes.take_pending());
    }

    #[tokio::test]
    async fn test_failed_reconfigure_keeps_previous_remote() {
        let selector = selector();
        selector.configure(DEAD_ENDPOINT, "anon-key").await.unwrap();

        assert!(selector.configure("ftp://nope", "other").await.is_err());

        let config = selector.current_config().await.unwrap();
        assert_eq!(config.credential, "anon-key");
        assert_eq!(saved(&selector).unwrap().credential, "anon-key");
    }

    #[tokio::test]
    async fn test_reconfigure_replaces_subscription() {
        let selector = selector();
        selector.configure(DEAD_ENDPOINT, "first").await.unwrap();
        let first = selector.backend().await;

        selector.configure(DEAD_ENDPOINT, "second").await.unwrap();
        let second = selector.backend().await;

        let (Backend::Remote(old), Backend::Remote(new)) = (first.as_ref(), second.as_ref()) else {
            panic!("expected remote backends");
        };
        assert!(!old.is_live());
        assert!(new.is_live());
        assert_eq!(new.config().credential, "second");
    }

    #[tokio::test]
    async fn test_teardown_reverts_and_clears() {
        let selector = selector();
        selector.configure(DEAD_ENDPOINT, "anon-key").await.unwrap();
        let remote = selector.backend().await;

        selector.teardown().await.unwrap();

        assert!(!selector.is_remote().await);
        assert!(selector.current_config().await.is_none());
        assert!(saved(&selector).is_none());
        let Backend::Remote(ctx) = remote.as_ref() else {
            panic!("expected remote backend");
        };
        assert!(!ctx.is_live());

        // teardown in local mode is harmless
        selector.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn test_restore_saved_configuration() {
        let local = LocalStore::open_in_memory().unwrap();
        local
            .put_setting(BACKEND_CONFIG_KEY, &RemoteConfig::new(DEAD_ENDPOINT, "anon-key"))
            .unwrap();

        let selector = BackendSelector::new(local, ChangeBus::new());
        assert_eq!(selector.restore_saved().await, BackendMode::Remote);
        assert_eq!(
            selector.current_config().await.unwrap().endpoint,
            DEAD_ENDPOINT
        );
    }

    #[tokio::test]
    async fn test_restore_bad_configuration_stays_local() {
        let local = LocalStore::open_in_memory().unwrap();
        local
            .put_setting(BACKEND_CONFIG_KEY, &RemoteConfig::new("nonsense", "k"))
            .unwrap();
        let selector = BackendSelector::new(local, ChangeBus::new());
        assert_eq!(selector.restore_saved().await, BackendMode::Local);

        let local = LocalStore::open_in_memory().unwrap();
        local.put_setting(BACKEND_CONFIG_KEY, &"garbage").unwrap();
        let selector = BackendSelector::new(local, ChangeBus::new());
        assert_eq!(selector.restore_saved().await, BackendMode::Local);
    }
}
