//! redb-based local store
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `collections` | `pantry_items` / `orders` | JSON array | Entity collections (full overwrite) |
//! | `settings` | `backend_config` | JSON object | Saved remote configuration |
//!
//! # Durability
//!
//! redb commits with `Durability::Immediate`: once `commit()` returns the
//! write survives a restart, and later reads in the same process see it.

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::{Order, PantryItem};
use std::path::Path;
use std::sync::Arc;

use super::{StoreAdapter, StoreError, StoreResult};

/// Entity collections: key = collection name, value = JSON-serialized array
const COLLECTIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("collections");

/// Settings records: key = setting name, value = JSON-serialized record
const SETTINGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("settings");

pub const ITEMS_KEY: &str = "pantry_items";
pub const ORDERS_KEY: &str = "orders";

/// Local single-device store backed by redb
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Database>,
    /// Max serialized bytes per collection (None = unlimited)
    quota: Option<usize>,
}

impl LocalStore {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests, ephemeral demos)
    pub fn open_in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        // Create tables up front so read transactions never miss them
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(COLLECTIONS_TABLE)?;
            let _ = write_txn.open_table(SETTINGS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            quota: None,
        })
    }

    /// Limit each collection to `bytes` of serialized JSON
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    // ========== Collections ==========

    fn read_collection<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Vec<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(COLLECTIONS_TABLE)?;
        match table.get(key)? {
            Some(guard) => Ok(serde_json::from_slice(guard.value())?),
            None => Ok(Vec::new()),
        }
    }

    fn write_collection<T: Serialize>(&self, key: &'static str, values: &[T]) -> StoreResult<()> {
        let bytes = serde_json::to_vec(values)?;
        if let Some(limit) = self.quota
            && bytes.len() > limit
        {
            return Err(StoreError::QuotaExceeded {
                collection: key,
                size: bytes.len(),
                limit,
            });
        }

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(COLLECTIONS_TABLE)?;
            table.insert(key, bytes.as_slice())?;
        }
        txn.commit()?;
        tracing::debug!(collection = key, count = values.len(), "Collection written");
        Ok(())
    }

    // ========== Settings ==========

    /// Read a settings record
    pub fn get_setting<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SETTINGS_TABLE)?;
        match table.get(key)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Write a settings record
    pub fn put_setting<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value)?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS_TABLE)?;
            table.insert(key, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Delete a settings record (absent is fine)
    pub fn remove_setting(&self, key: &str) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS_TABLE)?;
            table.remove(key)?;
        }
        txn.commit()?;
        Ok(())
    }
}

#[async_trait]
impl StoreAdapter for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn read_items(&self) -> StoreResult<Vec<PantryItem>> {
        self.read_collection(ITEMS_KEY)
    }

    async fn write_items(&self, items: &[PantryItem]) -> StoreResult<()> {
        self.write_collection(ITEMS_KEY, items)
    }

    async fn read_orders(&self) -> StoreResult<Vec<Order>> {
        self.read_collection(ORDERS_KEY)
    }

    async fn write_orders(&self, orders: &[Order]) -> StoreResult<()> {
        self.write_collection(ORDERS_KEY, orders)
    }
}
