//! Remote store - hosted PostgREST-style backend
//!
//! # Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | read | `GET /rest/v1/{table}?select=*` |
//! | upsert | `POST /rest/v1/{table}` + `Prefer: resolution=merge-duplicates` |
//! | stock deduction, restock | `PATCH /rest/v1/pantry_items?id=eq.{id}&quantity=eq.{seen}` |
//! | delete | `DELETE /rest/v1/{table}?id=eq.{id}` |
//!
//! Every request carries the credential as `apikey` and bearer token, and
//! the client-wide timeout.
//!
//! # Order commit
//!
//! The backend has no multi-row transaction. `commit_order` inserts the order
//! first, then deducts each line with a compare-and-set on the quantity seen
//! at validation. Deductions that fail (after one retry on transport errors)
//! are returned in the [`CommitReport`]; the order is not rolled back.

mod realtime;
pub mod rows;

pub use realtime::RealtimeSubscription;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared::{Order, PantryItem};
use std::collections::HashSet;
use std::time::Duration;

use self::rows::{ITEMS_TABLE, ItemRow, ORDERS_TABLE, OrderRow, QuantityPatch};
use super::{
    CommitReport, DeductionFailure, StockDeduction, StoreAdapter, StoreError, StoreResult,
};
use crate::message::ChangeBus;

const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=minimal";
const PREFER_REPRESENTATION: &str = "return=representation";

#[derive(Debug, Deserialize)]
struct IdRow {
    id: String,
}

/// HTTP adapter for the shared backend
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: Client,
    endpoint: Url,
    credential: String,
}

impl RemoteStore {
    /// Build the client handle. No network traffic happens here.
    pub fn new(endpoint: Url, credential: impl Into<String>, timeout: Duration) -> StoreResult<Self> {
        let credential = credential.into();

        let mut headers = HeaderMap::new();
        let apikey = HeaderValue::from_str(&credential)
            .map_err(|e| StoreError::Remote(format!("Invalid credential header: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {credential}"))
            .map_err(|e| StoreError::Remote(format!("Invalid credential header: {e}")))?;
        headers.insert("apikey", apikey);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            credential,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Start the realtime row-change feed for both tables
    pub fn subscribe(&self, bus: ChangeBus) -> RealtimeSubscription {
        RealtimeSubscription::spawn(&self.endpoint, &self.credential, bus)
    }

    fn table_url(&self, table: &str) -> String {
        format!(
            "{}/rest/v1/{}",
            self.endpoint.as_str().trim_end_matches('/'),
            table
        )
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client.request(method, self.table_url(table))
    }

    /// Map non-success statuses to `StoreError::Status`
    async fn check(response: Response) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, table: &str, select: &str) -> StoreResult<Vec<T>> {
        let response = self
            .request(Method::GET, table)
            .query(&[("select", select)])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn upsert_rows<T: Serialize>(&self, table: &str, rows: &[T]) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let response = self
            .request(Method::POST, table)
            .header("Prefer", PREFER_UPSERT)
            .json(rows)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Delete one row by id; returns how many rows the backend removed
    async fn delete_row(&self, table: &str, id: &str) -> StoreResult<usize> {
        let response = self
            .request(Method::DELETE, table)
            .header("Prefer", PREFER_REPRESENTATION)
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;
        let deleted: Vec<IdRow> = Self::check(response).await?.json().await?;
        Ok(deleted.len())
    }

    /// Remove every row whose id is not in `keep`
    async fn prune<'a>(&self, table: &str, keep: impl Iterator<Item = &'a str>) -> StoreResult<()> {
        let keep: HashSet<&str> = keep.collect();
        let existing: Vec<IdRow> = self.fetch(table, "id").await?;
        for row in existing.iter().filter(|r| !keep.contains(r.id.as_str())) {
            self.delete_row(table, &row.id).await?;
        }
        Ok(())
    }

    /// Compare-and-set on `pantry_items`: the patch only applies if the row's
    /// quantity is still `expected`. No matching row is a `Conflict`.
    async fn patch_item_if<T: Serialize + Sync>(
        &self,
        item_id: &str,
        expected: u32,
        name: &str,
        patch: &T,
    ) -> StoreResult<()> {
        let response = self
            .request(Method::PATCH, ITEMS_TABLE)
            .header("Prefer", PREFER_REPRESENTATION)
            .query(&[
                ("id", format!("eq.{item_id}")),
                ("quantity", format!("eq.{expected}")),
            ])
            .json(patch)
            .send()
            .await?;
        let updated: Vec<ItemRow> = Self::check(response).await?.json().await?;
        if updated.is_empty() {
            return Err(StoreError::Conflict(name.to_string()));
        }
        Ok(())
    }

    async fn deduct_stock(&self, deduction: &StockDeduction) -> StoreResult<()> {
        let patch = QuantityPatch {
            quantity: i64::from(deduction.remaining()),
        };
        self.patch_item_if(&deduction.item_id, deduction.expected, &deduction.name, &patch)
            .await
    }
}

#[async_trait]
impl StoreAdapter for RemoteStore {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn read_items(&self) -> StoreResult<Vec<PantryItem>> {
        let rows: Vec<ItemRow> = self.fetch(ITEMS_TABLE, "*").await?;
        Ok(rows.into_iter().map(PantryItem::from).collect())
    }

    // Upsert before prune: a failed upsert must not leave rows deleted
    async fn write_items(&self, items: &[PantryItem]) -> StoreResult<()> {
        let rows: Vec<ItemRow> = items.iter().map(ItemRow::from).collect();
        self.upsert_rows(ITEMS_TABLE, &rows).await?;
        self.prune(ITEMS_TABLE, items.iter().map(|i| i.id.as_str()))
            .await
    }

    async fn read_orders(&self) -> StoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> = self.fetch(ORDERS_TABLE, "*").await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn write_orders(&self, orders: &[Order]) -> StoreResult<()> {
        let rows: Vec<OrderRow> = orders.iter().map(OrderRow::from).collect();
        self.upsert_rows(ORDERS_TABLE, &rows).await?;
        self.prune(ORDERS_TABLE, orders.iter().map(|o| o.id.as_str()))
            .await
    }

    async fn upsert_item(&self, item: &PantryItem) -> StoreResult<()> {
        self.upsert_rows(ITEMS_TABLE, &[ItemRow::from(item)]).await
    }

    /// Full row as the patch body, guarded by the quantity read before the merge
    async fn restock_item(&self, item: &PantryItem, expected: u32) -> StoreResult<()> {
        self.patch_item_if(&item.id, expected, &item.name, &ItemRow::from(item))
            .await
    }

    async fn delete_item(&self, id: &str) -> StoreResult<bool> {
        Ok(self.delete_row(ITEMS_TABLE, id).await? > 0)
    }

    async fn upsert_order(&self, order: &Order) -> StoreResult<()> {
        self.upsert_rows(ORDERS_TABLE, &[OrderRow::from(order)]).await
    }

    async fn commit_order(
        &self,
        order: &Order,
        deductions: &[StockDeduction],
    ) -> StoreResult<CommitReport> {
        self.upsert_rows(ORDERS_TABLE, &[OrderRow::from(order)])
            .await?;

        let mut report = CommitReport::default();
        for deduction in deductions {
            let mut result = self.deduct_stock(deduction).await;
            if matches!(&result, Err(e) if e.is_transient()) {
                tracing::debug!(item_id = %deduction.item_id, "Retrying stock deduction");
                result = self.deduct_stock(deduction).await;
            }

            if let Err(e) = result {
                tracing::warn!(
                    order_id = %order.id,
                    item_id = %deduction.item_id,
                    requested = deduction.requested,
                    error = %e,
                    "Stock deduction failed after order insert"
                );
                report.failures.push(DeductionFailure {
                    item_id: deduction.item_id.clone(),
                    name: deduction.name.clone(),
                    requested: deduction.requested,
                    reason: e.to_string(),
                });
            }
        }
        Ok(report)
    }
}
