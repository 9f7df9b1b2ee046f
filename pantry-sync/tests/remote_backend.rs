//! Remote mode against a mock PostgREST-style backend
//!
//! The mock serves `/rest/v1/{table}` (GET/POST/PATCH/DELETE with `eq.`
//! filters) and a realtime websocket that pushes `postgres_changes` frames to
//! joined channels after every mutation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use reqwest::Url;
use serde_json::{Value, json};
use tokio::sync::{Mutex, broadcast};

use pantry_sync::store::{StockDeduction, StoreAdapter};
use pantry_sync::{
    BackendMode, BackendSelector, ChangeBus, InventoryService, LocalStore, RemoteStore, StoreError,
};
use shared::{ItemCandidate, NewOrder, Order, OrderItem, OrderStatus, PantryItem};

const API_KEY: &str = "test-anon-key";

// ========== Mock backend ==========

struct MockBackend {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    changes: broadcast::Sender<String>,
    joins: AtomicUsize,
    sockets: AtomicUsize,
    /// POST answers 503 while set
    reject_upserts: AtomicBool,
}

type Shared = Arc<MockBackend>;

impl MockBackend {
    async fn rows(&self, table: &str) -> Vec<Value> {
        self.tables.lock().await.get(table).cloned().unwrap_or_default()
    }

    /// Out-of-band write, as another device would do
    async fn set_quantity(&self, id: &str, quantity: u32) {
        let mut tables = self.tables.lock().await;
        if let Some(row) = tables
            .get_mut("pantry_items")
            .and_then(|rows| rows.iter_mut().find(|r| r["id"] == id))
        {
            row["quantity"] = json!(quantity);
        }
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    let bearer = format!("Bearer {API_KEY}");
    headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(API_KEY)
        && headers.get("authorization").and_then(|v| v.to_str().ok()) == Some(bearer.as_str())
}

fn matches_filters(row: &Value, params: &HashMap<String, String>) -> bool {
    params
        .iter()
        .filter(|(column, _)| column.as_str() != "select")
        .all(|(column, filter)| {
            let Some(expected) = filter.strip_prefix("eq.") else {
                return false;
            };
            match row.get(column) {
                Some(Value::String(s)) => s == expected,
                Some(other) => other.to_string() == expected,
                None => false,
            }
        })
}

fn project(row: &Value, select: Option<&String>) -> Value {
    match select.map(String::as_str) {
        None | Some("*") => row.clone(),
        Some(columns) => {
            let mut out = serde_json::Map::new();
            for column in columns.split(',') {
                if let Some(value) = row.get(column) {
                    out.insert(column.to_string(), value.clone());
                }
            }
            Value::Object(out)
        }
    }
}

async fn select_rows(
    State(state): State<Shared>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let tables = state.tables.lock().await;
    let rows: Vec<Value> = tables
        .get(&table)
        .map(|rows| {
            rows.iter()
                .filter(|r| matches_filters(r, &params))
                .map(|r| project(r, params.get("select")))
                .collect()
        })
        .unwrap_or_default();
    Json(rows).into_response()
}

async fn upsert_rows(
    State(state): State<Shared>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(rows): Json<Vec<Value>>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if state.reject_upserts.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    {
        let mut tables = state.tables.lock().await;
        let existing = tables.entry(table.clone()).or_default();
        for row in rows {
            match existing.iter_mut().find(|r| r.get("id") == row.get("id")) {
                Some(slot) => *slot = row,
                None => existing.push(row),
            }
        }
    }
    let _ = state.changes.send(table);
    StatusCode::CREATED.into_response()
}

async fn update_rows(
    State(state): State<Shared>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(patch): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let updated: Vec<Value> = {
        let mut tables = state.tables.lock().await;
        let rows = tables.entry(table.clone()).or_default();
        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|r| matches_filters(r, &params)) {
            if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
                for (key, value) in fields {
                    target.insert(key.clone(), value.clone());
                }
            }
            updated.push(row.clone());
        }
        updated
    };
    if !updated.is_empty() {
        let _ = state.changes.send(table);
    }
    Json(updated).into_response()
}

async fn delete_rows(
    State(state): State<Shared>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let removed: Vec<Value> = {
        let mut tables = state.tables.lock().await;
        let rows = tables.entry(table.clone()).or_default();
        let (removed, kept): (Vec<Value>, Vec<Value>) = std::mem::take(rows)
            .into_iter()
            .partition(|r| matches_filters(r, &params));
        *rows = kept;
        removed
    };
    if !removed.is_empty() {
        let _ = state.changes.send(table);
    }
    Json(removed).into_response()
}

async fn realtime(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    if params.get("apikey").map(String::as_str) != Some(API_KEY) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| realtime_session(state, socket))
}

async fn realtime_session(state: Shared, mut socket: WebSocket) {
    let mut changes = state.changes.subscribe();
    let mut joined: HashSet<String> = HashSet::new();
    state.sockets.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else {
                        continue;
                    };
                    if frame["event"] == "phx_join" {
                        if let Some(topic) = frame["topic"].as_str() {
                            joined.insert(topic.to_string());
                        }
                        state.joins.fetch_add(1, Ordering::SeqCst);
                        let reply = json!({
                            "topic": frame["topic"],
                            "event": "phx_reply",
                            "payload": { "status": "ok", "response": {} },
                            "ref": frame["ref"],
                        });
                        if socket.send(Message::Text(reply.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            change = changes.recv() => {
                let Ok(table) = change else {
                    break;
                };
                let topic = format!("realtime:public:{table}");
                if !joined.contains(&topic) {
                    continue;
                }
                let frame = json!({
                    "topic": topic,
                    "event": "postgres_changes",
                    "payload": { "data": { "schema": "public", "table": table, "type": "UPDATE" } },
                    "ref": null,
                });
                if socket.send(Message::Text(frame.to_string().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.sockets.fetch_sub(1, Ordering::SeqCst);
}

async fn start_mock() -> (String, Shared) {
    let (changes, _) = broadcast::channel(64);
    let state = Arc::new(MockBackend {
        tables: Mutex::new(HashMap::new()),
        changes,
        joins: AtomicUsize::new(0),
        sockets: AtomicUsize::new(0),
        reject_upserts: AtomicBool::new(false),
    });

    let app = Router::new()
        .route(
            "/rest/v1/{table}",
            get(select_rows)
                .post(upsert_rows)
                .patch(update_rows)
                .delete(delete_rows),
        )
        .route("/realtime/v1/websocket", get(realtime))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), state)
}

// ========== Helpers ==========

async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}

async fn remote_service(base: &str) -> InventoryService {
    let selector = BackendSelector::new(LocalStore::open_in_memory().unwrap(), ChangeBus::new())
        .with_remote_timeout(Duration::from_secs(5));
    selector.configure(base, API_KEY).await.unwrap();
    InventoryService::new(Arc::new(selector))
}

fn peer_store(base: &str, key: &str) -> RemoteStore {
    RemoteStore::new(Url::parse(base).unwrap(), key, Duration::from_secs(5)).unwrap()
}

// ========== Tests ==========

#[tokio::test]
async fn test_merge_add_writes_snake_case_rows() {
    let (base, mock) = start_mock().await;
    let service = remote_service(&base).await;

    service
        .add_or_update_item(ItemCandidate::new("Coffee", 5, "cup").with_category("Beverages"))
        .await
        .unwrap();
    let outcome = service
        .add_or_update_item(ItemCandidate::new(" coffee", 3, "Cup"))
        .await
        .unwrap();
    assert!(outcome.is_restock());
    assert_eq!(outcome.item().quantity, 8);

    let rows = mock.rows("pantry_items").await;
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert!(row.get("added_date").is_some());
    assert!(row.get("addedDate").is_none());
    assert_eq!(row["quantity"], 8);
    assert_eq!(row["unit"], "cup");
    assert_eq!(row["category"], "Beverages");

    let items = service.get_items().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 8);
    assert_eq!(items[0].added_date, outcome.item().added_date);
}

#[tokio::test]
async fn test_place_order_visible_remotely() {
    let (base, mock) = start_mock().await;
    let service = remote_service(&base).await;
    let tea = service
        .add_or_update_item(ItemCandidate::new("Tea", 5, "cup"))
        .await
        .unwrap()
        .item()
        .clone();

    let placed = service
        .place_order(NewOrder::new("101", vec![OrderItem::snapshot(&tea, 2)]))
        .await
        .unwrap();
    assert!(placed.is_complete());

    let orders = mock.rows("orders").await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["room_number"], "101");
    assert_eq!(orders[0]["status"], "pending");
    assert_eq!(orders[0]["items"][0]["item_id"].as_str(), Some(tea.id.as_str()));
    assert_eq!(mock.rows("pantry_items").await[0]["quantity"], 3);

    // Another device sees the same data
    let peer = peer_store(&base, API_KEY);
    let seen = peer.read_orders().await.unwrap();
    assert_eq!(seen[0].id, placed.order.id);
    assert_eq!(seen[0].items[0].item_id, tea.id);
    assert_eq!(service.get_orders().await[0].id, placed.order.id);

    let err = service
        .place_order(NewOrder::new("102", vec![OrderItem::snapshot(&tea, 4)]))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Not enough stock for Tea, only 3 left");
    assert_eq!(mock.rows("orders").await.len(), 1);
}

#[tokio::test]
async fn test_status_update_and_delete_remote() {
    let (base, mock) = start_mock().await;
    let service = remote_service(&base).await;
    let tea = service
        .add_or_update_item(ItemCandidate::new("Tea", 5, "cup"))
        .await
        .unwrap()
        .item()
        .clone();
    let order = service
        .place_order(NewOrder::new("101", vec![OrderItem::snapshot(&tea, 1)]))
        .await
        .unwrap()
        .order;

    assert!(service.update_order_status(&order.id, OrderStatus::Preparing).await.unwrap());
    assert_eq!(mock.rows("orders").await[0]["status"], "preparing");
    assert!(mock.rows("orders").await[0]["completed_at"].is_null());

    assert!(service.update_order_status(&order.id, OrderStatus::Delivered).await.unwrap());
    let row = mock.rows("orders").await.remove(0);
    assert_eq!(row["status"], "delivered");
    assert!(row["completed_at"].is_string());

    service.delete_item(&tea.id).await.unwrap();
    assert!(mock.rows("pantry_items").await.is_empty());
    service.delete_item(&tea.id).await.unwrap();
}

#[tokio::test]
async fn test_peer_change_triggers_bus() {
    let (base, mock) = start_mock().await;
    let service = remote_service(&base).await;
    assert!(wait_until(|| mock.joins.load(Ordering::SeqCst) >= 2).await);

    let mut changes = service.subscribe();
    let peer = peer_store(&base, API_KEY);
    let towel = PantryItem::from_candidate(ItemCandidate::new("Towel", 4, "piece"));
    peer.upsert_item(&towel).await.unwrap();

    let changed = tokio::time::timeout(Duration::from_secs(5), changes.changed()).await;
    assert_eq!(changed.ok(), Some(true));
    let items = service.get_items().await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Towel");
}

#[tokio::test]
async fn test_stale_deduction_is_reported_not_applied() {
    let (base, mock) = start_mock().await;
    let store = peer_store(&base, API_KEY);
    let tea = PantryItem::from_candidate(ItemCandidate::new("Tea", 5, "cup"));
    store.upsert_item(&tea).await.unwrap();

    // Another device takes one after we validated against 5
    mock.set_quantity(&tea.id, 4).await;

    let order = Order::from_request(NewOrder::new("101", vec![OrderItem::snapshot(&tea, 2)]));
    let deduction = StockDeduction {
        item_id: tea.id.clone(),
        name: tea.name.clone(),
        requested: 2,
        expected: 5,
    };
    let report = store.commit_order(&order, &[deduction]).await.unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.failures[0].item_id, tea.id);
    assert_eq!(mock.rows("orders").await.len(), 1);
    assert_eq!(mock.rows("pantry_items").await[0]["quantity"], 4);
}

#[tokio::test]
async fn test_write_items_prunes_missing_rows() {
    let (base, mock) = start_mock().await;
    let store = peer_store(&base, API_KEY);
    let tea = PantryItem::from_candidate(ItemCandidate::new("Tea", 5, "cup"));
    let chips = PantryItem::from_candidate(ItemCandidate::new("Chips", 2, "pack"));
    store.write_items(&[tea.clone(), chips]).await.unwrap();
    assert_eq!(mock.rows("pantry_items").await.len(), 2);

    store.write_items(&[tea.clone()]).await.unwrap();
    let rows = mock.rows("pantry_items").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"].as_str(), Some(tea.id.as_str()));
}

#[tokio::test]
async fn test_failed_write_items_keeps_existing_rows() {
    let (base, mock) = start_mock().await;
    let store = peer_store(&base, API_KEY);
    let tea = PantryItem::from_candidate(ItemCandidate::new("Tea", 5, "cup"));
    let chips = PantryItem::from_candidate(ItemCandidate::new("Chips", 2, "pack"));
    store.write_items(&[tea.clone(), chips]).await.unwrap();

    mock.reject_upserts.store(true, Ordering::SeqCst);
    let replacement = PantryItem::from_candidate(ItemCandidate::new("Water", 1, "bottle"));
    let err = store.write_items(&[replacement]).await.unwrap_err();
    assert!(matches!(err, StoreError::Status { status: 503, .. }));

    let rows = mock.rows("pantry_items").await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().any(|r| r["id"].as_str() == Some(tea.id.as_str())));
}

#[tokio::test]
async fn test_restock_does_not_overwrite_peer_deduction() {
    let (base, mock) = start_mock().await;
    let store = peer_store(&base, API_KEY);
    let mut tea = PantryItem::from_candidate(ItemCandidate::new("Tea", 5, "cup"));
    store.upsert_item(&tea).await.unwrap();

    // We read 5 and add 3; meanwhile another device deducts down to 3
    mock.set_quantity(&tea.id, 3).await;
    tea.quantity = 8;
    let err = store.restock_item(&tea, 5).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(ref name) if name == "Tea"));
    assert_eq!(mock.rows("pantry_items").await[0]["quantity"], 3);

    // Re-read and retry lands on top of the peer's write
    tea.quantity = 6;
    store.restock_item(&tea, 3).await.unwrap();
    assert_eq!(mock.rows("pantry_items").await[0]["quantity"], 6);
}

#[tokio::test]
async fn test_transport_errors_surface() {
    let (base, _mock) = start_mock().await;
    let wrong_key = peer_store(&base, "wrong-key");
    let err = wrong_key.read_items().await.unwrap_err();
    assert!(matches!(err, StoreError::Status { status: 401, .. }));
    assert!(!err.is_transient());

    let offline = peer_store("http://127.0.0.1:9", API_KEY);
    let err = offline.read_orders().await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_teardown_closes_realtime_and_reverts() {
    let (base, mock) = start_mock().await;
    let service = remote_service(&base).await;
    assert!(wait_until(|| mock.sockets.load(Ordering::SeqCst) == 1).await);

    service
        .add_or_update_item(ItemCandidate::new("Tea", 5, "cup"))
        .await
        .unwrap();

    let selector = service.selector();
    selector.teardown().await.unwrap();
    assert_eq!(selector.mode().await, BackendMode::Local);
    assert!(wait_until(|| mock.sockets.load(Ordering::SeqCst) == 0).await);

    // Local store is separate; remote data is untouched
    assert!(service.get_items().await.is_empty());
    assert_eq!(mock.rows("pantry_items").await.len(), 1);
}
