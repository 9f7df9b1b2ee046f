//! Realtime row-change feed
//!
//! 1. Connect the websocket at `{endpoint}/realtime/v1/websocket`
//! 2. Join one channel per table (`realtime:public:{table}`)
//! 3. Every insert/update/delete event → `ChangeBus::notify`
//! 4. Heartbeat every 25s on the `phoenix` topic
//! 5. Reconnect with exponential backoff; a reconnect also notifies, since
//!    changes may have been missed while offline
//!
//! Dropping or cancelling the [`RealtimeSubscription`] stops the worker.

use futures::{SinkExt, StreamExt};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::rows::{ITEMS_TABLE, ORDERS_TABLE};
use crate::message::ChangeBus;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Heartbeat interval
const HEARTBEAT_INTERVAL_SECS: u64 = 25;
/// Initial reconnect delay
const INITIAL_RECONNECT_DELAY_MS: u64 = 500;
/// Max reconnect delay
const MAX_RECONNECT_DELAY_SECS: u64 = 30;

/// Channel frame (`{topic, event, payload, ref}`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default, rename = "ref")]
    pub msg_ref: Option<String>,
}

impl Frame {
    fn join(table: &str, msg_ref: u64) -> Self {
        Self {
            topic: format!("realtime:public:{table}"),
            event: "phx_join".to_string(),
            payload: serde_json::json!({
                "config": {
                    "postgres_changes": [
                        { "event": "*", "schema": "public", "table": table }
                    ]
                }
            }),
            msg_ref: Some(msg_ref.to_string()),
        }
    }

    fn heartbeat(msg_ref: u64) -> Self {
        Self {
            topic: "phoenix".to_string(),
            event: "heartbeat".to_string(),
            payload: serde_json::json!({}),
            msg_ref: Some(msg_ref.to_string()),
        }
    }

    /// Row insert/update/delete on one of our channels
    pub(crate) fn is_row_change(&self) -> bool {
        self.topic.starts_with("realtime:")
            && matches!(
                self.event.as_str(),
                "postgres_changes" | "INSERT" | "UPDATE" | "DELETE"
            )
    }
}

/// Websocket URL for an endpoint (`http` → `ws`, `https` → `wss`)
pub(crate) fn realtime_url(endpoint: &Url, credential: &str) -> Option<Url> {
    let base = endpoint
        .as_str()
        .trim_end_matches('/')
        .replacen("https://", "wss://", 1)
        .replacen("http://", "ws://", 1);
    Url::parse_with_params(
        &format!("{base}/realtime/v1/websocket"),
        &[("apikey", credential), ("vsn", "1.0.0")],
    )
    .ok()
}

/// Handle to the standing subscription of one remote context
#[derive(Debug)]
pub struct RealtimeSubscription {
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl RealtimeSubscription {
    pub(crate) fn spawn(endpoint: &Url, credential: &str, bus: ChangeBus) -> Self {
        let shutdown = CancellationToken::new();
        let Some(url) = realtime_url(endpoint, credential) else {
            tracing::warn!(endpoint = %endpoint, "Cannot derive realtime URL, live updates disabled");
            shutdown.cancel();
            return Self {
                shutdown,
                task: None,
            };
        };

        let worker = RealtimeWorker {
            url,
            bus,
            shutdown: shutdown.clone(),
        };
        Self {
            shutdown,
            task: Some(tokio::spawn(worker.run())),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    /// Signal the worker to stop (non-blocking)
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    /// Stop the worker and wait for it to exit
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!("Realtime worker ended abnormally: {e}");
        }
    }
}

impl Drop for RealtimeSubscription {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct RealtimeWorker {
    url: Url,
    bus: ChangeBus,
    shutdown: CancellationToken,
}

impl RealtimeWorker {
    async fn run(self) {
        tracing::info!(host = ?self.url.host_str(), "Realtime subscription started");
        let mut reconnect_delay = Duration::from_millis(INITIAL_RECONNECT_DELAY_MS);
        let mut connected_before = false;

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let connect = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = tokio_tungstenite::connect_async(self.url.as_str()) => result,
            };

            match connect {
                Ok((ws, _response)) => {
                    reconnect_delay = Duration::from_millis(INITIAL_RECONNECT_DELAY_MS);
                    if connected_before {
                        // Missed events while offline collapse into one refetch
                        self.bus.notify();
                    }
                    connected_before = true;
                    tracing::info!("Realtime websocket connected");
                    self.run_session(ws).await;
                }
                Err(e) => {
                    tracing::warn!(
                        delay_ms = reconnect_delay.as_millis() as u64,
                        "Realtime connection failed: {e}"
                    );
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(reconnect_delay) => {},
            }
            reconnect_delay =
                (reconnect_delay * 2).min(Duration::from_secs(MAX_RECONNECT_DELAY_SECS));
        }

        tracing::info!("Realtime subscription stopped");
    }

    /// Run one websocket session until disconnect or shutdown
    async fn run_session(&self, ws: WsStream) {
        let (mut sink, mut stream) = ws.split();
        let mut msg_ref = 0u64;

        for table in [ITEMS_TABLE, ORDERS_TABLE] {
            msg_ref += 1;
            let join = Frame::join(table, msg_ref);
            let Ok(json) = serde_json::to_string(&join) else {
                continue;
            };
            if let Err(e) = sink.send(Message::text(json)).await {
                tracing::warn!(table, "Failed to join realtime channel: {e}");
                return;
            }
        }

        let mut heartbeat = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return;
                }
                _ = heartbeat.tick() => {
                    msg_ref += 1;
                    let frame = Frame::heartbeat(msg_ref);
                    if let Ok(json) = serde_json::to_string(&frame)
                        && sink.send(Message::text(json)).await.is_err()
                    {
                        tracing::warn!("Realtime heartbeat failed, reconnecting");
                        return;
                    }
                }
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()),
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("Realtime websocket closed by server");
                        return;
                    }
                    Some(Err(e)) => {
                        tracing::warn!("Realtime websocket error: {e}");
                        return;
                    }
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    fn handle_text(&self, text: &str) {
        match serde_json::from_str::<Frame>(text) {
            Ok(frame) if frame.is_row_change() => {
                tracing::debug!(topic = %frame.topic, event = %frame.event, "Remote row change");
                self.bus.notify();
            }
            Ok(frame) => {
                tracing::trace!(topic = %frame.topic, event = %frame.event, "Realtime control frame");
            }
            Err(e) => {
                tracing::debug!("Ignoring malformed realtime frame: {e}");
            }
        }
    }
}
