// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Live WebSocket hub
//!
//! One endpoint (`/ws/live`). The server pushes a full snapshot on connect,
//! streams `raw-lite` / `filtered-lite` / `clusters-lite` frames plus
//! focused update broadcasts, and answers client messages with
//! `{type:"ok"|"error", ref:<origin>}`. Client mutations delegate to the
//! same control-adapter logic as the REST endpoints.
//!
//! The hub is a tokio broadcast channel; the aggregation thread can publish
//! into it synchronously, and slow consumers drop messages rather than
//! back-pressuring the tick.

use crate::control::ControlAdapter;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use scanhub_types::{Cluster, ScanFrame};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

const BROADCAST_CAPACITY: usize = 256;

/// Fan-out channel shared by the pipeline taps and every WS client.
#[derive(Clone)]
pub struct WsHub {
    tx: broadcast::Sender<String>,
}

impl WsHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Send to all connected clients. No receivers is normal, not an error.
    pub fn broadcast(&self, message: &Value) {
        let _ = self.tx.send(message.to_string());
    }

    pub fn push_raw_lite(&self, frame: &ScanFrame) {
        self.broadcast(&json!({
            "type": "raw-lite",
            "t": frame.t_ns,
            "seq": frame.seq,
            "xy": frame.xy,
            "sid": frame.sid,
        }));
    }

    pub fn push_filtered_lite(&self, frame: &ScanFrame) {
        self.broadcast(&json!({
            "type": "filtered-lite",
            "t": frame.t_ns,
            "seq": frame.seq,
            "xy": frame.xy,
            "sid": frame.sid,
        }));
    }

    pub fn push_clusters_lite(&self, t_ns: u64, seq: u32, clusters: &[Cluster]) {
        let items: Vec<Value> = clusters
            .iter()
            .map(|c| {
                json!({
                    "id": c.id,
                    "cx": c.cx,
                    "cy": c.cy,
                    "minx": c.minx,
                    "miny": c.miny,
                    "maxx": c.maxx,
                    "maxy": c.maxy,
                    "count": c.count(),
                    "sensor_mask": c.sensor_mask,
                })
            })
            .collect();
        self.broadcast(&json!({
            "type": "clusters-lite",
            "t": t_ns,
            "seq": seq,
            "items": items,
        }));
    }
}

impl Default for WsHub {
    fn default() -> Self {
        Self::new()
    }
}

/// `GET /ws/live` upgrade handler.
pub async fn ws_live_handler(
    ws: WebSocketUpgrade,
    State(adapter): State<Arc<ControlAdapter>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_client(socket, adapter))
}

async fn handle_client(mut socket: WebSocket, adapter: Arc<ControlAdapter>) {
    let mut rx = adapter.hub().subscribe();
    info!("live client connected");

    // Full snapshot on connect.
    let mut snapshot = json!({"type": "sensor.snapshot"});
    merge_objects(&mut snapshot, adapter.live_snapshot());
    if socket.send(Message::Text(snapshot.to_string())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            broadcasted = rx.recv() => {
                match broadcasted {
                    Ok(text) => {
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    // Lagged receivers resubscribe implicitly; drop and go on.
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "live client lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_client_message(&adapter, &text) {
                            if socket.send(Message::Text(reply.to_string())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    info!("live client disconnected");
}

fn ok_reply(origin: &str) -> Value {
    json!({"type": "ok", "ref": origin})
}

fn error_reply(origin: &str, message: impl std::fmt::Display) -> Value {
    json!({"type": "error", "ref": origin, "message": message.to_string()})
}

/// Dispatch one client message; returns the direct reply, if any.
fn handle_client_message(adapter: &ControlAdapter, text: &str) -> Option<Value> {
    let message: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => return Some(error_reply("", format!("invalid JSON: {}", err))),
    };
    let kind = message.get("type").and_then(Value::as_str).unwrap_or("");

    let reply = match kind {
        "sensor.requestSnapshot" => {
            let mut snapshot = json!({"type": "sensor.snapshot"});
            merge_objects(&mut snapshot, adapter.live_snapshot());
            snapshot
        }
        "sensor.enable" => {
            let id = message.get("id").and_then(Value::as_str).unwrap_or("");
            let enabled = message
                .get("enabled")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            match adapter.set_sensor_enabled(id, enabled) {
                Ok(_) => ok_reply(kind),
                Err(err) => error_reply(kind, err.message),
            }
        }
        "sensor.update" => {
            let id = message.get("id").and_then(Value::as_str).unwrap_or("");
            let patch = message.get("patch").cloned().unwrap_or(Value::Null);
            match adapter.patch_sensor(id, &patch) {
                Ok(_) => ok_reply(kind),
                Err(err) => error_reply(kind, err.message),
            }
        }
        "sensor.add" => {
            let body = message.get("sensor").cloned().unwrap_or(Value::Null);
            match adapter.add_sensor(&body) {
                Ok(_) => ok_reply(kind),
                Err(err) => error_reply(kind, err.message),
            }
        }
        "filter.update" => {
            let config = message.get("config").cloned().unwrap_or(Value::Null);
            match adapter.update_filters(&config) {
                Ok(_) => ok_reply(kind),
                Err(err) => error_reply(kind, err.message),
            }
        }
        "filter.requestConfig" => json!({
            "type": "filter.config",
            "config": adapter.filters_json(),
        }),
        "dbscan.requestConfig" => json!({
            "type": "dbscan.config",
            "config": adapter.dbscan_json(),
        }),
        "dbscan.update" => {
            let config = message.get("config").cloned().unwrap_or(Value::Null);
            match adapter.update_dbscan(&config) {
                Ok(_) => ok_reply(kind),
                Err(err) => error_reply(kind, err.message),
            }
        }
        "sink.add" => {
            let body = message.get("sink").cloned().unwrap_or(Value::Null);
            match adapter.add_sink(&body) {
                Ok(_) => ok_reply(kind),
                Err(err) => error_reply(kind, err.message),
            }
        }
        "sink.update" => {
            let index = message.get("index").and_then(Value::as_u64).unwrap_or(u64::MAX);
            let patch = message.get("patch").cloned().unwrap_or(Value::Null);
            match adapter.update_sink(index as usize, &patch) {
                Ok(_) => ok_reply(kind),
                Err(err) => error_reply(kind, err.message),
            }
        }
        "sink.delete" => {
            let index = message.get("index").and_then(Value::as_u64).unwrap_or(u64::MAX);
            match adapter.delete_sink(index as usize) {
                Ok(_) => ok_reply(kind),
                Err(err) => error_reply(kind, err.message),
            }
        }
        "world.update" => {
            let patch = message.get("patch").cloned().unwrap_or(Value::Null);
            match adapter.update_world_mask(&patch) {
                Ok(_) => ok_reply(kind),
                Err(err) => error_reply(kind, err.message),
            }
        }
        other => error_reply(other, format!("unknown message type '{}'", other)),
    };
    Some(reply)
}

fn merge_objects(target: &mut Value, source: Value) {
    if let (Some(target), Some(source)) = (target.as_object_mut(), source.as_object()) {
        for (key, value) in source {
            target.insert(key.clone(), value.clone());
        }
    }
}
