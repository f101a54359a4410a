// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Live WebSocket tests against a real listener: snapshot on connect,
//! ok/error replies with `ref`, and update broadcasts.

use futures_util::{SinkExt, StreamExt};
use scanhub_api::{build_router, ControlAdapter, WsHub};
use scanhub_core::{DbscanHandle, DetectionPipeline, FilterManager, SlotManager};
use scanhub_io::PublisherManager;
use scanhub_sensors::DriverRegistry;
use scanhub_types::AppConfig;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_tungstenite::tungstenite::Message;

async fn spawn_server() -> (String, Arc<ControlAdapter>, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = AppConfig::default();
    let slots = Arc::new(SlotManager::new(DriverRegistry::with_builtin()));
    let pipeline = Arc::new(DetectionPipeline::new(
        Arc::new(FilterManager::new(
            config.prefilter.clone(),
            config.postfilter.clone(),
        )),
        Arc::new(DbscanHandle::new(config.dbscan.clone())),
        config.world_mask.clone(),
        Arc::new(PublisherManager::new()),
    ));
    let adapter = Arc::new(ControlAdapter::new(
        config,
        slots,
        pipeline,
        WsHub::new(),
        dir.path().to_path_buf(),
    ));
    adapter.apply_initial_runtime();

    let router = build_router(adapter.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("ws://{}/ws/live", addr), adapter, dir)
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn next_json(stream: &mut WsStream) -> Value {
    loop {
        match stream.next().await.expect("stream ended").unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

#[tokio::test]
async fn snapshot_arrives_on_connect() {
    let (url, _adapter, _dir) = spawn_server().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

    let snapshot = next_json(&mut socket).await;
    assert_eq!(snapshot["type"], "sensor.snapshot");
    assert!(snapshot["sensors"].is_array());
    assert!(snapshot["filter_config"]["prefilter"].is_object());
    assert!(snapshot["dbscan"]["eps_norm"].is_number());
}

#[tokio::test]
async fn dbscan_update_is_acked_and_broadcast() {
    let (url, _adapter, _dir) = spawn_server().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let _snapshot = next_json(&mut socket).await;

    socket
        .send(Message::Text(
            json!({"type": "dbscan.update", "config": {"eps_norm": 1.25}}).to_string(),
        ))
        .await
        .unwrap();

    // Both the broadcast and the direct ack arrive; order is not fixed.
    let mut saw_ok = false;
    let mut saw_updated = false;
    for _ in 0..2 {
        let message = next_json(&mut socket).await;
        match message["type"].as_str().unwrap() {
            "ok" => {
                assert_eq!(message["ref"], "dbscan.update");
                saw_ok = true;
            }
            "dbscan.updated" => {
                assert_eq!(message["config"]["eps_norm"], 1.25);
                saw_updated = true;
            }
            other => panic!("unexpected message type {}", other),
        }
    }
    assert!(saw_ok && saw_updated);
}

#[tokio::test]
async fn invalid_update_gets_error_reply_with_ref() {
    let (url, _adapter, _dir) = spawn_server().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let _snapshot = next_json(&mut socket).await;

    socket
        .send(Message::Text(
            json!({"type": "sensor.update", "id": "ghost", "patch": {"tx": 1.0}})
                .to_string(),
        ))
        .await
        .unwrap();

    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["ref"], "sensor.update");
    assert!(reply["message"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn request_config_messages_answer_directly() {
    let (url, _adapter, _dir) = spawn_server().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let _snapshot = next_json(&mut socket).await;

    socket
        .send(Message::Text(
            json!({"type": "filter.requestConfig"}).to_string(),
        ))
        .await
        .unwrap();
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "filter.config");
    assert!(reply["config"]["postfilter"]["isolation_removal"].is_object());

    socket
        .send(Message::Text(
            json!({"type": "dbscan.requestConfig"}).to_string(),
        ))
        .await
        .unwrap();
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "dbscan.config");
}

#[tokio::test]
async fn world_update_round_trips_over_ws() {
    let (url, adapter, _dir) = spawn_server().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let _snapshot = next_json(&mut socket).await;

    socket
        .send(Message::Text(
            json!({
                "type": "world.update",
                "patch": {"world_mask": {"includes": [[[0.0,0.0],[4.0,0.0],[4.0,4.0],[0.0,4.0]]]}}
            })
            .to_string(),
        ))
        .await
        .unwrap();

    let mut saw_ok = false;
    let mut saw_world = false;
    for _ in 0..2 {
        let message = next_json(&mut socket).await;
        match message["type"].as_str().unwrap() {
            "ok" => saw_ok = true,
            "world.updated" => {
                assert_eq!(message["world_mask"]["include"].as_array().unwrap().len(), 1);
                saw_world = true;
            }
            other => panic!("unexpected message type {}", other),
        }
    }
    assert!(saw_ok && saw_world);

    let exported = adapter.configs_export().unwrap();
    assert!(exported.contains("world_mask"));
}
