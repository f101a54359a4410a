// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Aggregate snapshot endpoint.

use crate::control::ControlAdapter;
use axum::extract::State;
use axum::response::Json;
use serde_json::Value;
use std::sync::Arc;

pub async fn get(State(adapter): State<Arc<ControlAdapter>>) -> Json<Value> {
    Json(adapter.snapshot_json())
}
