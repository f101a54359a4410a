// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sensor CRUD and patch endpoints.

use super::parse_body;
use crate::auth::authorize;
use crate::control::ControlAdapter;
use crate::error::ApiError;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn list(State(adapter): State<Arc<ControlAdapter>>) -> Json<Value> {
    Json(adapter.sensors_json())
}

pub async fn get_one(
    State(adapter): State<Arc<ControlAdapter>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(adapter.sensor_json(&id)?))
}

pub async fn patch_one(
    State(adapter): State<Arc<ControlAdapter>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    authorize(&adapter.api_token(), &headers)?;
    let patch = parse_body(&body)?;
    Ok(Json(adapter.patch_sensor(&id, &patch)?))
}

pub async fn create(
    State(adapter): State<Arc<ControlAdapter>>,
    headers: HeaderMap,
    body: String,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    authorize(&adapter.api_token(), &headers)?;
    let sensor = parse_body(&body)?;
    Ok((StatusCode::CREATED, Json(adapter.add_sensor(&sensor)?)))
}

pub async fn remove(
    State(adapter): State<Arc<ControlAdapter>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    authorize(&adapter.api_token(), &headers)?;
    adapter.delete_sensor(&id)?;
    Ok(Json(json!({"deleted": id})))
}
