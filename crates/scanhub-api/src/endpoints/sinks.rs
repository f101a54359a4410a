// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sink descriptor endpoints.

use super::parse_body;
use crate::auth::authorize;
use crate::control::ControlAdapter;
use crate::error::ApiError;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use serde_json::Value;
use std::sync::Arc;

pub async fn list(State(adapter): State<Arc<ControlAdapter>>) -> Json<Value> {
    Json(adapter.sinks_json())
}

pub async fn create(
    State(adapter): State<Arc<ControlAdapter>>,
    headers: HeaderMap,
    body: String,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    authorize(&adapter.api_token(), &headers)?;
    let sink = parse_body(&body)?;
    Ok((StatusCode::CREATED, Json(adapter.add_sink(&sink)?)))
}

pub async fn patch_one(
    State(adapter): State<Arc<ControlAdapter>>,
    Path(index): Path<usize>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    authorize(&adapter.api_token(), &headers)?;
    let patch = parse_body(&body)?;
    Ok(Json(adapter.update_sink(index, &patch)?))
}

pub async fn remove(
    State(adapter): State<Arc<ControlAdapter>>,
    Path(index): Path<usize>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    authorize(&adapter.api_token(), &headers)?;
    Ok(Json(adapter.delete_sink(index)?))
}
