// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Clustering parameter endpoints.

use super::parse_body;
use crate::auth::authorize;
use crate::control::ControlAdapter;
use crate::error::ApiError;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use serde_json::Value;
use std::sync::Arc;

pub async fn get(State(adapter): State<Arc<ControlAdapter>>) -> Json<Value> {
    Json(adapter.dbscan_json())
}

pub async fn put(
    State(adapter): State<Arc<ControlAdapter>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    authorize(&adapter.api_token(), &headers)?;
    let config = parse_body(&body)?;
    Ok(Json(adapter.update_dbscan(&config)?))
}
