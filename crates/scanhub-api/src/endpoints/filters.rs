// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Filter configuration endpoints.

use super::parse_body;
use crate::auth::authorize;
use crate::control::ControlAdapter;
use crate::error::ApiError;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use serde_json::Value;
use std::sync::Arc;

pub async fn get_all(State(adapter): State<Arc<ControlAdapter>>) -> Json<Value> {
    Json(adapter.filters_json())
}

pub async fn get_prefilter(State(adapter): State<Arc<ControlAdapter>>) -> Json<Value> {
    Json(adapter.filters_json()["prefilter"].clone())
}

pub async fn put_prefilter(
    State(adapter): State<Arc<ControlAdapter>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    authorize(&adapter.api_token(), &headers)?;
    let config = parse_body(&body)?;
    Ok(Json(adapter.put_prefilter(&config)?))
}

pub async fn get_postfilter(State(adapter): State<Arc<ControlAdapter>>) -> Json<Value> {
    Json(adapter.filters_json()["postfilter"].clone())
}

pub async fn put_postfilter(
    State(adapter): State<Arc<ControlAdapter>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    authorize(&adapter.api_token(), &headers)?;
    let config = parse_body(&body)?;
    Ok(Json(adapter.put_postfilter(&config)?))
}
