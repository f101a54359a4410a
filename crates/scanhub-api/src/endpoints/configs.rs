// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Stored-configuration endpoints: list/load/save plus raw YAML
//! import/export of the live configuration.

use super::parse_body;
use crate::auth::authorize;
use crate::control::ControlAdapter;
use crate::error::ApiError;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Json, Response};
use serde_json::Value;
use std::sync::Arc;

fn required_name(body: &str) -> Result<String, ApiError> {
    let value = parse_body(body)?;
    value
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApiError::invalid_field("Missing required field: name"))
}

pub async fn list(
    State(adapter): State<Arc<ControlAdapter>>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(adapter.configs_list()?))
}

pub async fn load(
    State(adapter): State<Arc<ControlAdapter>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    authorize(&adapter.api_token(), &headers)?;
    let name = required_name(&body)?;
    Ok(Json(adapter.configs_load(&name)?))
}

pub async fn save(
    State(adapter): State<Arc<ControlAdapter>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    authorize(&adapter.api_token(), &headers)?;
    let name = required_name(&body)?;
    Ok(Json(adapter.configs_save(&name)?))
}

/// Body is a raw YAML document, not JSON.
pub async fn import(
    State(adapter): State<Arc<ControlAdapter>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    authorize(&adapter.api_token(), &headers)?;
    Ok(Json(adapter.configs_import(&body)?))
}

pub async fn export(
    State(adapter): State<Arc<ControlAdapter>>,
) -> Result<Response, ApiError> {
    let yaml = adapter.configs_export()?;
    Ok(([(header::CONTENT_TYPE, "application/x-yaml")], yaml).into_response())
}
