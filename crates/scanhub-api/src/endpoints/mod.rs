// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! REST endpoint handlers under `/api/v1`
//!
//! Thin axum adapters: authorize, parse the body, delegate to the control
//! adapter, wrap the result. All mutation logic lives in
//! [`crate::control::ControlAdapter`].

pub mod configs;
pub mod dbscan;
pub mod filters;
pub mod sensors;
pub mod sinks;
pub mod snapshot;

use crate::error::ApiError;
use serde_json::Value;

/// Parse a request body, mapping failures to the `invalid_json` envelope.
pub(crate) fn parse_body(body: &str) -> Result<Value, ApiError> {
    serde_json::from_str(body)
        .map_err(|_| ApiError::invalid_json("Invalid JSON in request body"))
}
