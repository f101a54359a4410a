// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bearer-token authorization for write endpoints.

use crate::error::ApiError;
use axum::http::{header, HeaderMap};

/// Check `Authorization: Bearer <token>` against the configured token.
/// An empty configured token disables authorization entirely.
pub fn authorize(expected_token: &str, headers: &HeaderMap) -> Result<(), ApiError> {
    if expected_token.is_empty() {
        return Ok(());
    }
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    match presented {
        Some(token) if token == expected_token => Ok(()),
        _ => Err(ApiError::unauthorized()),
    }
}
