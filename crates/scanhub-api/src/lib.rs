// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Scanhub control plane
//!
//! REST surface under `/api/v1` plus the `/ws/live` WebSocket. Both fronts
//! delegate to the same [`ControlAdapter`], which serializes configuration
//! patches, rebuilds downstream pipeline state, and broadcasts updates to
//! live subscribers.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod auth;
pub mod control;
pub mod endpoints;
pub mod error;
pub mod server;
pub mod ws;

pub use control::ControlAdapter;
pub use error::ApiError;
pub use server::build_router;
pub use ws::WsHub;
