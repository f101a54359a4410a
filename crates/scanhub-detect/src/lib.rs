// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Scanhub detection algorithms
//!
//! The frame-level processing stages between aggregation and publishing:
//! the staged point prefilter, the adaptive normalized-distance DBSCAN, and
//! the per-cluster postfilter. All stages are pure with respect to their
//! configuration; hot reconfiguration is handled by the owning managers.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod dbscan;
pub mod postfilter;
pub mod prefilter;

pub use dbscan::Dbscan;
pub use postfilter::{Postfilter, PostfilterOutput, PostfilterStats};
pub use prefilter::{Prefilter, PrefilterOutput, PrefilterStats};
