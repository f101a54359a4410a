// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Scanhub core
//!
//! The acquisition-to-detection spine: sensor slots with latest-wins scan
//! storage, the fixed-cadence aggregation tick, hot-swappable filter and
//! clustering state, and the pipeline that turns a frame into published
//! detections.
//!
//! Threading model: N driver callback threads write per-slot latest cells;
//! one aggregation thread snapshots them, builds the frame and runs the
//! whole detection chain; control-plane threads mutate configuration
//! between frames. Driver callbacks only ever take their own slot's mutex.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod filters;
pub mod pipeline;
pub mod slots;
pub mod tick;
pub mod transform;

pub use filters::FilterManager;
pub use pipeline::{ClusterTap, DbscanHandle, DetectionPipeline, FrameTap};
pub use slots::SlotManager;
pub use tick::{FrameHandler, TickRunner};
