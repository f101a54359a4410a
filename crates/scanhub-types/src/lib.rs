// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Scanhub shared types
//!
//! Data model shared by every scanhub crate: raw scans and aggregated
//! frames, cluster detections, the sensor noise model, world-mask geometry,
//! and the full configuration tree (`AppConfig`).
//!
//! Configuration structs follow the `#[serde(default)]` + hand-written
//! `Default` pattern so partial YAML/JSON documents deserialize against the
//! built-in defaults.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cluster;
pub mod config;
pub mod mask;
pub mod scan;

pub use cluster::{Cluster, SensorNoiseModel};
pub use config::{
    AcquisitionMode, AngleMaskDeg, AppConfig, DbscanConfig, IntensityFilterConfig,
    IsolationRemovalConfig, NeighborhoodConfig, NngEncoding, OutlierRemovalConfig,
    PoseDeg, PostIsolationConfig, PostfilterConfig, PrefilterConfig, RangeMaskM,
    SecurityConfig, SensorConfig, SensorMaskLocal, SinkConfig, SinkKind,
    SpikeRemovalConfig, UiConfig, parse_endpoint,
};
pub use mask::{Polygon, WorldMask};
pub use scan::{RawScan, ScanFrame};
