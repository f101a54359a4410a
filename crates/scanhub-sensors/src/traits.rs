// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The abstract push-source contract.

use scanhub_types::{AcquisitionMode, RawScan, SensorConfig};
use std::sync::Arc;

/// Callback invoked by a driver once per completed scan.
///
/// Called from a driver-owned thread. Callbacks may arrive concurrently
/// across different drivers; each driver serializes its own.
pub type ScanCallback = Arc<dyn Fn(RawScan) + Send + Sync>;

/// Capability set of a range-finder driver.
///
/// After a successful `start` the driver pushes scans through the
/// subscribed callback until `stop` returns; `stop` must be bounded (the
/// driver joins its own thread). `apply_mode` / `apply_skip_step` return
/// `true` when the change took effect without a restart; `false` tells the
/// slot manager to stop-then-start the driver. A failed `start` leaves the
/// slot usable but silent; reconnect policy belongs to the driver, not the
/// manager.
pub trait RangeSensor: Send {
    fn start(&mut self, config: &SensorConfig) -> bool;
    fn stop(&mut self);
    fn subscribe(&mut self, callback: ScanCallback);
    fn apply_mode(&mut self, mode: AcquisitionMode) -> bool;
    fn apply_skip_step(&mut self, skip_step: u32) -> bool;
}
