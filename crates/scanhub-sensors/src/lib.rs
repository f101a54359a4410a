// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Scanhub sensor drivers
//!
//! The abstract push-source contract every range-finder driver implements,
//! a registry mapping configuration type tags to driver constructors, and a
//! built-in synthetic driver for development and tests.
//!
//! Vendor wire protocols live behind this contract in their own crates and
//! register themselves with the [`DriverRegistry`]; the core never sees
//! protocol details, only scans pushed through the subscribed callback.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod registry;
pub mod sim;
pub mod traits;

pub use registry::DriverRegistry;
pub use sim::SimSensor;
pub use traits::{RangeSensor, ScanCallback};
