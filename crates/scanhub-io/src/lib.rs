// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Scanhub sink fan-out
//!
//! Publishes cluster batches to downstream transports. Each sink enforces
//! its own rate limit and serializes in its own encoding; the publisher set
//! is an immutable vector swapped atomically on reconfiguration, so a
//! publication in flight targets exactly one generation of sinks. Send
//! failures are logged and never reach the aggregation tick.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod encode;
pub mod nng_sink;
pub mod osc_sink;
pub mod publisher;
pub mod rate;

pub use encode::{ClusterBatch, ClusterItem};
pub use nng_sink::NngSinkPublisher;
pub use osc_sink::OscSinkPublisher;
pub use publisher::{PublisherManager, SinkPublisher};
pub use rate::RateGate;
