// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-sink publication rate limiting
//!
//! Hz → minimum inter-publication interval. A call arriving too soon is
//! dropped, never queued; latency beats completeness on the live stream.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Interval gate shared-reference safe for use from publish paths.
pub struct RateGate {
    interval: Option<Duration>,
    last: Mutex<Option<Instant>>,
}

impl RateGate {
    /// `rate_hz == 0` disables limiting.
    pub fn new(rate_hz: u32) -> Self {
        let interval = if rate_hz == 0 {
            None
        } else {
            Some(Duration::from_secs_f64(1.0 / rate_hz as f64))
        };
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// True when a publication may go out now; records the grant.
    pub fn should_publish(&self) -> bool {
        let Some(interval) = self.interval else {
            return true;
        };
        let now = Instant::now();
        let mut last = self.last.lock();
        match *last {
            None => {
                *last = Some(now);
                true
            }
            Some(prev) if now.duration_since(prev) >= interval => {
                *last = Some(now);
                true
            }
            Some(_) => false,
        }
    }
}
