// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Raw scans and aggregated frames.

use serde::{Deserialize, Serialize};

/// One complete sweep as pushed by a range-finder driver.
///
/// The i-th sample's sensor-frame angle in degrees is
/// `start_angle_deg + i * angle_step_deg`. A range of 0 mm marks a missing
/// sample. `intensities` is either empty (range-only acquisition) or exactly
/// as long as `ranges_mm`.
#[derive(Debug, Clone, Default)]
pub struct RawScan {
    /// Receive timestamp, monotonic clock, nanoseconds.
    pub t_mono_ns: u64,
    pub ranges_mm: Vec<u16>,
    pub intensities: Vec<u16>,
    pub start_angle_deg: f32,
    pub angle_step_deg: f32,
}

impl RawScan {
    pub fn is_empty(&self) -> bool {
        self.ranges_mm.is_empty()
    }

    /// Sensor-frame angle of sample `i`, degrees.
    pub fn angle_deg(&self, i: usize) -> f32 {
        self.start_angle_deg + i as f32 * self.angle_step_deg
    }
}

/// One aggregation tick's worth of world-frame points.
///
/// `xy` is interleaved `[x0, y0, x1, y1, ...]`; `sid[i]` is the numeric slot
/// index of the sensor that produced point `i`. The shape invariant
/// `xy.len() == 2 * sid.len()` holds on every frame and after every pipeline
/// stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanFrame {
    pub seq: u32,
    /// System-clock timestamp, nanoseconds since the Unix epoch.
    pub t_ns: u64,
    pub xy: Vec<f32>,
    pub sid: Vec<u8>,
}

impl ScanFrame {
    pub fn len(&self) -> usize {
        self.sid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sid.is_empty()
    }

    pub fn point(&self, i: usize) -> (f32, f32) {
        (self.xy[2 * i], self.xy[2 * i + 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_angles_follow_start_and_step() {
        let scan = RawScan {
            start_angle_deg: -135.0,
            angle_step_deg: 0.25,
            ranges_mm: vec![1000; 4],
            ..Default::default()
        };
        assert_eq!(scan.angle_deg(0), -135.0);
        assert_eq!(scan.angle_deg(2), -134.5);
    }

    #[test]
    fn frame_shape() {
        let frame = ScanFrame {
            seq: 1,
            t_ns: 0,
            xy: vec![0.0, 1.0, 2.0, 3.0],
            sid: vec![0, 1],
        };
        assert_eq!(frame.xy.len(), 2 * frame.sid.len());
        assert_eq!(frame.point(1), (2.0, 3.0));
    }
}
