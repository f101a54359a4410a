// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Cluster detections and the per-sensor noise model.

use serde::{Deserialize, Serialize};

/// One detected object in a frame.
///
/// Ids are frame-local, 0-based, numbered in the order clusters are opened
/// during the clustering scan. `point_indices` index into the frame that
/// produced the cluster; every index is `< sid.len()`. Bit `i` of
/// `sensor_mask` is set iff at least one member point came from slot index
/// `i` (only slots 0..7 are representable).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: u32,
    pub sensor_mask: u8,
    pub cx: f32,
    pub cy: f32,
    pub minx: f32,
    pub miny: f32,
    pub maxx: f32,
    pub maxy: f32,
    pub point_indices: Vec<u32>,
}

impl Cluster {
    pub fn count(&self) -> usize {
        self.point_indices.len()
    }

    /// Recompute centroid, bounding box and sensor mask from the member
    /// points currently in `point_indices`.
    pub fn rebuild_from_points(&mut self, xy: &[f32], sid: &[u8]) {
        let mut sum_x = 0.0f32;
        let mut sum_y = 0.0f32;
        let mut minx = f32::MAX;
        let mut miny = f32::MAX;
        let mut maxx = f32::MIN;
        let mut maxy = f32::MIN;
        let mut mask = 0u8;

        for &idx in &self.point_indices {
            let i = idx as usize;
            let (px, py) = (xy[2 * i], xy[2 * i + 1]);
            sum_x += px;
            sum_y += py;
            minx = minx.min(px);
            miny = miny.min(py);
            maxx = maxx.max(px);
            maxy = maxy.max(py);
            if sid[i] < 8 {
                mask |= 1 << sid[i];
            }
        }

        let n = self.point_indices.len().max(1) as f32;
        self.cx = sum_x / n;
        self.cy = sum_y / n;
        self.minx = minx;
        self.miny = miny;
        self.maxx = maxx;
        self.maxy = maxy;
        self.sensor_mask = mask;
    }
}

/// Range-dependent noise model of one sensor slot.
///
/// Used by the adaptive clustering to derive a per-point spatial scale:
/// `sigma_r(r) = sigma0 + alpha * r`, with `delta_theta_rad` the angular
/// resolution contributing the tangential term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorNoiseModel {
    pub delta_theta_rad: f32,
    pub sigma0: f32,
    pub alpha: f32,
}

impl Default for SensorNoiseModel {
    fn default() -> Self {
        // 0.25 deg resolution, sigma_r(r) = 0.02 + 0.004 * r
        Self {
            delta_theta_rad: 0.004_363_3,
            sigma0: 0.02,
            alpha: 0.004,
        }
    }
}
