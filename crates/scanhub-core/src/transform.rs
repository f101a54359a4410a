// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Polar-to-world projection of raw scans.

use scanhub_types::{PoseDeg, RawScan, SensorMaskLocal};

/// Rotate by `theta_rad`, then translate.
#[inline]
pub fn apply_pose(x: f32, y: f32, tx: f32, ty: f32, theta_rad: f32) -> (f32, f32) {
    let (sin, cos) = theta_rad.sin_cos();
    (x * cos - y * sin + tx, x * sin + y * cos + ty)
}

/// Project one scan into world coordinates, appending to the frame arrays.
///
/// Samples with zero range or outside the local angle/range mask are
/// skipped. Mask comparison happens in degrees; the trig transform uses
/// radians.
pub fn project_scan(
    scan: &RawScan,
    pose: &PoseDeg,
    mask: &SensorMaskLocal,
    slot_index: u8,
    xy: &mut Vec<f32>,
    sid: &mut Vec<u8>,
) {
    let theta_rad = pose.theta_deg.to_radians();
    for (i, &range_mm) in scan.ranges_mm.iter().enumerate() {
        if range_mm == 0 {
            continue;
        }
        let range_m = range_mm as f32 * 0.001;
        let angle_deg = scan.angle_deg(i);
        if !mask.passes(angle_deg, range_m) {
            continue;
        }
        let angle_rad = angle_deg.to_radians();
        let x = range_m * angle_rad.cos();
        let y = range_m * angle_rad.sin();
        let (wx, wy) = apply_pose(x, y, pose.tx, pose.ty, theta_rad);
        xy.push(wx);
        xy.push(wy);
        sid.push(slot_index);
    }
}
