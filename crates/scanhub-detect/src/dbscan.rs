// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Adaptive DBSCAN over world-frame points
//!
//! Density clustering under a normalized distance metric: each point gets a
//! local scale from its sensor's range-dependent noise model, and two points
//! are close when their Euclidean distance, normalized by the joint scale,
//! is within `eps_norm`. Neighbor search runs over a hash grid with a
//! bounded per-query candidate budget so a dense frame cannot stall the
//! tick.
//!
//! `minPts` semantics are inclusive: a point's neighborhood always contains
//! the point itself. All arithmetic is single precision; boundary ties are
//! admitted (`<=`).

use scanhub_types::{Cluster, DbscanConfig, SensorNoiseModel};
use std::collections::{HashMap, VecDeque};

/// Grid cell size used when a frame is too small for a meaningful scale
/// median.
const SMALL_FRAME_CELL_M: f32 = 0.03;
const SMALL_FRAME_LIMIT: usize = 2000;

/// Adaptive clusterer. Configuration and per-slot noise models are plain
/// state; hot updates go through the owning handle between frames.
pub struct Dbscan {
    config: DbscanConfig,
    sensor_models: HashMap<u8, SensorNoiseModel>,
}

impl Dbscan {
    pub fn new(config: DbscanConfig) -> Self {
        Self {
            config,
            sensor_models: HashMap::new(),
        }
    }

    pub fn config(&self) -> &DbscanConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: DbscanConfig) {
        self.config = config;
    }

    pub fn set_sensor_model(&mut self, sid: u8, model: SensorNoiseModel) {
        self.sensor_models.insert(sid, model);
    }

    pub fn clear_sensor_models(&mut self) {
        self.sensor_models.clear();
    }

    fn sensor_model(&self, sid: u8) -> SensorNoiseModel {
        self.sensor_models.get(&sid).copied().unwrap_or_default()
    }

    /// Cluster one frame. Returns clusters numbered in the order they were
    /// opened by the linear scan; noise points are dropped.
    pub fn run(&self, xy: &[f32], sid: &[u8]) -> Vec<Cluster> {
        let n = xy.len() / 2;
        if n == 0 || sid.len() != n {
            return Vec::new();
        }

        let eps_norm = self.config.eps_norm;
        let eps_norm_sq = eps_norm * eps_norm;
        let min_pts = self.config.min_pts as usize;
        let m_dyn = (self.config.m_max as usize).max((0.1 * n as f32).floor() as usize);

        // Per-point scale s_i and search radius eps_i.
        let mut scales = vec![0.0f32; n];
        let mut search_radii = vec![0.0f32; n];
        let k_effective = (1.0 / eps_norm) * self.config.k_scale;
        for i in 0..n {
            let (x, y) = (xy[2 * i], xy[2 * i + 1]);
            let r = x.hypot(y);
            let model = self.sensor_model(sid[i]);
            let sigma_r = model.sigma0 + model.alpha * r;
            let angular = k_effective * r * model.delta_theta_rad;
            scales[i] = (sigma_r * sigma_r + angular * angular).sqrt();
            search_radii[i] = eps_norm * scales[i];
        }

        // Grid cell size with small-frame fallback.
        let h = if n < SMALL_FRAME_LIMIT {
            SMALL_FRAME_CELL_M
        } else {
            let mut sorted = scales.clone();
            let mid = n / 2;
            sorted.select_nth_unstable_by(mid, f32::total_cmp);
            (0.8 * sorted[mid]).clamp(self.config.h_min, self.config.h_max)
        };

        let mut grid: HashMap<(i32, i32), Vec<usize>> =
            HashMap::with_capacity((n / 3).max(16));
        for i in 0..n {
            let ix = (xy[2 * i] / h).floor() as i32;
            let iy = (xy[2 * i + 1] / h).floor() as i32;
            grid.entry((ix, iy)).or_default().push(i);
        }

        // -1 = unassigned, -2 = noise, >= 0 = cluster id.
        let mut cluster_id = vec![-1i32; n];
        let mut visited = vec![false; n];
        let mut current_cluster = 0i32;

        let mut neighbors: Vec<usize> = Vec::with_capacity(m_dyn.min(n));

        let find_neighbors = |point: usize, neighbors: &mut Vec<usize>| {
            neighbors.clear();
            // Inclusive semantics: the query point is always a neighbor.
            neighbors.push(point);

            let (px, py) = (xy[2 * point], xy[2 * point + 1]);
            let eps_i = search_radii[point];
            let scale_i_sq = scales[point] * scales[point];
            let r_cells =
                (self.config.r_max as i32).min((eps_i / h).ceil() as i32);
            let ix = (px / h).floor() as i32;
            let iy = (py / h).floor() as i32;

            let mut candidates = 0usize;
            'cells: for dx in -r_cells..=r_cells {
                for dy in -r_cells..=r_cells {
                    let Some(cell) = grid.get(&(ix + dx, iy + dy)) else {
                        continue;
                    };
                    for &j in cell {
                        if j == point {
                            continue;
                        }
                        candidates += 1;
                        if candidates >= m_dyn {
                            break 'cells;
                        }
                        let (qx, qy) = (xy[2 * j], xy[2 * j + 1]);
                        let ddx = px - qx;
                        let ddy = py - qy;
                        let dist_sq = ddx * ddx + ddy * ddy;
                        let combined = scale_i_sq + scales[j] * scales[j];
                        if dist_sq / combined <= eps_norm_sq {
                            neighbors.push(j);
                        }
                    }
                }
            }
            neighbors.len()
        };

        for i in 0..n {
            if visited[i] {
                continue;
            }
            visited[i] = true;

            if find_neighbors(i, &mut neighbors) < min_pts {
                cluster_id[i] = -2;
                continue;
            }

            cluster_id[i] = current_cluster;
            let mut seeds: VecDeque<usize> =
                neighbors.iter().copied().filter(|&p| p != i).collect();

            while let Some(q) = seeds.pop_front() {
                if !visited[q] {
                    visited[q] = true;
                    if find_neighbors(q, &mut neighbors) >= min_pts {
                        for &qn in neighbors.iter() {
                            if qn != q {
                                seeds.push_back(qn);
                            }
                        }
                    }
                }
                if cluster_id[q] < 0 {
                    cluster_id[q] = current_cluster;
                }
            }

            current_cluster += 1;
        }

        collect_clusters(xy, sid, &cluster_id, current_cluster)
    }
}

fn collect_clusters(
    xy: &[f32],
    sid: &[u8],
    cluster_id: &[i32],
    count: i32,
) -> Vec<Cluster> {
    if count == 0 {
        return Vec::new();
    }
    let mut clusters: Vec<Cluster> = (0..count)
        .map(|c| Cluster {
            id: c as u32,
            sensor_mask: 0,
            cx: 0.0,
            cy: 0.0,
            minx: f32::MAX,
            miny: f32::MAX,
            maxx: f32::MIN,
            maxy: f32::MIN,
            point_indices: Vec::new(),
        })
        .collect();

    for (i, &cid) in cluster_id.iter().enumerate() {
        if cid < 0 {
            continue;
        }
        let cluster = &mut clusters[cid as usize];
        let (x, y) = (xy[2 * i], xy[2 * i + 1]);
        cluster.minx = cluster.minx.min(x);
        cluster.miny = cluster.miny.min(y);
        cluster.maxx = cluster.maxx.max(x);
        cluster.maxy = cluster.maxy.max(y);
        cluster.cx += x;
        cluster.cy += y;
        cluster.point_indices.push(i as u32);
        if sid[i] < 8 {
            cluster.sensor_mask |= 1 << sid[i];
        }
    }

    for cluster in &mut clusters {
        let n = cluster.point_indices.len();
        if n > 0 {
            cluster.cx /= n as f32;
            cluster.cy /= n as f32;
        }
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clusterer(eps_norm: f32, min_pts: u32) -> Dbscan {
        Dbscan::new(DbscanConfig {
            eps_norm,
            min_pts,
            ..Default::default()
        })
    }

    #[test]
    fn lone_point_is_noise() {
        let clusters = clusterer(2.5, 2).run(&[0.0, 0.0], &[0]);
        assert!(clusters.is_empty());
    }

    #[test]
    fn tight_pair_forms_cluster() {
        let clusters = clusterer(2.5, 2).run(&[0.0, 0.0, 0.01, 0.0], &[0, 0]);
        assert_eq!(clusters.len(), 1);
        let c = &clusters[0];
        assert_eq!(c.count(), 2);
        assert!((c.cx - 0.005).abs() < 1e-6);
        assert_eq!(c.cy, 0.0);
        assert_eq!((c.minx, c.miny, c.maxx, c.maxy), (0.0, 0.0, 0.01, 0.0));
        assert_eq!(c.sensor_mask, 0b1);
    }

    #[test]
    fn disjoint_groups_open_clusters_in_scan_order() {
        let xy = [0.0, 0.0, 0.01, 0.0, 1.0, 1.0, 1.01, 1.0];
        let sid = [0u8, 0, 1, 1];
        let clusters = clusterer(2.5, 2).run(&xy, &sid);
        assert_eq!(clusters.len(), 2);

        // The cluster containing the origin was opened first.
        assert_eq!(clusters[0].id, 0);
        assert!(clusters[0].point_indices.contains(&0));
        assert_eq!(clusters[0].sensor_mask, 0b01);
        assert_eq!(clusters[1].sensor_mask, 0b10);
    }

    #[test]
    fn partition_is_deterministic() {
        let mut xy = Vec::new();
        let mut sid = Vec::new();
        for i in 0..40 {
            let base = if i < 20 { 0.0 } else { 3.0 };
            xy.push(base + 0.005 * (i % 20) as f32);
            xy.push(base);
            sid.push((i / 20) as u8);
        }
        let clusterer = clusterer(2.5, 3);
        let a = clusterer.run(&xy, &sid);
        let b = clusterer.run(&xy, &sid);
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn min_pts_is_inclusive_of_self() {
        // minPts = 2: a pair within range is enough.
        let clusters = clusterer(2.5, 2).run(&[0.0, 0.0, 0.02, 0.0], &[0, 0]);
        assert_eq!(clusters.len(), 1);

        // minPts = 3: the same pair is noise.
        let clusters = clusterer(2.5, 3).run(&[0.0, 0.0, 0.02, 0.0], &[0, 0]);
        assert!(clusters.is_empty());
    }

    #[test]
    fn noisier_sensor_model_widens_acceptance() {
        // 0.15 m apart at ~3 m range: rejected under the default model.
        let xy = [3.0, 0.0, 3.0, 0.15];
        let sid = [0u8, 0];
        assert!(clusterer(2.5, 2).run(&xy, &sid).is_empty());

        let mut wide = clusterer(2.5, 2);
        wide.set_sensor_model(
            0,
            SensorNoiseModel {
                delta_theta_rad: 0.004_363_3,
                sigma0: 0.2,
                alpha: 0.02,
            },
        );
        assert_eq!(wide.run(&xy, &sid).len(), 1);
    }

    #[test]
    fn point_indices_cover_members_exactly_once() {
        let xy = [0.0, 0.0, 0.01, 0.0, 0.02, 0.0];
        let sid = [0u8, 0, 0];
        let clusters = clusterer(2.5, 2).run(&xy, &sid);
        assert_eq!(clusters.len(), 1);
        let mut indices = clusters[0].point_indices.clone();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
