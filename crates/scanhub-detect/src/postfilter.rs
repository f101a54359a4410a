// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-cluster refinement
//!
//! One strategy today: intra-cluster isolation removal. Members with too few
//! other members nearby are dropped; clusters that fall below the minimum
//! size are dropped whole; surviving clusters get their geometry rebuilt.

use scanhub_types::{Cluster, PostfilterConfig};
use std::collections::HashSet;
use std::time::Instant;

/// Per-call statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostfilterStats {
    pub input_clusters: usize,
    pub output_clusters: usize,
    pub removed_clusters: usize,
    pub points_removed_total: usize,
    pub processing_time_us: f64,
}

/// Refined clusters plus statistics.
#[derive(Debug, Clone, Default)]
pub struct PostfilterOutput {
    pub clusters: Vec<Cluster>,
    pub stats: PostfilterStats,
}

pub struct Postfilter {
    config: PostfilterConfig,
}

impl Postfilter {
    pub fn new(config: PostfilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PostfilterConfig {
        &self.config
    }

    /// Refine `clusters` against the frame arrays they index into.
    pub fn apply(&self, clusters: Vec<Cluster>, xy: &[f32], sid: &[u8]) -> PostfilterOutput {
        let start = Instant::now();
        let mut stats = PostfilterStats {
            input_clusters: clusters.len(),
            ..Default::default()
        };

        if !self.config.enabled || clusters.is_empty() {
            stats.output_clusters = clusters.len();
            stats.processing_time_us = start.elapsed().as_secs_f64() * 1e6;
            return PostfilterOutput { clusters, stats };
        }

        let mut kept = Vec::with_capacity(clusters.len());
        for mut cluster in clusters {
            if !self.config.isolation_removal.enabled {
                kept.push(cluster);
                continue;
            }
            match self.refine_cluster(&mut cluster, xy, sid, &mut stats) {
                true => kept.push(cluster),
                false => stats.removed_clusters += 1,
            }
        }

        stats.output_clusters = kept.len();
        stats.processing_time_us = start.elapsed().as_secs_f64() * 1e6;
        PostfilterOutput {
            clusters: kept,
            stats,
        }
    }

    /// Returns false when the whole cluster should be dropped.
    fn refine_cluster(
        &self,
        cluster: &mut Cluster,
        xy: &[f32],
        sid: &[u8],
        stats: &mut PostfilterStats,
    ) -> bool {
        let cfg = &self.config.isolation_removal;
        let radius_sq = cfg.isolation_radius * cfg.isolation_radius;
        let required = cfg.required_neighbors as usize;

        let mut isolated: HashSet<u32> = HashSet::new();
        for (i, &point_idx) in cluster.point_indices.iter().enumerate() {
            let p = point_idx as usize;
            let (px, py) = (xy[2 * p], xy[2 * p + 1]);
            let mut neighbor_count = 0usize;
            for (j, &other_idx) in cluster.point_indices.iter().enumerate() {
                if i == j {
                    continue;
                }
                let o = other_idx as usize;
                let dx = xy[2 * o] - px;
                let dy = xy[2 * o + 1] - py;
                if dx * dx + dy * dy < radius_sq {
                    neighbor_count += 1;
                    if neighbor_count >= required {
                        break;
                    }
                }
            }
            if neighbor_count < required {
                isolated.insert(point_idx);
            }
        }

        if isolated.is_empty() {
            return true;
        }
        let survivors = cluster.point_indices.len() - isolated.len();
        if survivors < cfg.min_points_size as usize {
            stats.points_removed_total += cluster.point_indices.len();
            return false;
        }

        stats.points_removed_total += isolated.len();
        cluster.point_indices.retain(|idx| !isolated.contains(idx));
        cluster.rebuild_from_points(xy, sid);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanhub_types::PostIsolationConfig;

    fn make_cluster(indices: Vec<u32>, xy: &[f32], sid: &[u8]) -> Cluster {
        let mut cluster = Cluster {
            id: 0,
            sensor_mask: 0,
            cx: 0.0,
            cy: 0.0,
            minx: 0.0,
            miny: 0.0,
            maxx: 0.0,
            maxy: 0.0,
            point_indices: indices,
        };
        cluster.rebuild_from_points(xy, sid);
        cluster
    }

    fn config(min_points: u32, radius: f32, required: u32) -> PostfilterConfig {
        PostfilterConfig {
            enabled: true,
            isolation_removal: PostIsolationConfig {
                enabled: true,
                min_points_size: min_points,
                isolation_radius: radius,
                required_neighbors: required,
            },
        }
    }

    #[test]
    fn isolated_member_is_removed_and_geometry_rebuilt() {
        // Three tight points plus one straggler 1 m away.
        let xy = vec![0.0, 0.0, 0.05, 0.0, 0.0, 0.05, 1.0, 1.0];
        let sid = vec![0u8, 0, 0, 1];
        let cluster = make_cluster(vec![0, 1, 2, 3], &xy, &sid);

        let out = Postfilter::new(config(3, 0.2, 1)).apply(vec![cluster], &xy, &sid);
        assert_eq!(out.clusters.len(), 1);
        let c = &out.clusters[0];
        assert_eq!(c.count(), 3);
        assert_eq!(c.sensor_mask, 0b1);
        assert_eq!(c.maxx, 0.05);
        assert_eq!(out.stats.points_removed_total, 1);
    }

    #[test]
    fn cluster_below_min_size_is_dropped_whole() {
        let xy = vec![0.0, 0.0, 0.05, 0.0, 1.0, 1.0, 2.0, 2.0];
        let sid = vec![0u8; 4];
        let cluster = make_cluster(vec![0, 1, 2, 3], &xy, &sid);

        // Two stragglers would be removed leaving 2 < 3 members.
        let out = Postfilter::new(config(3, 0.2, 1)).apply(vec![cluster], &xy, &sid);
        assert!(out.clusters.is_empty());
        assert_eq!(out.stats.removed_clusters, 1);
        assert_eq!(out.stats.points_removed_total, 4);
    }

    #[test]
    fn compact_cluster_is_untouched() {
        let xy = vec![0.0, 0.0, 0.05, 0.0, 0.0, 0.05];
        let sid = vec![0u8; 3];
        let cluster = make_cluster(vec![0, 1, 2], &xy, &sid);
        let before = cluster.clone();

        let out = Postfilter::new(config(3, 0.2, 1)).apply(vec![cluster], &xy, &sid);
        assert_eq!(out.clusters[0], before);
        assert_eq!(out.stats.points_removed_total, 0);
    }

    #[test]
    fn disabled_postfilter_passes_through() {
        let xy = vec![0.0, 0.0, 5.0, 5.0];
        let sid = vec![0u8; 2];
        let cluster = make_cluster(vec![0, 1], &xy, &sid);
        let mut cfg = config(3, 0.2, 1);
        cfg.enabled = false;

        let out = Postfilter::new(cfg).apply(vec![cluster.clone()], &xy, &sid);
        assert_eq!(out.clusters, vec![cluster]);
    }
}
