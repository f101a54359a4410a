// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Frame processing pipeline
//!
//! Runs one frame through prefilter → world mask → clustering → postfilter,
//! then hands the results to the live taps and the sink publishers. All of
//! it executes synchronously on the aggregation thread; the taps and
//! publishers must not block (they dispatch to their own queues/sockets).

use crate::filters::FilterManager;
use parking_lot::RwLock;
use scanhub_detect::Dbscan;
use scanhub_io::PublisherManager;
use scanhub_types::{Cluster, DbscanConfig, ScanFrame, SensorNoiseModel, WorldMask};
use std::sync::Arc;
use tracing::{debug, trace};

/// Clustering state behind a lock taken once per frame.
pub struct DbscanHandle {
    inner: RwLock<Dbscan>,
}

impl DbscanHandle {
    pub fn new(config: DbscanConfig) -> Self {
        Self {
            inner: RwLock::new(Dbscan::new(config)),
        }
    }

    pub fn config(&self) -> DbscanConfig {
        self.inner.read().config().clone()
    }

    pub fn set_config(&self, config: DbscanConfig) {
        self.inner.write().set_config(config);
    }

    /// Replace the per-slot noise models with `models` in slot-index order.
    pub fn sync_noise_models(&self, models: &[SensorNoiseModel]) {
        let mut dbscan = self.inner.write();
        dbscan.clear_sensor_models();
        for (index, model) in models.iter().enumerate() {
            dbscan.set_sensor_model(index as u8, *model);
        }
    }

    pub fn run(&self, xy: &[f32], sid: &[u8]) -> Vec<Cluster> {
        self.inner.read().run(xy, sid)
    }
}

/// Non-blocking observer of frame data (live UI streams).
pub type FrameTap = Arc<dyn Fn(&ScanFrame) + Send + Sync>;
/// Non-blocking observer of the final cluster batch.
pub type ClusterTap = Arc<dyn Fn(u64, u32, &[Cluster]) + Send + Sync>;

pub struct DetectionPipeline {
    filters: Arc<FilterManager>,
    dbscan: Arc<DbscanHandle>,
    world_mask: RwLock<WorldMask>,
    publishers: Arc<PublisherManager>,
    raw_tap: RwLock<Option<FrameTap>>,
    filtered_tap: RwLock<Option<FrameTap>>,
    cluster_tap: RwLock<Option<ClusterTap>>,
}

impl DetectionPipeline {
    pub fn new(
        filters: Arc<FilterManager>,
        dbscan: Arc<DbscanHandle>,
        world_mask: WorldMask,
        publishers: Arc<PublisherManager>,
    ) -> Self {
        Self {
            filters,
            dbscan,
            world_mask: RwLock::new(world_mask),
            publishers,
            raw_tap: RwLock::new(None),
            filtered_tap: RwLock::new(None),
            cluster_tap: RwLock::new(None),
        }
    }

    pub fn set_raw_tap(&self, tap: FrameTap) {
        *self.raw_tap.write() = Some(tap);
    }

    pub fn set_filtered_tap(&self, tap: FrameTap) {
        *self.filtered_tap.write() = Some(tap);
    }

    pub fn set_cluster_tap(&self, tap: ClusterTap) {
        *self.cluster_tap.write() = Some(tap);
    }

    pub fn world_mask(&self) -> WorldMask {
        self.world_mask.read().clone()
    }

    pub fn set_world_mask(&self, mask: WorldMask) {
        *self.world_mask.write() = mask;
    }

    pub fn dbscan(&self) -> &Arc<DbscanHandle> {
        &self.dbscan
    }

    pub fn filters(&self) -> &Arc<FilterManager> {
        &self.filters
    }

    pub fn publishers(&self) -> &Arc<PublisherManager> {
        &self.publishers
    }

    /// Process one aggregated frame end to end. Returns the final cluster
    /// batch (also handed to the cluster tap and the publishers).
    pub fn process_frame(&self, frame: &ScanFrame) -> Vec<Cluster> {
        if let Some(tap) = self.raw_tap.read().clone() {
            tap(frame);
        }

        let mut xy;
        let mut sid;
        if self.filters.is_prefilter_enabled() {
            let output = self.filters.apply_prefilter(&frame.xy, &frame.sid, &[]);
            trace!(
                seq = frame.seq,
                input = output.stats.input_points,
                output = output.stats.output_points,
                elapsed_us = output.stats.processing_time_us,
                "prefilter"
            );
            xy = output.xy;
            sid = output.sid;
        } else {
            xy = frame.xy.clone();
            sid = frame.sid.clone();
        }

        self.world_mask.read().apply(&mut xy, &mut sid);

        let filtered = ScanFrame {
            seq: frame.seq,
            t_ns: frame.t_ns,
            xy,
            sid,
        };
        if let Some(tap) = self.filtered_tap.read().clone() {
            tap(&filtered);
        }

        let clusters = self.dbscan.run(&filtered.xy, &filtered.sid);

        let final_clusters = if self.filters.is_postfilter_enabled() {
            let output = self
                .filters
                .apply_postfilter(clusters, &filtered.xy, &filtered.sid);
            trace!(
                seq = frame.seq,
                input = output.stats.input_clusters,
                output = output.stats.output_clusters,
                "postfilter"
            );
            output.clusters
        } else {
            clusters
        };

        debug!(
            seq = frame.seq,
            points = filtered.sid.len(),
            clusters = final_clusters.len(),
            "frame processed"
        );

        if let Some(tap) = self.cluster_tap.read().clone() {
            tap(frame.t_ns, frame.seq, &final_clusters);
        }
        self.publishers
            .publish_clusters(frame.t_ns, frame.seq, &final_clusters);

        final_clusters
    }
}
