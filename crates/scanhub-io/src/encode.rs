// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Cluster batch wire shapes
//!
//! The carrier-agnostic batch `{v:1, seq, t_ns, raw:false, items:[...]}`
//! serialized as JSON or MessagePack. Both encodings round-trip
//! numerically.

use scanhub_types::Cluster;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterItem {
    pub id: u32,
    pub cx: f32,
    pub cy: f32,
    pub minx: f32,
    pub miny: f32,
    pub maxx: f32,
    pub maxy: f32,
    pub n: u32,
}

impl From<&Cluster> for ClusterItem {
    fn from(cluster: &Cluster) -> Self {
        Self {
            id: cluster.id,
            cx: cluster.cx,
            cy: cluster.cy,
            minx: cluster.minx,
            miny: cluster.miny,
            maxx: cluster.maxx,
            maxy: cluster.maxy,
            n: cluster.count() as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterBatch {
    pub v: u32,
    pub seq: u32,
    pub t_ns: u64,
    pub raw: bool,
    pub items: Vec<ClusterItem>,
}

impl ClusterBatch {
    pub fn new(t_ns: u64, seq: u32, clusters: &[Cluster]) -> Self {
        Self {
            v: 1,
            seq,
            t_ns,
            raw: false,
            items: clusters.iter().map(ClusterItem::from).collect(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_batch() -> ClusterBatch {
        let clusters = vec![Cluster {
            id: 0,
            sensor_mask: 0b11,
            cx: 0.123_456_7,
            cy: -4.5,
            minx: -1.0,
            miny: -2.0,
            maxx: 3.0,
            maxy: 4.0,
            point_indices: vec![1, 2, 3],
        }];
        ClusterBatch::new(1_700_000_000_000_000_123, 42, &clusters)
    }

    #[test]
    fn json_round_trip_is_exact() {
        let batch = sample_batch();
        let bytes = batch.to_json().unwrap();
        let back: ClusterBatch = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, batch);
        assert_eq!(back.items[0].n, 3);
    }

    #[test]
    fn msgpack_round_trip_is_exact() {
        let batch = sample_batch();
        let bytes = batch.to_msgpack().unwrap();
        let back: ClusterBatch = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back, batch);
    }

    #[test]
    fn batch_header_fields() {
        let batch = sample_batch();
        assert_eq!(batch.v, 1);
        assert!(!batch.raw);
        assert_eq!(batch.seq, 42);
        let value: serde_json::Value =
            serde_json::from_slice(&batch.to_json().unwrap()).unwrap();
        assert_eq!(value["items"][0]["id"], 0);
        assert_eq!(value["t_ns"], 1_700_000_000_000_000_123u64);
    }
}
