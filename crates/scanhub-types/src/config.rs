// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections of the
//! YAML configuration file. Every struct is `#[serde(default)]` so partial
//! documents (and partial REST/WS patches) deserialize against defaults.

use crate::mask::WorldMask;
use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub sensors: Vec<SensorConfig>,
    pub dbscan: DbscanConfig,
    pub prefilter: PrefilterConfig,
    pub postfilter: PostfilterConfig,
    pub ui: UiConfig,
    pub security: SecurityConfig,
    pub world_mask: WorldMask,
    pub sinks: Vec<SinkConfig>,
}

/// HTTP/WebSocket listen configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UiConfig {
    pub listen: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Control-plane security settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Shared bearer token; empty disables write authorization.
    pub api_token: String,
}

/// 2D sensor pose in the world frame (theta in degrees)
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PoseDeg {
    pub tx: f32,
    pub ty: f32,
    #[serde(rename = "theta", alias = "theta_deg")]
    pub theta_deg: f32,
}

/// Angular window of the local sensor mask, degrees
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AngleMaskDeg {
    #[serde(rename = "min")]
    pub min_deg: f32,
    #[serde(rename = "max")]
    pub max_deg: f32,
}

impl Default for AngleMaskDeg {
    fn default() -> Self {
        Self {
            min_deg: -180.0,
            max_deg: 180.0,
        }
    }
}

/// Range window of the local sensor mask, meters
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RangeMaskM {
    #[serde(rename = "near")]
    pub near_m: f32,
    #[serde(rename = "far")]
    pub far_m: f32,
}

impl Default for RangeMaskM {
    fn default() -> Self {
        Self {
            near_m: 0.05,
            far_m: 15.0,
        }
    }
}

/// Per-sensor local mask (sensor frame, before pose application)
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorMaskLocal {
    pub angle: AngleMaskDeg,
    pub range: RangeMaskM,
}

impl SensorMaskLocal {
    /// Normalize bounds in place: inverted windows are swapped, angles are
    /// clamped to [-180, 180], ranges floored at 0.
    pub fn normalize(&mut self) {
        if self.angle.min_deg > self.angle.max_deg {
            std::mem::swap(&mut self.angle.min_deg, &mut self.angle.max_deg);
        }
        self.angle.min_deg = self.angle.min_deg.clamp(-180.0, 180.0);
        self.angle.max_deg = self.angle.max_deg.clamp(-180.0, 180.0);
        if self.range.near_m > self.range.far_m {
            std::mem::swap(&mut self.range.near_m, &mut self.range.far_m);
        }
        self.range.near_m = self.range.near_m.max(0.0);
        self.range.far_m = self.range.far_m.max(0.0);
    }

    pub fn passes(&self, angle_deg: f32, range_m: f32) -> bool {
        angle_deg >= self.angle.min_deg
            && angle_deg <= self.angle.max_deg
            && range_m >= self.range.near_m
            && range_m <= self.range.far_m
    }
}

/// Scan acquisition mode of a range-finder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum AcquisitionMode {
    /// Range-only acquisition
    #[serde(rename = "MD")]
    Distance,
    /// Range + intensity acquisition
    #[serde(rename = "ME")]
    DistanceIntensity,
}

impl Default for AcquisitionMode {
    fn default() -> Self {
        Self::DistanceIntensity
    }
}

impl AcquisitionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Distance => "MD",
            Self::DistanceIntensity => "ME",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MD" => Some(Self::Distance),
            "ME" => Some(Self::DistanceIntensity),
            _ => None,
        }
    }
}

impl std::fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn de_bool_loose<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    // Accepts true/false as well as the 0/1 integers used by older configs
    // and the PATCH surface.
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Bool(bool),
        Int(i64),
    }
    Ok(match Loose::deserialize(d)? {
        Loose::Bool(b) => b,
        Loose::Int(i) => i != 0,
    })
}

/// One sensor entry of the configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Stable string identifier; slot indices follow this across
    /// reconfiguration.
    pub id: String,
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub enabled: bool,
    pub mode: AcquisitionMode,
    /// Sample-interval hint in milliseconds, 0 = device default.
    pub interval: u32,
    /// Angular downsampling factor, >= 1.
    pub skip_step: u32,
    #[serde(deserialize_with = "de_bool_loose")]
    pub ignore_checksum_error: bool,
    pub pose: PoseDeg,
    pub mask: SensorMaskLocal,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            sensor_type: "hokuyo_urg_eth".to_string(),
            name: "sensor".to_string(),
            host: "192.168.1.10".to_string(),
            port: 10940,
            enabled: true,
            mode: AcquisitionMode::default(),
            interval: 0,
            skip_step: 1,
            ignore_checksum_error: true,
            pose: PoseDeg::default(),
            mask: SensorMaskLocal::default(),
        }
    }
}

impl SensorConfig {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True when switching from `other` to `self` requires a driver
    /// stop/start cycle.
    pub fn requires_restart_from(&self, other: &SensorConfig) -> bool {
        self.host != other.host
            || self.port != other.port
            || self.sensor_type != other.sensor_type
            || self.mode != other.mode
            || self.skip_step != other.skip_step
            || self.ignore_checksum_error != other.ignore_checksum_error
    }
}

/// Split `"host:port"`; a missing port falls back to the device default.
pub fn parse_endpoint(endpoint: &str) -> (String, u16) {
    match endpoint.rsplit_once(':') {
        Some((host, port)) => match port.parse::<u16>() {
            Ok(p) => (host.to_string(), p),
            Err(_) => (host.to_string(), 10940),
        },
        None => (endpoint.to_string(), 10940),
    }
}

// --- Prefilter -------------------------------------------------------------

/// Point-level filter chain configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PrefilterConfig {
    pub enabled: bool,
    pub neighborhood: NeighborhoodConfig,
    pub spike_removal: SpikeRemovalConfig,
    pub outlier_removal: OutlierRemovalConfig,
    pub intensity_filter: IntensityFilterConfig,
    pub isolation_removal: IsolationRemovalConfig,
}

impl Default for PrefilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            neighborhood: NeighborhoodConfig::default(),
            spike_removal: SpikeRemovalConfig::default(),
            outlier_removal: OutlierRemovalConfig::default(),
            intensity_filter: IntensityFilterConfig::default(),
            isolation_removal: IsolationRemovalConfig::default(),
        }
    }
}

/// Neighborhood-count strategy: search radius grows with distance from the
/// world origin (`r_base + r_scale * r`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NeighborhoodConfig {
    pub enabled: bool,
    pub k: u32,
    pub r_base: f32,
    pub r_scale: f32,
}

impl Default for NeighborhoodConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            k: 5,
            r_base: 0.05,
            r_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SpikeRemovalConfig {
    pub enabled: bool,
    pub dr_threshold: f32,
    /// Advisory; the derivative uses the nearest prior/next samples by
    /// angle regardless of this value.
    pub window_size: u32,
}

impl Default for SpikeRemovalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dr_threshold: 0.3,
            window_size: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutlierRemovalConfig {
    pub enabled: bool,
    pub median_window: u32,
    pub outlier_threshold: f32,
    /// Accepted for config compatibility; the median estimator is always
    /// used.
    pub use_robust_regression: bool,
}

impl Default for OutlierRemovalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            median_window: 5,
            outlier_threshold: 2.0,
            use_robust_regression: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IntensityFilterConfig {
    pub enabled: bool,
    pub min_intensity: f32,
    /// Carried through configuration, not enforced by the filter.
    pub min_reliability: f32,
}

impl Default for IntensityFilterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_intensity: 0.0,
            min_reliability: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IsolationRemovalConfig {
    pub enabled: bool,
    pub min_cluster_size: u32,
    pub isolation_radius: f32,
}

impl Default for IsolationRemovalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_cluster_size: 3,
            isolation_radius: 0.1,
        }
    }
}

// --- Postfilter ------------------------------------------------------------

/// Cluster-level refinement configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PostfilterConfig {
    pub enabled: bool,
    pub isolation_removal: PostIsolationConfig,
}

impl Default for PostfilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            isolation_removal: PostIsolationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PostIsolationConfig {
    pub enabled: bool,
    pub min_points_size: u32,
    pub isolation_radius: f32,
    pub required_neighbors: u32,
}

impl Default for PostIsolationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_points_size: 3,
            isolation_radius: 0.2,
            required_neighbors: 1,
        }
    }
}

// --- DBSCAN ----------------------------------------------------------------

/// Adaptive clustering configuration
///
/// `minPts` is inclusive of the query point itself. `eps_norm` is
/// dimensionless; distances are normalized by the joint scale of the two
/// points being compared. Legacy documents carrying `eps` are read as
/// `eps_norm`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DbscanConfig {
    #[serde(alias = "eps")]
    pub eps_norm: f32,
    #[serde(rename = "minPts")]
    pub min_pts: u32,
    pub k_scale: f32,
    pub h_min: f32,
    pub h_max: f32,
    #[serde(rename = "R_max")]
    pub r_max: u32,
    #[serde(rename = "M_max")]
    pub m_max: u32,
}

impl Default for DbscanConfig {
    fn default() -> Self {
        Self {
            eps_norm: 2.5,
            min_pts: 5,
            k_scale: 1.0,
            h_min: 0.01,
            h_max: 0.20,
            r_max: 5,
            m_max: 600,
        }
    }
}

// --- Sinks -----------------------------------------------------------------

/// Payload encoding of an NNG sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NngEncoding {
    Msgpack,
    Json,
}

impl Default for NngEncoding {
    fn default() -> Self {
        Self::Msgpack
    }
}

impl NngEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Msgpack => "msgpack",
            Self::Json => "json",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "msgpack" => Some(Self::Msgpack),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Transport-specific half of a sink descriptor
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkKind {
    Nng {
        url: String,
        #[serde(default)]
        encoding: NngEncoding,
    },
    Osc {
        url: String,
        #[serde(default)]
        in_bundle: bool,
        /// Soft byte limit per bundle; 0 = one bundle per frame.
        #[serde(default)]
        bundle_fragment_size: u32,
    },
}

impl SinkKind {
    pub fn url(&self) -> &str {
        match self {
            Self::Nng { url, .. } | Self::Osc { url, .. } => url,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Nng { .. } => "nng",
            Self::Osc { .. } => "osc",
        }
    }
}

/// One downstream destination for cluster batches
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub topic: String,
    /// Publications per second; 0 = unlimited.
    #[serde(default)]
    pub rate_limit: u32,
    #[serde(flatten)]
    pub kind: SinkKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_defaults_match_device_conventions() {
        let cfg = SensorConfig::default();
        assert_eq!(cfg.host, "192.168.1.10");
        assert_eq!(cfg.port, 10940);
        assert_eq!(cfg.mode, AcquisitionMode::DistanceIntensity);
        assert_eq!(cfg.mask.range.near_m, 0.05);
        assert_eq!(cfg.mask.angle.max_deg, 180.0);
    }

    #[test]
    fn mask_normalize_swaps_and_clamps() {
        let mut mask = SensorMaskLocal {
            angle: AngleMaskDeg {
                min_deg: 200.0,
                max_deg: -270.0,
            },
            range: RangeMaskM {
                near_m: 5.0,
                far_m: -1.0,
            },
        };
        mask.normalize();
        assert_eq!(mask.angle.min_deg, -180.0);
        assert_eq!(mask.angle.max_deg, 180.0);
        assert_eq!(mask.range.near_m, 0.0);
        assert_eq!(mask.range.far_m, 5.0);
    }

    #[test]
    fn legacy_eps_is_read_as_eps_norm() {
        let cfg: DbscanConfig = serde_json::from_str(r#"{"eps": 1.5}"#).unwrap();
        assert_eq!(cfg.eps_norm, 1.5);
        let cfg: DbscanConfig = serde_json::from_str(r#"{"eps_norm": 3.0}"#).unwrap();
        assert_eq!(cfg.eps_norm, 3.0);
    }

    #[test]
    fn sink_descriptor_is_tagged_by_type() {
        let nng: SinkConfig = serde_json::from_str(
            r#"{"type":"nng","url":"tcp://0.0.0.0:5555","encoding":"json","topic":"clusters","rate_limit":30}"#,
        )
        .unwrap();
        assert_eq!(nng.kind.type_tag(), "nng");
        assert_eq!(nng.rate_limit, 30);

        let osc: SinkConfig = serde_json::from_str(
            r#"{"type":"osc","url":"osc://127.0.0.1:7000/detect","in_bundle":true,"bundle_fragment_size":1200,"topic":""}"#,
        )
        .unwrap();
        match osc.kind {
            SinkKind::Osc {
                in_bundle,
                bundle_fragment_size,
                ..
            } => {
                assert!(in_bundle);
                assert_eq!(bundle_fragment_size, 1200);
            }
            _ => panic!("expected osc sink"),
        }
    }

    #[test]
    fn checksum_flag_accepts_integers() {
        let cfg: SensorConfig =
            serde_json::from_str(r#"{"id":"a","ignore_checksum_error":0}"#).unwrap();
        assert!(!cfg.ignore_checksum_error);
        let cfg: SensorConfig =
            serde_json::from_str(r#"{"id":"a","ignore_checksum_error":true}"#).unwrap();
        assert!(cfg.ignore_checksum_error);
    }

    #[test]
    fn endpoint_parsing() {
        assert_eq!(parse_endpoint("10.0.0.2:10941"), ("10.0.0.2".into(), 10941));
        assert_eq!(parse_endpoint("10.0.0.2"), ("10.0.0.2".into(), 10940));
    }

    #[test]
    fn restart_detection_covers_connection_fields() {
        let a = SensorConfig {
            id: "a".into(),
            ..Default::default()
        };
        let mut b = a.clone();
        b.pose.tx = 4.0;
        assert!(!b.requires_restart_from(&a));
        b.port = 10941;
        assert!(b.requires_restart_from(&a));
    }
}
