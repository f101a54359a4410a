// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading and dumping.

use crate::validation::validate_config;
use crate::{ConfigError, ConfigResult};
use scanhub_types::AppConfig;
use std::fs;
use std::path::Path;
use tracing::info;

/// Load, normalize and validate a configuration file.
pub fn load_app_config(path: &Path) -> ConfigResult<AppConfig> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path)?;
    let config = from_yaml_str(&content)?;
    info!(
        path = %path.display(),
        sensors = config.sensors.len(),
        sinks = config.sinks.len(),
        "configuration loaded"
    );
    Ok(config)
}

/// Parse a YAML document into a normalized, validated `AppConfig`.
///
/// Normalization: sensor masks get their bounds ordered and clamped,
/// `skip_step` is floored at 1.
pub fn from_yaml_str(content: &str) -> ConfigResult<AppConfig> {
    let mut config: AppConfig = serde_yaml::from_str(content)?;
    normalize(&mut config);
    validate_config(&config)?;
    Ok(config)
}

fn normalize(config: &mut AppConfig) {
    for sensor in &mut config.sensors {
        sensor.mask.normalize();
        sensor.skip_step = sensor.skip_step.max(1);
    }
}

/// Serialize a configuration to YAML. The output is functionally equivalent
/// to the input document; key order follows the struct definitions.
pub fn to_yaml_string(config: &AppConfig) -> ConfigResult<String> {
    Ok(serde_yaml::to_string(config)?)
}

/// Write a configuration file, creating parent directories as needed.
pub fn dump_app_config(config: &AppConfig, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, to_yaml_string(config)?)?;
    info!(path = %path.display(), "configuration written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanhub_types::{NngEncoding, SinkKind};
    use std::io::Write;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
sensors:
  - id: u1
    type: hokuyo_urg_eth
    host: 192.168.0.21
    port: 10940
    enabled: true
    mode: MD
    skip_step: 0
    pose: { tx: 1.0, ty: -0.5, theta: 0.0 }
    mask:
      angle: { min: 120.0, max: -120.0 }
      range: { near: 0.1, far: 12.0 }
dbscan:
  eps: 1.8
  minPts: 4
world_mask:
  include:
    - [[0.0, 0.0], [5.0, 0.0], [5.0, 5.0], [0.0, 5.0]]
sinks:
  - type: nng
    url: tcp://0.0.0.0:5555
    encoding: msgpack
    topic: clusters
    rate_limit: 30
  - type: osc
    url: osc://127.0.0.1:7000/hokuyohub/cluster
    in_bundle: true
    bundle_fragment_size: 0
    topic: ""
ui:
  listen: 127.0.0.1:9000
security:
  api_token: secret
"#;

    #[test]
    fn parses_and_normalizes_sample() {
        let config = from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.sensors.len(), 1);
        let sensor = &config.sensors[0];
        // Inverted angle window was swapped, skip_step floored.
        assert_eq!(sensor.mask.angle.min_deg, -120.0);
        assert_eq!(sensor.mask.angle.max_deg, 120.0);
        assert_eq!(sensor.skip_step, 1);
        // Legacy eps lands in eps_norm.
        assert_eq!(config.dbscan.eps_norm, 1.8);
        assert_eq!(config.dbscan.min_pts, 4);
        assert_eq!(config.world_mask.include.len(), 1);
        assert_eq!(config.ui.listen, "127.0.0.1:9000");
        assert_eq!(config.security.api_token, "secret");
        match &config.sinks[0].kind {
            SinkKind::Nng { encoding, .. } => assert_eq!(*encoding, NngEncoding::Msgpack),
            _ => panic!("expected nng sink first"),
        }
    }

    #[test]
    fn dump_round_trips_functionally() {
        let config = from_yaml_str(SAMPLE).unwrap();
        let dumped = to_yaml_string(&config).unwrap();
        let reparsed = from_yaml_str(&dumped).unwrap();
        assert_eq!(config.sensors, reparsed.sensors);
        assert_eq!(config.dbscan, reparsed.dbscan);
        assert_eq!(config.world_mask, reparsed.world_mask);
        assert_eq!(config.sinks, reparsed.sinks);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_app_config(Path::new("/nonexistent/scanhub.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn file_load_matches_string_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("default.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_app_config(&path).unwrap();
        assert_eq!(config.sensors[0].id, "u1");
    }
}
