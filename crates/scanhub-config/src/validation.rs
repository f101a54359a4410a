// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Collects every problem found in a configuration before failing, so a bad
//! file reports all of its defects in one pass.

use crate::{ConfigError, ConfigResult};
use scanhub_types::{AppConfig, DbscanConfig, SinkKind};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    DuplicateSensorId { id: String },
    InvalidValue { field: String, reason: String },
    InvalidSinkUrl { index: usize, reason: String },
    DegeneratePolygon { list: &'static str, index: usize },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateSensorId { id } => {
                write!(f, "Duplicate sensor id '{}'", id)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
            Self::InvalidSinkUrl { index, reason } => {
                write!(f, "Invalid sink url at index {}: {}", index, reason)
            }
            Self::DegeneratePolygon { list, index } => {
                write!(
                    f,
                    "world_mask.{}[{}] has fewer than 3 vertices",
                    list, index
                )
            }
        }
    }
}

/// Validate a complete configuration, collecting every defect.
pub fn validate_config(config: &AppConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_sensors(config, &mut errors);
    errors.extend(validate_dbscan(&config.dbscan));
    validate_sinks(config, &mut errors);
    validate_world_mask(config, &mut errors);

    if errors.is_empty() {
        return Ok(());
    }
    let messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");
    Err(ConfigError::Validation(messages))
}

fn validate_sensors(config: &AppConfig, errors: &mut Vec<ConfigValidationError>) {
    let mut seen = std::collections::HashSet::new();
    for sensor in &config.sensors {
        if sensor.id.is_empty() {
            errors.push(ConfigValidationError::InvalidValue {
                field: "sensors[].id".to_string(),
                reason: "must not be empty".to_string(),
            });
            continue;
        }
        if !seen.insert(sensor.id.clone()) {
            errors.push(ConfigValidationError::DuplicateSensorId {
                id: sensor.id.clone(),
            });
        }
        if sensor.port == 0 {
            errors.push(ConfigValidationError::InvalidValue {
                field: format!("sensors[{}].port", sensor.id),
                reason: "must be between 1 and 65535".to_string(),
            });
        }
    }
}

/// Validate clustering parameters against their documented bounds.
///
/// The same bounds gate the `PUT /api/v1/dbscan` endpoint.
pub fn validate_dbscan(dbscan: &DbscanConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    let mut check = |ok: bool, field: &str, reason: String| {
        if !ok {
            errors.push(ConfigValidationError::InvalidValue {
                field: format!("dbscan.{}", field),
                reason,
            });
        }
    };

    check(
        (0.1..=10.0).contains(&dbscan.eps_norm),
        "eps_norm",
        "must be between 0.1 and 10.0".to_string(),
    );
    check(
        (1..=100).contains(&dbscan.min_pts),
        "minPts",
        "must be between 1 and 100".to_string(),
    );
    check(
        (0.1..=10.0).contains(&dbscan.k_scale),
        "k_scale",
        "must be between 0.1 and 10.0".to_string(),
    );
    check(
        dbscan.h_min >= 0.001 && dbscan.h_min <= dbscan.h_max,
        "h_min",
        "must be between 0.001 and h_max".to_string(),
    );
    check(
        dbscan.h_max >= dbscan.h_min && dbscan.h_max <= 1.0,
        "h_max",
        "must be between h_min and 1.0".to_string(),
    );
    check(
        (1..=50).contains(&dbscan.r_max),
        "R_max",
        "must be between 1 and 50".to_string(),
    );
    check(
        (10..=5000).contains(&dbscan.m_max),
        "M_max",
        "must be between 10 and 5000".to_string(),
    );

    errors
}

fn validate_sinks(config: &AppConfig, errors: &mut Vec<ConfigValidationError>) {
    for (index, sink) in config.sinks.iter().enumerate() {
        match &sink.kind {
            SinkKind::Nng { url, .. } => {
                if !url.starts_with("tcp://") {
                    errors.push(ConfigValidationError::InvalidSinkUrl {
                        index,
                        reason: "NNG sink URL must start with 'tcp://'".to_string(),
                    });
                }
            }
            SinkKind::Osc { url, .. } => {
                if !url.starts_with("osc://") {
                    errors.push(ConfigValidationError::InvalidSinkUrl {
                        index,
                        reason: "OSC sink URL must start with 'osc://'".to_string(),
                    });
                }
            }
        }
    }
}

fn validate_world_mask(config: &AppConfig, errors: &mut Vec<ConfigValidationError>) {
    for (index, polygon) in config.world_mask.include.iter().enumerate() {
        if polygon.points.len() < 3 {
            errors.push(ConfigValidationError::DegeneratePolygon {
                list: "include",
                index,
            });
        }
    }
    for (index, polygon) in config.world_mask.exclude.iter().enumerate() {
        if polygon.points.len() < 3 {
            errors.push(ConfigValidationError::DegeneratePolygon {
                list: "exclude",
                index,
            });
        }
    }
}
