// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Named-config store
//!
//! Backs the `configs/list|load|save` control-plane operations with plain
//! YAML files under a configs directory. Names are restricted to
//! `[A-Za-z0-9_-]+`, which also rules out path traversal.

use crate::loader::{dump_app_config, load_app_config};
use crate::{ConfigError, ConfigResult};
use scanhub_types::AppConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// True when `name` is a legal stored-config name.
pub fn is_valid_config_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn named_path(dir: &Path, name: &str) -> ConfigResult<PathBuf> {
    if !is_valid_config_name(name) {
        return Err(ConfigError::InvalidName(name.to_string()));
    }
    Ok(dir.join(format!("{}.yaml", name)))
}

/// List stored config names (stems of `*.yaml` files), sorted.
pub fn list_configs(dir: &Path) -> ConfigResult<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if is_valid_config_name(stem) {
                    names.push(stem.to_string());
                }
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Persist a configuration under `dir/<name>.yaml`.
pub fn save_named_config(dir: &Path, name: &str, config: &AppConfig) -> ConfigResult<PathBuf> {
    let path = named_path(dir, name)?;
    dump_app_config(config, &path)?;
    Ok(path)
}

/// Load a stored configuration by name.
pub fn load_named_config(dir: &Path, name: &str) -> ConfigResult<AppConfig> {
    let path = named_path(dir, name)?;
    load_app_config(&path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn name_validation() {
        assert!(is_valid_config_name("site-A_2"));
        assert!(!is_valid_config_name(""));
        assert!(!is_valid_config_name("../etc/passwd"));
        assert!(!is_valid_config_name("a b"));
        assert!(!is_valid_config_name("a.yaml"));
    }

    #[test]
    fn save_list_load_round_trip() {
        let dir = tempdir().unwrap();
        let mut config = AppConfig::default();
        config.ui.listen = "127.0.0.1:9999".to_string();

        save_named_config(dir.path(), "lab", &config).unwrap();
        assert_eq!(list_configs(dir.path()).unwrap(), vec!["lab".to_string()]);

        let loaded = load_named_config(dir.path(), "lab").unwrap();
        assert_eq!(loaded.ui.listen, "127.0.0.1:9999");
    }

    #[test]
    fn traversal_names_are_rejected() {
        let dir = tempdir().unwrap();
        let err = load_named_config(dir.path(), "../default").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidName(_)));
    }

    #[test]
    fn listing_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(list_configs(&missing).unwrap().is_empty());
    }
}
