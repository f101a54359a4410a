// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Hot-swappable filter state
//!
//! Owns the prefilter and postfilter together with their configurations.
//! Updates recreate the filter objects under one mutex; the aggregation
//! thread applies filters under the same mutex, so a reconfiguration takes
//! effect on a frame boundary and never mid-frame.

use parking_lot::Mutex;
use scanhub_detect::{Postfilter, PostfilterOutput, Prefilter, PrefilterOutput};
use scanhub_types::{Cluster, PostfilterConfig, PrefilterConfig};
use tracing::info;

struct FilterState {
    prefilter_config: PrefilterConfig,
    postfilter_config: PostfilterConfig,
    prefilter: Prefilter,
    postfilter: Postfilter,
}

pub struct FilterManager {
    state: Mutex<FilterState>,
}

impl FilterManager {
    pub fn new(prefilter_config: PrefilterConfig, postfilter_config: PostfilterConfig) -> Self {
        Self {
            state: Mutex::new(FilterState {
                prefilter: Prefilter::new(prefilter_config.clone()),
                postfilter: Postfilter::new(postfilter_config.clone()),
                prefilter_config,
                postfilter_config,
            }),
        }
    }

    pub fn set_prefilter_config(&self, config: PrefilterConfig) {
        let mut state = self.state.lock();
        state.prefilter = Prefilter::new(config.clone());
        state.prefilter_config = config;
        info!("prefilter configuration updated");
    }

    pub fn set_postfilter_config(&self, config: PostfilterConfig) {
        let mut state = self.state.lock();
        state.postfilter = Postfilter::new(config.clone());
        state.postfilter_config = config;
        info!("postfilter configuration updated");
    }

    pub fn prefilter_config(&self) -> PrefilterConfig {
        self.state.lock().prefilter_config.clone()
    }

    pub fn postfilter_config(&self) -> PostfilterConfig {
        self.state.lock().postfilter_config.clone()
    }

    pub fn is_prefilter_enabled(&self) -> bool {
        self.state.lock().prefilter_config.enabled
    }

    pub fn is_postfilter_enabled(&self) -> bool {
        self.state.lock().postfilter_config.enabled
    }

    pub fn apply_prefilter(&self, xy: &[f32], sid: &[u8], intensities: &[f32]) -> PrefilterOutput {
        self.state.lock().prefilter.apply(xy, sid, intensities)
    }

    pub fn apply_postfilter(
        &self,
        clusters: Vec<Cluster>,
        xy: &[f32],
        sid: &[u8],
    ) -> PostfilterOutput {
        self.state.lock().postfilter.apply(clusters, xy, sid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_recreates_the_prefilter() {
        let manager = FilterManager::new(Default::default(), Default::default());
        assert!(manager.is_prefilter_enabled());

        let mut config = PrefilterConfig::default();
        config.enabled = false;
        manager.set_prefilter_config(config);
        assert!(!manager.is_prefilter_enabled());

        // A disabled chain passes data through untouched.
        let out = manager.apply_prefilter(&[1.0, 2.0], &[0], &[]);
        assert_eq!(out.xy, vec![1.0, 2.0]);
    }

    #[test]
    fn postfilter_config_round_trips() {
        let manager = FilterManager::new(Default::default(), Default::default());
        let mut config = PostfilterConfig::default();
        config.isolation_removal.required_neighbors = 4;
        manager.set_postfilter_config(config.clone());
        assert_eq!(manager.postfilter_config(), config);
    }
}
