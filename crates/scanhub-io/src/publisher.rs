// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The sink publisher capability and the atomically-swapped publisher set.

use crate::nng_sink::NngSinkPublisher;
use crate::osc_sink::OscSinkPublisher;
use parking_lot::RwLock;
use scanhub_types::{Cluster, SinkConfig, SinkKind};
use std::sync::Arc;
use tracing::{info, warn};

/// Capability set of one sink.
///
/// `start` runs before the publisher joins the live set; `stop` and
/// `publish_clusters` may be called through a shared reference after the
/// set has been frozen into an `Arc`.
pub trait SinkPublisher: Send + Sync {
    fn start(&mut self, config: &SinkConfig) -> bool;
    fn stop(&self);
    fn publish_clusters(&self, t_ns: u64, seq: u32, clusters: &[Cluster]);
    fn is_enabled(&self) -> bool;
    fn describe(&self) -> String;
}

type PublisherSet = Arc<Vec<Box<dyn SinkPublisher>>>;

/// Owns the current publisher generation.
///
/// Reconfiguration builds and starts a complete new vector, then swaps it in
/// and stops the old one; each publication snapshots the current `Arc` so a
/// swap mid-frame targets either the old or the new set exclusively.
pub struct PublisherManager {
    publishers: RwLock<PublisherSet>,
}

impl PublisherManager {
    pub fn new() -> Self {
        Self {
            publishers: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Rebuild the publisher set from sink descriptors. Publishers that fail
    /// to start stay in the set disabled, so the snapshot still reflects the
    /// configuration. Returns true when every sink started.
    pub fn configure(&self, sinks: &[SinkConfig]) -> bool {
        let mut next: Vec<Box<dyn SinkPublisher>> = Vec::with_capacity(sinks.len());
        let mut failures = 0usize;

        for sink in sinks {
            let mut publisher: Box<dyn SinkPublisher> = match sink.kind {
                SinkKind::Nng { .. } => Box::new(NngSinkPublisher::new()),
                SinkKind::Osc { .. } => Box::new(OscSinkPublisher::new()),
            };
            if publisher.start(sink) {
                info!(sink = %publisher.describe(), "sink publisher started");
            } else {
                warn!(sink = %publisher.describe(), "sink publisher failed to start");
                failures += 1;
            }
            next.push(publisher);
        }

        // Old publishers stop before the new set becomes live; an in-flight
        // publication keeps its snapshot and targets exactly one set.
        {
            let mut guard = self.publishers.write();
            for publisher in guard.iter() {
                publisher.stop();
            }
            *guard = Arc::new(next);
        }

        info!(
            total = sinks.len(),
            failed = failures,
            "publisher set reconfigured"
        );
        failures == 0
    }

    /// Fan a cluster batch out to the current set. Never blocks the caller
    /// beyond the sinks' own non-blocking sends.
    pub fn publish_clusters(&self, t_ns: u64, seq: u32, clusters: &[Cluster]) {
        let snapshot = self.publishers.read().clone();
        for publisher in snapshot.iter() {
            if publisher.is_enabled() {
                publisher.publish_clusters(t_ns, seq, clusters);
            }
        }
    }

    pub fn stop_all(&self) {
        let old = {
            let mut guard = self.publishers.write();
            std::mem::replace(&mut *guard, Arc::new(Vec::new()))
        };
        for publisher in old.iter() {
            publisher.stop();
        }
        info!("all sink publishers stopped");
    }

    pub fn publisher_count(&self) -> usize {
        self.publishers.read().len()
    }

    pub fn enabled_count(&self) -> usize {
        self.publishers
            .read()
            .iter()
            .filter(|p| p.is_enabled())
            .count()
    }

    pub fn describe_all(&self) -> Vec<String> {
        self.publishers.read().iter().map(|p| p.describe()).collect()
    }
}

impl Default for PublisherManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanhub_types::NngEncoding;

    fn osc_sink(url: &str) -> SinkConfig {
        SinkConfig {
            topic: String::new(),
            rate_limit: 0,
            kind: SinkKind::Osc {
                url: url.to_string(),
                in_bundle: false,
                bundle_fragment_size: 0,
            },
        }
    }

    #[test]
    fn configure_replaces_the_set_atomically() {
        let manager = PublisherManager::new();
        assert!(manager.configure(&[osc_sink("osc://127.0.0.1:17001/a")]));
        assert_eq!(manager.publisher_count(), 1);
        assert_eq!(manager.enabled_count(), 1);

        assert!(manager.configure(&[
            osc_sink("osc://127.0.0.1:17002/b"),
            osc_sink("osc://127.0.0.1:17003/c"),
        ]));
        assert_eq!(manager.publisher_count(), 2);

        manager.stop_all();
        assert_eq!(manager.publisher_count(), 0);
    }

    #[test]
    fn bad_sink_stays_in_set_disabled() {
        let manager = PublisherManager::new();
        assert!(!manager.configure(&[osc_sink("udp://not-an-osc-url")]));
        assert_eq!(manager.publisher_count(), 1);
        assert_eq!(manager.enabled_count(), 0);
        // Publishing against a disabled publisher is a no-op, not an error.
        manager.publish_clusters(0, 0, &[]);
    }

    #[test]
    fn nng_descriptor_builds_nng_publisher() {
        let manager = PublisherManager::new();
        manager.configure(&[SinkConfig {
            topic: "clusters".into(),
            rate_limit: 0,
            kind: SinkKind::Nng {
                url: "tcp://127.0.0.1:17990".into(),
                encoding: NngEncoding::Json,
            },
        }]);
        let described = manager.describe_all().join(",");
        assert!(described.starts_with("nng"));
    }
}
