// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! NNG pub sink
//!
//! Listens a Pub0 socket on the configured `tcp://` url and publishes one
//! message per granted frame, framed `topic|payload` with the payload in
//! the configured encoding. Pub0 sends are fire-and-forget: with no
//! subscribers the message is dropped, never queued against the tick.

use crate::encode::ClusterBatch;
use crate::publisher::SinkPublisher;
use crate::rate::RateGate;
use nng::{Message, Protocol, Socket};
use parking_lot::Mutex;
use scanhub_types::{Cluster, NngEncoding, SinkConfig, SinkKind};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

pub struct NngSinkPublisher {
    url: String,
    topic: String,
    encoding: NngEncoding,
    gate: RateGate,
    socket: Mutex<Option<Socket>>,
    enabled: AtomicBool,
}

impl NngSinkPublisher {
    pub fn new() -> Self {
        Self {
            url: String::new(),
            topic: String::new(),
            encoding: NngEncoding::Msgpack,
            gate: RateGate::new(0),
            socket: Mutex::new(None),
            enabled: AtomicBool::new(false),
        }
    }

    fn encode(&self, batch: &ClusterBatch) -> Option<Vec<u8>> {
        let payload = match self.encoding {
            NngEncoding::Msgpack => batch.to_msgpack().ok()?,
            NngEncoding::Json => batch.to_json().ok()?,
        };
        if self.topic.is_empty() {
            return Some(payload);
        }
        let mut framed = Vec::with_capacity(self.topic.len() + 1 + payload.len());
        framed.extend_from_slice(self.topic.as_bytes());
        framed.push(b'|');
        framed.extend_from_slice(&payload);
        Some(framed)
    }
}

impl Default for NngSinkPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkPublisher for NngSinkPublisher {
    fn start(&mut self, config: &SinkConfig) -> bool {
        let SinkKind::Nng { url, encoding } = &config.kind else {
            return false;
        };
        self.url = url.clone();
        self.topic = config.topic.clone();
        self.encoding = *encoding;
        self.gate = RateGate::new(config.rate_limit);

        if !url.starts_with("tcp://") {
            warn!(url = %url, "NNG sink URL must start with 'tcp://'");
            return false;
        }

        let socket = match Socket::new(Protocol::Pub0) {
            Ok(socket) => socket,
            Err(err) => {
                warn!(url = %url, %err, "failed to create NNG pub socket");
                return false;
            }
        };
        if let Err(err) = socket.listen(url) {
            warn!(url = %url, %err, "failed to listen NNG pub socket");
            return false;
        }

        *self.socket.lock() = Some(socket);
        self.enabled.store(true, Ordering::Release);
        true
    }

    fn stop(&self) {
        self.enabled.store(false, Ordering::Release);
        *self.socket.lock() = None;
    }

    fn publish_clusters(&self, t_ns: u64, seq: u32, clusters: &[Cluster]) {
        if !self.is_enabled() || !self.gate.should_publish() {
            return;
        }
        let batch = ClusterBatch::new(t_ns, seq, clusters);
        let Some(framed) = self.encode(&batch) else {
            warn!(url = %self.url, seq, "failed to encode cluster batch");
            return;
        };

        let mut message = Message::new();
        message.push_back(&framed);

        let guard = self.socket.lock();
        if let Some(socket) = guard.as_ref() {
            if let Err((_, err)) = socket.send(message) {
                debug!(url = %self.url, seq, %err, "NNG send dropped");
            }
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn describe(&self) -> String {
        format!("nng {} ({})", self.url, self.encoding.as_str())
    }
}
