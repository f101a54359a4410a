// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! OSC sink over UDP
//!
//! Sends one OSC message per cluster to the configured address pattern,
//! arguments `(id:i32, t_ns:i64, seq:i32, cx, cy, minx, miny, maxx,
//! maxy:f32, n:i32)` with type tags `,ihiffffffi`. With `in_bundle` the
//! messages of a frame are grouped into `#bundle` frames stamped with the
//! NTP timetag of the frame timestamp; `bundle_fragment_size` caps the
//! accumulated bundle size (0 = one bundle per frame). All framing is
//! big-endian per the OSC 1.0 spec; the socket is non-blocking and drops on
//! would-block.

use crate::publisher::SinkPublisher;
use crate::rate::RateGate;
use parking_lot::Mutex;
use scanhub_types::{Cluster, SinkConfig, SinkKind};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

const DEFAULT_OSC_PORT: u16 = 7000;
const DEFAULT_ADDRESS_PATTERN: &str = "/hokuyohub/cluster";
/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
const NTP_UNIX_OFFSET_SECS: u64 = 2_208_988_800;
/// `"#bundle"\0` + 8-byte timetag.
const BUNDLE_HEADER_BYTES: usize = 16;

pub struct OscSinkPublisher {
    url: String,
    path: String,
    in_bundle: bool,
    fragment_size: u32,
    gate: RateGate,
    target: Option<SocketAddr>,
    socket: Mutex<Option<UdpSocket>>,
    enabled: AtomicBool,
}

impl OscSinkPublisher {
    pub fn new() -> Self {
        Self {
            url: String::new(),
            path: DEFAULT_ADDRESS_PATTERN.to_string(),
            in_bundle: false,
            fragment_size: 0,
            gate: RateGate::new(0),
            target: None,
            socket: Mutex::new(None),
            enabled: AtomicBool::new(false),
        }
    }

    fn send(&self, datagram: &[u8]) {
        let guard = self.socket.lock();
        let (Some(socket), Some(target)) = (guard.as_ref(), self.target) else {
            return;
        };
        if let Err(err) = socket.send_to(datagram, target) {
            debug!(url = %self.url, %err, "OSC datagram dropped");
        }
    }
}

impl Default for OscSinkPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkPublisher for OscSinkPublisher {
    fn start(&mut self, config: &SinkConfig) -> bool {
        let SinkKind::Osc {
            url,
            in_bundle,
            bundle_fragment_size,
        } = &config.kind
        else {
            return false;
        };
        self.url = url.clone();
        self.in_bundle = *in_bundle;
        self.fragment_size = *bundle_fragment_size;
        self.gate = RateGate::new(config.rate_limit);

        let Some((host, port, path)) = parse_osc_url(url) else {
            warn!(url = %url, "OSC sink URL must start with 'osc://'");
            return false;
        };
        self.path = path;

        let target = match (host.as_str(), port).to_socket_addrs() {
            Ok(mut addrs) => addrs.next(),
            Err(err) => {
                warn!(url = %url, %err, "failed to resolve OSC target");
                None
            }
        };
        let Some(target) = target else {
            return false;
        };

        let socket = match UdpSocket::bind("0.0.0.0:0") {
            Ok(socket) => socket,
            Err(err) => {
                warn!(url = %url, %err, "failed to create OSC socket");
                return false;
            }
        };
        if let Err(err) = socket.set_nonblocking(true) {
            warn!(url = %url, %err, "failed to set OSC socket non-blocking");
            return false;
        }

        self.target = Some(target);
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
        if self.in_bundle {
            for bundle in encode_bundles(&self.path, t_ns, seq, clusters, self.fragment_size) {
                self.send(&bundle);
            }
        } else {
            for cluster in clusters {
                self.send(&encode_message(&self.path, t_ns, seq, cluster));
            }
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn describe(&self) -> String {
        format!("osc {}", self.url)
    }
}

/// Split `osc://host[:port][/path]`.
fn parse_osc_url(url: &str) -> Option<(String, u16, String)> {
    let rest = url.strip_prefix("osc://")?;
    let (host_port, path) = match rest.find('/') {
        Some(pos) => (&rest[..pos], rest[pos..].to_string()),
        None => (rest, DEFAULT_ADDRESS_PATTERN.to_string()),
    };
    let (host, port) = match host_port.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().ok()?),
        None => (host_port.to_string(), DEFAULT_OSC_PORT),
    };
    Some((host, port, path))
}

/// Null-terminate and pad to a 4-byte boundary.
fn push_padded_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

/// One OSC message for one cluster.
pub fn encode_message(path: &str, t_ns: u64, seq: u32, cluster: &Cluster) -> Vec<u8> {
    let mut out = Vec::with_capacity(96);
    push_padded_str(&mut out, path);
    push_padded_str(&mut out, ",ihiffffffi");

    out.extend_from_slice(&(cluster.id as i32).to_be_bytes());
    out.extend_from_slice(&(t_ns as i64).to_be_bytes());
    out.extend_from_slice(&(seq as i32).to_be_bytes());
    for value in [
        cluster.cx,
        cluster.cy,
        cluster.minx,
        cluster.miny,
        cluster.maxx,
        cluster.maxy,
    ] {
        out.extend_from_slice(&value.to_be_bytes());
    }
    out.extend_from_slice(&(cluster.count() as i32).to_be_bytes());
    out
}

/// 64-bit NTP timetag: seconds since 1900 in the high word, fractional
/// seconds in the low word.
pub fn ntp_timetag(t_ns: u64) -> u64 {
    let secs = t_ns / 1_000_000_000 + NTP_UNIX_OFFSET_SECS;
    let frac_ns = t_ns % 1_000_000_000;
    let frac = (frac_ns << 32) / 1_000_000_000;
    (secs << 32) | frac
}

/// Group one frame's messages into size-capped bundles.
///
/// Each element costs `4 + message_size` bytes on top of the 16-byte bundle
/// header. `fragment_size == 0` puts the whole frame in one bundle.
pub fn encode_bundles(
    path: &str,
    t_ns: u64,
    seq: u32,
    clusters: &[Cluster],
    fragment_size: u32,
) -> Vec<Vec<u8>> {
    let header = |out: &mut Vec<u8>| {
        out.extend_from_slice(b"#bundle\0");
        out.extend_from_slice(&ntp_timetag(t_ns).to_be_bytes());
    };

    let mut bundles = Vec::new();
    let mut current = Vec::with_capacity(BUNDLE_HEADER_BYTES);
    header(&mut current);

    for cluster in clusters {
        let message = encode_message(path, t_ns, seq, cluster);
        let element_len = 4 + message.len();
        let over_budget = fragment_size > 0
            && current.len() > BUNDLE_HEADER_BYTES
            && current.len() + element_len > fragment_size as usize;
        if over_budget {
            bundles.push(std::mem::take(&mut current));
            current.reserve(BUNDLE_HEADER_BYTES);
            header(&mut current);
        }
        current.extend_from_slice(&(message.len() as u32).to_be_bytes());
        current.extend_from_slice(&message);
    }

    if current.len() > BUNDLE_HEADER_BYTES || bundles.is_empty() {
        bundles.push(current);
    }
    bundles
}
