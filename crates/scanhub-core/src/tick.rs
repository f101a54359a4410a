// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Aggregation tick runner
//!
//! A dedicated thread snapshots every started slot at a fixed cadence and
//! emits one frame per iteration. Scheduling is absolute: `next_tick`
//! advances by the period each iteration, so a fast frame does not creep
//! the cadence forward. Frames carry a strictly increasing sequence number
//! and a system-clock timestamp.
//!
//! A panic anywhere downstream of the handler is caught and logged with the
//! frame's sequence number; the loop continues with the next frame.

use crate::slots::SlotManager;
use parking_lot::RwLock;
use scanhub_types::ScanFrame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{error, info};

pub type FrameHandler = Arc<dyn Fn(&ScanFrame) + Send + Sync>;

pub const DEFAULT_TICK_HZ: f64 = 30.0;

/// Owns the aggregation thread.
pub struct TickRunner {
    slots: Arc<SlotManager>,
    rate_hz: Arc<RwLock<f64>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TickRunner {
    pub fn new(slots: Arc<SlotManager>, rate_hz: f64) -> Self {
        Self {
            slots,
            rate_hz: Arc::new(RwLock::new(rate_hz.max(0.1))),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Adjust the target rate; takes effect on the next iteration.
    pub fn set_rate(&self, rate_hz: f64) {
        *self.rate_hz.write() = rate_hz.max(0.1);
    }

    pub fn rate(&self) -> f64 {
        *self.rate_hz.read()
    }

    /// Start the tick thread. The handler runs synchronously on that thread
    /// for every frame and is expected to be non-blocking.
    pub fn start(&mut self, handler: FrameHandler) -> Result<(), String> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err("aggregation tick already running".to_string());
        }

        let slots = self.slots.clone();
        let rate_hz = self.rate_hz.clone();
        let running = self.running.clone();

        let handle = thread::Builder::new()
            .name("scanhub-tick".to_string())
            .spawn(move || tick_loop(slots, rate_hz, running, handler))
            .map_err(|e| format!("failed to spawn tick thread: {}", e))?;

        self.handle = Some(handle);
        info!(rate_hz = self.rate(), "aggregation tick started");
        Ok(())
    }

    /// Flag the loop down and join it.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("tick thread panicked during shutdown");
            }
        }
        info!("aggregation tick stopped");
    }
}

impl Drop for TickRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn system_time_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

fn tick_loop(
    slots: Arc<SlotManager>,
    rate_hz: Arc<RwLock<f64>>,
    running: Arc<AtomicBool>,
    handler: FrameHandler,
) {
    let mut seq = 0u32;
    let mut period = Duration::from_secs_f64(1.0 / *rate_hz.read());
    let mut next_tick = Instant::now() + period;

    while running.load(Ordering::Acquire) {
        let frame = slots.collect_frame(seq, system_time_ns());
        seq = seq.wrapping_add(1);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            handler(&frame);
        }));
        if result.is_err() {
            error!(seq = frame.seq, "frame handler panicked; continuing");
        }

        // Absolute schedule: advance by the (possibly updated) period and
        // sleep to the deadline, so processing time does not accumulate.
        period = Duration::from_secs_f64(1.0 / *rate_hz.read());
        next_tick += period;
        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        }
    }
}
