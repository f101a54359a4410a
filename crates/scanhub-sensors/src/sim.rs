// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Synthetic range-finder driver
//!
//! Produces scans of a static wall plus one slowly orbiting blob, at the
//! configured interval, from its own thread. Used by development setups and
//! by the integration tests; hot mode/skip changes are accepted without a
//! restart.

use crate::traits::{RangeSensor, ScanCallback};
use parking_lot::Mutex;
use scanhub_types::{AcquisitionMode, RawScan, SensorConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const BASE_STEP_DEG: f32 = 0.25;
const FIELD_OF_VIEW_DEG: f32 = 270.0;
const WALL_RANGE_M: f32 = 2.0;

#[derive(Debug, Clone, Copy)]
struct SimParams {
    mode: AcquisitionMode,
    skip_step: u32,
    interval_ms: u32,
}

/// Synthetic driver implementing the full [`RangeSensor`] contract.
pub struct SimSensor {
    params: Arc<Mutex<SimParams>>,
    callback: Arc<Mutex<Option<ScanCallback>>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SimSensor {
    pub fn new() -> Self {
        Self {
            params: Arc::new(Mutex::new(SimParams {
                mode: AcquisitionMode::DistanceIntensity,
                skip_step: 1,
                interval_ms: 33,
            })),
            callback: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

impl Default for SimSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeSensor for SimSensor {
    fn start(&mut self, config: &SensorConfig) -> bool {
        if self.running.swap(true, Ordering::AcqRel) {
            return true;
        }
        {
            let mut params = self.params.lock();
            params.mode = config.mode;
            params.skip_step = config.skip_step.max(1);
            params.interval_ms = if config.interval > 0 { config.interval } else { 33 };
        }

        let params = self.params.clone();
        let callback = self.callback.clone();
        let running = self.running.clone();
        let sensor_id = config.id.clone();

        let spawned = thread::Builder::new()
            .name(format!("sim-sensor-{}", sensor_id))
            .spawn(move || {
                let origin = Instant::now();
                let mut tick = 0u64;
                while running.load(Ordering::Acquire) {
                    let p = *params.lock();
                    let scan = generate_scan(tick, &p, origin.elapsed());
                    if let Some(cb) = callback.lock().clone() {
                        cb(scan);
                    }
                    tick += 1;
                    thread::sleep(Duration::from_millis(p.interval_ms as u64));
                }
                debug!(sensor_id = %sensor_id, "sim sensor thread exit");
            });

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                info!("sim sensor started");
                true
            }
            Err(_) => {
                self.running.store(false, Ordering::Release);
                false
            }
        }
    }

    fn stop(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn subscribe(&mut self, callback: ScanCallback) {
        *self.callback.lock() = Some(callback);
    }

    fn apply_mode(&mut self, mode: AcquisitionMode) -> bool {
        self.params.lock().mode = mode;
        true
    }

    fn apply_skip_step(&mut self, skip_step: u32) -> bool {
        if skip_step < 1 {
            return false;
        }
        self.params.lock().skip_step = skip_step;
        true
    }
}

impl Drop for SimSensor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn generate_scan(tick: u64, params: &SimParams, elapsed: Duration) -> RawScan {
    let step_deg = BASE_STEP_DEG * params.skip_step as f32;
    let samples = (FIELD_OF_VIEW_DEG / step_deg) as usize + 1;
    let start_angle_deg = -FIELD_OF_VIEW_DEG / 2.0;

    let t = tick as f32 * 0.1;
    let blob_angle_deg = 40.0 * (t * 0.3).sin();
    let blob_range_m = 1.2 + 0.2 * (t * 0.7).cos();

    let mut ranges_mm = Vec::with_capacity(samples);
    let mut intensities = Vec::with_capacity(samples);
    for i in 0..samples {
        let angle_deg = start_angle_deg + i as f32 * step_deg;
        // Wall everywhere, blob carved in front of it over a 6 degree arc.
        let range_m = if (angle_deg - blob_angle_deg).abs() < 3.0 {
            blob_range_m
        } else {
            WALL_RANGE_M
        };
        ranges_mm.push((range_m * 1000.0) as u16);
        if params.mode == AcquisitionMode::DistanceIntensity {
            intensities.push(1000 + (i % 100) as u16);
        }
    }

    RawScan {
        t_mono_ns: elapsed.as_nanos() as u64,
        ranges_mm,
        intensities,
        start_angle_deg,
        angle_step_deg: step_deg,
    }
}
