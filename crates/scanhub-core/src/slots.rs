// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sensor slot management
//!
//! A slot owns one configured sensor: its driver instance, its latest raw
//! scan (overwrite-on-arrive), its pose/mask configuration and its noise
//! model. Slots are keyed by stable string id; the numeric slot index is a
//! slot's position in the current configuration order and is re-packed
//! 0..N-1 on every reconfiguration. Noise models travel with the string id,
//! not the index.
//!
//! Locking: the per-slot `latest` mutex is the only lock a driver callback
//! ever takes. The structural lock over the slot list is held by
//! configure/patch paths; the tick clones the slot list under a brief read
//! lock and then works lock-free over the `Arc`s.

use crate::transform::project_scan;
use parking_lot::{Mutex, RwLock};
use scanhub_sensors::{DriverRegistry, RangeSensor};
use scanhub_types::{
    parse_endpoint, AcquisitionMode, PoseDeg, RawScan, ScanFrame, SensorConfig,
    SensorMaskLocal, SensorNoiseModel,
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

struct SensorSlot {
    config: RwLock<SensorConfig>,
    latest: Arc<Mutex<RawScan>>,
    device: Mutex<Option<Box<dyn RangeSensor>>>,
    noise_model: RwLock<SensorNoiseModel>,
    started: AtomicBool,
}

/// Owns every configured sensor slot and produces aggregated frames.
pub struct SlotManager {
    registry: DriverRegistry,
    slots: RwLock<Vec<Arc<SensorSlot>>>,
}

impl SlotManager {
    pub fn new(registry: DriverRegistry) -> Self {
        Self {
            registry,
            slots: RwLock::new(Vec::new()),
        }
    }

    // --- configuration -----------------------------------------------------

    /// Diff-apply a new sensor configuration list.
    ///
    /// New ids get fresh slots and drivers; retained ids are mutated in
    /// place (with a stop/start cycle when a connection-critical field
    /// changed); removed ids are stopped and dropped. Afterwards slot
    /// indices follow the order of `configs`.
    pub fn configure(&self, configs: &[SensorConfig]) {
        let normalized: Vec<SensorConfig> = configs
            .iter()
            .cloned()
            .map(|mut config| {
                config.mask.normalize();
                config.skip_step = config.skip_step.max(1);
                config
            })
            .collect();

        let mut slots = self.slots.write();
        let mut existing: HashMap<String, Arc<SensorSlot>> = slots
            .drain(..)
            .map(|slot| {
                let id = slot.config.read().id.clone();
                (id, slot)
            })
            .collect();

        let mut next = Vec::with_capacity(normalized.len());
        for config in normalized {
            if let Some(slot) = existing.remove(&config.id) {
                let (needs_restart, was_enabled) = {
                    let current = slot.config.read();
                    (config.requires_restart_from(&current), current.enabled)
                };
                let now_enabled = config.enabled;
                *slot.config.write() = config;
                if needs_restart {
                    stop_device(&slot);
                    if now_enabled {
                        start_device(&slot);
                    }
                } else if now_enabled != was_enabled {
                    if now_enabled {
                        start_device(&slot);
                    } else {
                        stop_device(&slot);
                    }
                }
                next.push(slot);
            } else {
                let slot = self.build_slot(config);
                if slot.config.read().enabled {
                    start_device(&slot);
                }
                next.push(slot);
            }
        }

        for (id, slot) in existing {
            info!(sensor_id = %id, "sensor removed from configuration");
            stop_device(&slot);
        }

        *slots = next;
        info!(slots = slots.len(), "sensor slots configured");
    }

    fn build_slot(&self, config: SensorConfig) -> Arc<SensorSlot> {
        let latest = Arc::new(Mutex::new(RawScan::default()));
        let mut device = self.registry.create(&config.sensor_type);
        if let Some(device) = device.as_mut() {
            let cell = latest.clone();
            device.subscribe(Arc::new(move |scan: RawScan| {
                *cell.lock() = scan;
            }));
        }
        Arc::new(SensorSlot {
            config: RwLock::new(config),
            latest,
            device: Mutex::new(device),
            noise_model: RwLock::new(SensorNoiseModel::default()),
            started: AtomicBool::new(false),
        })
    }

    fn find(&self, id: &str) -> Option<Arc<SensorSlot>> {
        self.slots
            .read()
            .iter()
            .find(|slot| slot.config.read().id == id)
            .cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    pub fn slot_index(&self, id: &str) -> Option<u8> {
        self.slots
            .read()
            .iter()
            .position(|slot| slot.config.read().id == id)
            .map(|index| index as u8)
    }

    pub fn sensor_count(&self) -> usize {
        self.slots.read().len()
    }

    /// Current per-slot configurations in index order.
    pub fn sensor_configs(&self) -> Vec<SensorConfig> {
        self.slots
            .read()
            .iter()
            .map(|slot| slot.config.read().clone())
            .collect()
    }

    pub fn slot_config(&self, id: &str) -> Option<SensorConfig> {
        self.find(id).map(|slot| slot.config.read().clone())
    }

    // --- noise models ------------------------------------------------------

    pub fn set_noise_model(&self, id: &str, model: SensorNoiseModel) -> Result<(), String> {
        let slot = self
            .find(id)
            .ok_or_else(|| format!("unknown sensor id '{}'", id))?;
        *slot.noise_model.write() = model;
        Ok(())
    }

    /// Noise models in slot-index order.
    pub fn noise_models(&self) -> Vec<SensorNoiseModel> {
        self.slots
            .read()
            .iter()
            .map(|slot| *slot.noise_model.read())
            .collect()
    }

    // --- slot mutation -----------------------------------------------------

    pub fn set_enabled(&self, id: &str, on: bool) -> Result<(), String> {
        let slot = self
            .find(id)
            .ok_or_else(|| format!("unknown sensor id '{}'", id))?;
        set_slot_enabled(&slot, on);
        Ok(())
    }

    pub fn set_pose(&self, id: &str, tx: f32, ty: f32, theta_deg: f32) -> Result<(), String> {
        let slot = self
            .find(id)
            .ok_or_else(|| format!("unknown sensor id '{}'", id))?;
        slot.config.write().pose = PoseDeg { tx, ty, theta_deg };
        Ok(())
    }

    pub fn set_mask(&self, id: &str, mut mask: SensorMaskLocal) -> Result<(), String> {
        let slot = self
            .find(id)
            .ok_or_else(|| format!("unknown sensor id '{}'", id))?;
        mask.normalize();
        slot.config.write().mask = mask;
        Ok(())
    }

    pub fn restart(&self, id: &str) -> Result<(), String> {
        let slot = self
            .find(id)
            .ok_or_else(|| format!("unknown sensor id '{}'", id))?;
        stop_device(&slot);
        if slot.config.read().enabled {
            start_device(&slot);
        }
        Ok(())
    }

    pub fn stop_all(&self) {
        for slot in self.slots.read().iter() {
            stop_device(slot);
        }
        info!("all sensor drivers stopped");
    }

    // --- patch application -------------------------------------------------

    /// Fine-grained mutation of one slot from a JSON patch.
    ///
    /// Validation happens before any mutation: an invalid value leaves the
    /// slot unchanged and returns a readable reason. Returns the applied
    /// keys with their final values.
    pub fn apply_patch(&self, id: &str, patch: &Value) -> Result<Value, String> {
        let slot = self
            .find(id)
            .ok_or_else(|| format!("unknown sensor id '{}'", id))?;
        let current = slot.config.read().clone();
        let ops = parse_patch(&current, patch)?;

        let mut applied = Map::new();
        let mut needs_restart = false;

        {
            let mut config = slot.config.write();
            if let Some(pose) = ops.pose {
                config.pose = pose;
                applied.insert(
                    "pose".into(),
                    json!({"tx": pose.tx, "ty": pose.ty, "theta_deg": pose.theta_deg}),
                );
            }
            if let Some(mask) = ops.mask {
                config.mask = mask;
                applied.insert("mask".into(), mask_json(&mask));
            }
            if let Some((host, port)) = &ops.endpoint {
                config.host = host.clone();
                config.port = *port;
                needs_restart = true;
                applied.insert("endpoint".into(), json!(format!("{}:{}", host, port)));
            }
            if let Some(mode) = ops.mode {
                config.mode = mode;
                applied.insert("mode".into(), json!(mode.as_str()));
            }
            if let Some(skip) = ops.skip_step {
                config.skip_step = skip;
                applied.insert("skip_step".into(), json!(skip));
            }
            if let Some(flag) = ops.ignore_checksum {
                config.ignore_checksum_error = flag;
                needs_restart = true;
                applied.insert(
                    "ignore_checksum_error".into(),
                    json!(if flag { 1 } else { 0 }),
                );
            }
        }

        // Mode and skip changes try the hot path first; a rejecting driver
        // forces the restart below.
        if let Some(mode) = ops.mode {
            let hot = slot
                .device
                .lock()
                .as_mut()
                .map(|device| device.apply_mode(mode))
                .unwrap_or(false);
            if !hot {
                needs_restart = true;
            }
        }
        if let Some(skip) = ops.skip_step {
            let hot = slot
                .device
                .lock()
                .as_mut()
                .map(|device| device.apply_skip_step(skip))
                .unwrap_or(false);
            if !hot {
                needs_restart = true;
            }
        }

        if let Some(on) = ops.enabled {
            set_slot_enabled(&slot, on);
            applied.insert("enabled".into(), json!(on));
        }

        if needs_restart {
            stop_device(&slot);
            if slot.config.read().enabled {
                start_device(&slot);
            }
        }

        Ok(Value::Object(applied))
    }

    // --- snapshots ---------------------------------------------------------

    pub fn snapshot_json(&self) -> Value {
        let slots = self.slots.read();
        Value::Array(
            slots
                .iter()
                .enumerate()
                .map(|(index, slot)| slot_json(slot, index as u8))
                .collect(),
        )
    }

    pub fn get_json(&self, id: &str) -> Option<Value> {
        let slots = self.slots.read();
        slots
            .iter()
            .position(|slot| slot.config.read().id == id)
            .map(|index| slot_json(&slots[index], index as u8))
    }

    // --- aggregation -------------------------------------------------------

    /// Snapshot every started slot's latest scan and project it into one
    /// world-frame frame. Each per-slot mutex is held only for the copy.
    pub fn collect_frame(&self, seq: u32, t_ns: u64) -> ScanFrame {
        let slots: Vec<Arc<SensorSlot>> = self.slots.read().clone();

        let mut xy = Vec::with_capacity(8192);
        let mut sid = Vec::with_capacity(4096);
        for (index, slot) in slots.iter().enumerate() {
            if !slot.started.load(Ordering::Acquire) {
                continue;
            }
            let scan = slot.latest.lock().clone();
            if scan.is_empty() {
                continue;
            }
            let (pose, mask) = {
                let config = slot.config.read();
                (config.pose, config.mask)
            };
            project_scan(&scan, &pose, &mask, index as u8, &mut xy, &mut sid);
        }

        ScanFrame { seq, t_ns, xy, sid }
    }
}

fn set_slot_enabled(slot: &Arc<SensorSlot>, on: bool) {
    slot.config.write().enabled = on;
    if on {
        if !slot.started.load(Ordering::Acquire) {
            start_device(slot);
        }
    } else {
        stop_device(slot);
    }
}

fn start_device(slot: &Arc<SensorSlot>) {
    let config = slot.config.read().clone();
    let mut guard = slot.device.lock();
    let started = match guard.as_mut() {
        Some(device) => device.start(&config),
        None => {
            warn!(sensor_id = %config.id, sensor_type = %config.sensor_type,
                "no driver for sensor type");
            false
        }
    };
    drop(guard);

    slot.started.store(started, Ordering::Release);
    if started {
        info!(sensor_id = %config.id, endpoint = %config.endpoint(), "sensor started");
    } else {
        // No retries here: reconnect policy belongs to the driver.
        slot.config.write().enabled = false;
        warn!(sensor_id = %config.id, "sensor failed to start");
    }
}

fn stop_device(slot: &Arc<SensorSlot>) {
    if let Some(device) = slot.device.lock().as_mut() {
        device.stop();
    }
    slot.started.store(false, Ordering::Release);
}

// --- patch parsing ---------------------------------------------------------

#[derive(Default)]
struct SensorPatch {
    enabled: Option<bool>,
    pose: Option<PoseDeg>,
    mask: Option<SensorMaskLocal>,
    endpoint: Option<(String, u16)>,
    mode: Option<AcquisitionMode>,
    skip_step: Option<u32>,
    ignore_checksum: Option<bool>,
}

fn as_loose_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

fn as_f32(value: &Value) -> Option<f32> {
    value.as_f64().map(|v| v as f32)
}

/// Validate a patch against the current config without mutating anything.
fn parse_patch(current: &SensorConfig, patch: &Value) -> Result<SensorPatch, String> {
    let object = patch
        .as_object()
        .ok_or_else(|| "patch must be a JSON object".to_string())?;
    let mut ops = SensorPatch::default();

    for key in ["enabled", "on"] {
        if let Some(value) = object.get(key) {
            ops.enabled = Some(
                as_loose_bool(value)
                    .ok_or_else(|| format!("'{}' must be a boolean or 0/1", key))?,
            );
        }
    }

    let mut pose = current.pose;
    let mut pose_touched = false;
    for (key, field) in [("tx", 0), ("ty", 1), ("theta_deg", 2)] {
        if let Some(value) = object.get(key) {
            let value =
                as_f32(value).ok_or_else(|| format!("'{}' must be a number", key))?;
            match field {
                0 => pose.tx = value,
                1 => pose.ty = value,
                _ => pose.theta_deg = value,
            }
            pose_touched = true;
        }
    }
    if let Some(nested) = object.get("pose") {
        let nested = nested
            .as_object()
            .ok_or_else(|| "'pose' must be an object".to_string())?;
        if let Some(value) = nested.get("tx") {
            pose.tx = as_f32(value).ok_or("'pose.tx' must be a number")?;
            pose_touched = true;
        }
        if let Some(value) = nested.get("ty") {
            pose.ty = as_f32(value).ok_or("'pose.ty' must be a number")?;
            pose_touched = true;
        }
        for key in ["theta_deg", "theta"] {
            if let Some(value) = nested.get(key) {
                pose.theta_deg =
                    as_f32(value).ok_or("'pose.theta_deg' must be a number")?;
                pose_touched = true;
            }
        }
    }
    if pose_touched {
        ops.pose = Some(pose);
    }

    if let Some(nested) = object.get("mask") {
        let nested = nested
            .as_object()
            .ok_or_else(|| "'mask' must be an object".to_string())?;
        let mut mask = current.mask;
        if let Some(angle) = nested.get("angle") {
            let angle = angle
                .as_object()
                .ok_or_else(|| "'mask.angle' must be an object".to_string())?;
            for key in ["min_deg", "min"] {
                if let Some(value) = angle.get(key) {
                    mask.angle.min_deg =
                        as_f32(value).ok_or("'mask.angle.min_deg' must be a number")?;
                }
            }
            for key in ["max_deg", "max"] {
                if let Some(value) = angle.get(key) {
                    mask.angle.max_deg =
                        as_f32(value).ok_or("'mask.angle.max_deg' must be a number")?;
                }
            }
        }
        if let Some(range) = nested.get("range") {
            let range = range
                .as_object()
                .ok_or_else(|| "'mask.range' must be an object".to_string())?;
            for key in ["near_m", "near"] {
                if let Some(value) = range.get(key) {
                    mask.range.near_m =
                        as_f32(value).ok_or("'mask.range.near_m' must be a number")?;
                }
            }
            for key in ["far_m", "far"] {
                if let Some(value) = range.get(key) {
                    mask.range.far_m =
                        as_f32(value).ok_or("'mask.range.far_m' must be a number")?;
                }
            }
        }
        mask.normalize();
        ops.mask = Some(mask);
    }

    if let Some(value) = object.get("endpoint") {
        ops.endpoint = Some(match value {
            Value::String(s) => parse_endpoint(s),
            Value::Object(o) => {
                let host = o
                    .get("host")
                    .and_then(Value::as_str)
                    .ok_or("'endpoint.host' must be a string")?
                    .to_string();
                let port = o
                    .get("port")
                    .and_then(Value::as_u64)
                    .unwrap_or(current.port as u64);
                if port == 0 || port > 65535 {
                    return Err("'endpoint.port' must be between 1 and 65535".into());
                }
                (host, port as u16)
            }
            _ => return Err("'endpoint' must be a string or an object".into()),
        });
    }

    if let Some(value) = object.get("mode") {
        let mode = value
            .as_str()
            .and_then(AcquisitionMode::parse)
            .ok_or("'mode' must be 'MD' or 'ME'")?;
        ops.mode = Some(mode);
    }

    if let Some(value) = object.get("skip_step") {
        let skip = value
            .as_i64()
            .ok_or("'skip_step' must be an integer")?;
        if skip < 1 {
            return Err("'skip_step' must be >= 1".into());
        }
        ops.skip_step = Some(skip as u32);
    }

    if let Some(value) = object.get("ignore_checksum_error") {
        ops.ignore_checksum = Some(
            as_loose_bool(value).ok_or("'ignore_checksum_error' must be 0 or 1")?,
        );
    }

    Ok(ops)
}

fn mask_json(mask: &SensorMaskLocal) -> Value {
    json!({
        "angle": {"min_deg": mask.angle.min_deg, "max_deg": mask.angle.max_deg},
        "range": {"near_m": mask.range.near_m, "far_m": mask.range.far_m},
    })
}

fn slot_json(slot: &Arc<SensorSlot>, index: u8) -> Value {
    let config = slot.config.read();
    json!({
        "slot": index,
        "id": config.id,
        "type": config.sensor_type,
        "name": config.name,
        "enabled": config.enabled,
        "started": slot.started.load(Ordering::Acquire),
        "endpoint": config.endpoint(),
        "mode": config.mode.as_str(),
        "interval": config.interval,
        "skip_step": config.skip_step,
        "ignore_checksum_error": if config.ignore_checksum_error { 1 } else { 0 },
        "pose": {
            "tx": config.pose.tx,
            "ty": config.pose.ty,
            "theta_deg": config.pose.theta_deg,
        },
        "mask": mask_json(&config.mask),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanhub_sensors::ScanCallback;

    /// Test driver that pushes one fixed scan synchronously on start.
    struct OneShotSensor {
        callback: Option<ScanCallback>,
    }

    impl RangeSensor for OneShotSensor {
        fn start(&mut self, _config: &SensorConfig) -> bool {
            if let Some(callback) = &self.callback {
                callback(RawScan {
                    t_mono_ns: 1,
                    ranges_mm: vec![2000, 2000, 0, 2000],
                    intensities: Vec::new(),
                    start_angle_deg: 0.0,
                    angle_step_deg: 1.0,
                });
            }
            true
        }
        fn stop(&mut self) {}
        fn subscribe(&mut self, callback: ScanCallback) {
            self.callback = Some(callback);
        }
        fn apply_mode(&mut self, _mode: AcquisitionMode) -> bool {
            true
        }
        fn apply_skip_step(&mut self, _skip: u32) -> bool {
            false
        }
    }

    fn test_registry() -> DriverRegistry {
        let mut registry = DriverRegistry::with_builtin();
        registry.register("oneshot", || {
            Box::new(OneShotSensor { callback: None })
        });
        registry
    }

    fn config(id: &str, enabled: bool) -> SensorConfig {
        SensorConfig {
            id: id.to_string(),
            sensor_type: "oneshot".to_string(),
            enabled,
            ..Default::default()
        }
    }

    #[test]
    fn indices_follow_configuration_order() {
        let manager = SlotManager::new(test_registry());
        manager.configure(&[config("a", false), config("b", false)]);
        assert_eq!(manager.slot_index("a"), Some(0));
        assert_eq!(manager.slot_index("b"), Some(1));

        manager.configure(&[config("b", false), config("a", false)]);
        assert_eq!(manager.slot_index("b"), Some(0));
        assert_eq!(manager.slot_index("a"), Some(1));
    }

    #[test]
    fn noise_models_follow_string_id_across_reconfiguration() {
        let manager = SlotManager::new(test_registry());
        manager.configure(&[config("a", false), config("b", false)]);

        let custom = SensorNoiseModel {
            delta_theta_rad: 0.01,
            sigma0: 0.5,
            alpha: 0.05,
        };
        manager.set_noise_model("a", custom).unwrap();

        manager.configure(&[config("b", false), config("a", false)]);
        let models = manager.noise_models();
        assert_eq!(models[0], SensorNoiseModel::default());
        assert_eq!(models[1], custom);
    }

    #[test]
    fn removed_ids_are_dropped() {
        let manager = SlotManager::new(test_registry());
        manager.configure(&[config("a", false), config("b", false)]);
        manager.configure(&[config("b", false)]);
        assert!(!manager.contains("a"));
        assert_eq!(manager.sensor_count(), 1);
    }

    #[test]
    fn collect_frame_projects_started_slots() {
        let manager = SlotManager::new(test_registry());
        manager.configure(&[config("a", true)]);

        let frame = manager.collect_frame(7, 99);
        assert_eq!(frame.seq, 7);
        assert_eq!(frame.t_ns, 99);
        // 4 samples, one missing (range 0).
        assert_eq!(frame.sid.len(), 3);
        assert_eq!(frame.xy.len(), 2 * frame.sid.len());
        assert!(frame.sid.iter().all(|&s| s == 0));
    }

    #[test]
    fn invalid_skip_step_leaves_slot_unchanged() {
        let manager = SlotManager::new(test_registry());
        manager.configure(&[config("a", false)]);

        let err = manager
            .apply_patch("a", &json!({"skip_step": 0, "tx": 5.0}))
            .unwrap_err();
        assert!(err.contains("skip_step"));

        let config = manager.slot_config("a").unwrap();
        assert_eq!(config.skip_step, 1);
        assert_eq!(config.pose.tx, 0.0);
    }

    #[test]
    fn pose_patch_applies_without_restart() {
        let manager = SlotManager::new(test_registry());
        manager.configure(&[config("a", false)]);

        let applied = manager
            .apply_patch("a", &json!({"tx": 1.5, "pose": {"theta": 90.0}}))
            .unwrap();
        assert_eq!(applied["pose"]["tx"], 1.5);
        assert_eq!(applied["pose"]["theta_deg"], 90.0);

        let config = manager.slot_config("a").unwrap();
        assert_eq!(config.pose.tx, 1.5);
        assert_eq!(config.pose.theta_deg, 90.0);
    }

    #[test]
    fn mask_patch_is_normalized() {
        let manager = SlotManager::new(test_registry());
        manager.configure(&[config("a", false)]);

        manager
            .apply_patch(
                "a",
                &json!({"mask": {"angle": {"min_deg": 90.0, "max_deg": -90.0},
                                  "range": {"near_m": -1.0}}}),
            )
            .unwrap();

        let config = manager.slot_config("a").unwrap();
        assert_eq!(config.mask.angle.min_deg, -90.0);
        assert_eq!(config.mask.angle.max_deg, 90.0);
        assert_eq!(config.mask.range.near_m, 0.0);
    }

    #[test]
    fn endpoint_patch_accepts_string_and_object() {
        let manager = SlotManager::new(test_registry());
        manager.configure(&[config("a", false)]);

        manager
            .apply_patch("a", &json!({"endpoint": "10.0.0.9:10941"}))
            .unwrap();
        let config = manager.slot_config("a").unwrap();
        assert_eq!(config.host, "10.0.0.9");
        assert_eq!(config.port, 10941);

        manager
            .apply_patch("a", &json!({"endpoint": {"host": "10.0.0.8", "port": 4000}}))
            .unwrap();
        let config = manager.slot_config("a").unwrap();
        assert_eq!((config.host.as_str(), config.port), ("10.0.0.8", 4000));
    }

    #[test]
    fn enable_patch_starts_and_stops_the_driver() {
        let manager = SlotManager::new(test_registry());
        manager.configure(&[config("a", false)]);
        assert!(manager.collect_frame(0, 0).is_empty());

        manager.apply_patch("a", &json!({"enabled": true})).unwrap();
        assert!(!manager.collect_frame(1, 0).is_empty());

        manager.apply_patch("a", &json!({"on": 0})).unwrap();
        assert!(manager.collect_frame(2, 0).is_empty());
    }

    #[test]
    fn unknown_driver_type_leaves_slot_not_started() {
        let manager = SlotManager::new(test_registry());
        manager.configure(&[SensorConfig {
            id: "h1".into(),
            sensor_type: "hokuyo_urg_eth".into(),
            enabled: true,
            ..Default::default()
        }]);

        let json = manager.get_json("h1").unwrap();
        assert_eq!(json["started"], false);
        assert_eq!(json["enabled"], false);
        assert!(manager.collect_frame(0, 0).is_empty());
    }

    #[test]
    fn snapshot_lists_slots_in_index_order() {
        let manager = SlotManager::new(test_registry());
        manager.configure(&[config("a", false), config("b", false)]);
        let snapshot = manager.snapshot_json();
        let array = snapshot.as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array[0]["slot"], 0);
        assert_eq!(array[0]["id"], "a");
        assert_eq!(array[1]["id"], "b");
    }

    #[test]
    fn latest_scan_is_overwrite_on_arrive() {
        let manager = SlotManager::new(test_registry());
        manager.configure(&[config("a", true)]);
        // The one-shot driver pushed a single scan; two collects see the
        // same latest snapshot rather than a queue.
        let first = manager.collect_frame(0, 0);
        let second = manager.collect_frame(1, 0);
        assert_eq!(first.xy, second.xy);
    }

    #[test]
    fn manager_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SlotManager>();
    }
}
