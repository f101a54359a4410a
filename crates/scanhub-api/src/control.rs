// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Control adapter
//!
//! Single mutation point for everything the control plane can touch:
//! sensors, filter configs, clustering parameters, sinks, the world mask
//! and whole-config load/import. Every mutation runs under one serializing
//! lock, updates the persistent `AppConfig` snapshot, rebuilds the affected
//! runtime state, and broadcasts an update to live subscribers. REST and
//! WebSocket fronts both call into here, so the two surfaces cannot drift.

use crate::error::ApiError;
use crate::ws::WsHub;
use parking_lot::{Mutex, RwLock};
use scanhub_config::{
    is_valid_config_name, list_configs, load_named_config, save_named_config,
    validate_dbscan, ConfigError,
};
use scanhub_core::{DetectionPipeline, SlotManager};
use scanhub_types::{
    parse_endpoint, AcquisitionMode, AppConfig, NngEncoding, Polygon, PostfilterConfig,
    PrefilterConfig, SensorConfig, SinkConfig, SinkKind,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ControlAdapter {
    config: RwLock<AppConfig>,
    config_dir: PathBuf,
    slots: Arc<SlotManager>,
    pipeline: Arc<DetectionPipeline>,
    hub: WsHub,
    patch_lock: Mutex<()>,
}

impl ControlAdapter {
    pub fn new(
        config: AppConfig,
        slots: Arc<SlotManager>,
        pipeline: Arc<DetectionPipeline>,
        hub: WsHub,
        config_dir: PathBuf,
    ) -> Self {
        Self {
            config: RwLock::new(config),
            config_dir,
            slots,
            pipeline,
            hub,
            patch_lock: Mutex::new(()),
        }
    }

    pub fn hub(&self) -> &WsHub {
        &self.hub
    }

    pub fn api_token(&self) -> String {
        self.config.read().security.api_token.clone()
    }

    pub fn ui_listen(&self) -> String {
        self.config.read().ui.listen.clone()
    }

    /// Bring runtime state in line with the held configuration: sensors,
    /// publishers, world mask, noise models.
    pub fn apply_initial_runtime(&self) {
        let sensors = self.config.read().sensors.clone();
        self.slots.configure(&sensors);
        // Slots normalize masks and may disable failed sensors; keep the
        // persistent snapshot in line with what actually runs.
        self.config.write().sensors = self.slots.sensor_configs();
        self.sync_noise_models();

        let config = self.config.read();
        self.pipeline.set_world_mask(config.world_mask.clone());
        self.pipeline.publishers().configure(&config.sinks);
    }

    fn sync_noise_models(&self) {
        self.pipeline
            .dbscan()
            .sync_noise_models(&self.slots.noise_models());
    }

    // --- snapshots ---------------------------------------------------------

    /// Snapshot shape pushed to WebSocket subscribers.
    pub fn live_snapshot(&self) -> Value {
        json!({
            "sensors": self.slots.snapshot_json(),
            "world_mask": serde_json::to_value(&self.config.read().world_mask)
                .unwrap_or(Value::Null),
            "filter_config": self.filters_json(),
            "dbscan": self.dbscan_json(),
            "publishers": self.pipeline.publishers().describe_all(),
        })
    }

    /// Aggregate for `GET /api/v1/snapshot`.
    pub fn snapshot_json(&self) -> Value {
        let config = self.config.read();
        json!({
            "sensors": self.slots.snapshot_json(),
            "filters": self.filters_json(),
            "dbscan": self.dbscan_json(),
            "world_mask": {
                "include": config.world_mask.include.len(),
                "exclude": config.world_mask.exclude.len(),
            },
            "publishers": self.pipeline.publishers().describe_all(),
            "ui": {"listen": config.ui.listen},
        })
    }

    fn broadcast_snapshot(&self) {
        let mut message = json!({"type": "sensor.snapshot"});
        if let (Some(target), Some(source)) =
            (message.as_object_mut(), self.live_snapshot().as_object())
        {
            for (key, value) in source {
                target.insert(key.clone(), value.clone());
            }
        }
        self.hub.broadcast(&message);
    }

    // --- sensors -----------------------------------------------------------

    pub fn sensors_json(&self) -> Value {
        self.slots.snapshot_json()
    }

    pub fn sensor_json(&self, id: &str) -> Result<Value, ApiError> {
        self.slots
            .get_json(id)
            .ok_or_else(|| ApiError::not_found("Sensor not found"))
    }

    pub fn set_sensor_enabled(&self, id: &str, on: bool) -> Result<(), ApiError> {
        let _guard = self.patch_lock.lock();
        self.slots
            .set_enabled(id, on)
            .map_err(|err| self.sensor_error(id, err))?;
        self.persist_sensor(id);
        self.broadcast_sensor_updated(id);
        Ok(())
    }

    pub fn patch_sensor(&self, id: &str, patch: &Value) -> Result<Value, ApiError> {
        let _guard = self.patch_lock.lock();
        let applied = self
            .slots
            .apply_patch(id, patch)
            .map_err(|err| self.sensor_error(id, err))?;
        self.persist_sensor(id);
        self.broadcast_sensor_updated(id);
        Ok(json!({
            "id": id,
            "applied": applied,
            "sensor": self.slots.get_json(id).unwrap_or(Value::Null),
        }))
    }

    fn sensor_error(&self, id: &str, message: String) -> ApiError {
        if message.contains("unknown sensor id") {
            ApiError::not_found(format!("Sensor '{}' not found", id))
        } else {
            ApiError::invalid_value(message)
        }
    }

    fn persist_sensor(&self, id: &str) {
        if let Some(updated) = self.slots.slot_config(id) {
            let mut config = self.config.write();
            if let Some(entry) = config.sensors.iter_mut().find(|s| s.id == id) {
                *entry = updated;
            }
        }
    }

    fn broadcast_sensor_updated(&self, id: &str) {
        if let Some(sensor) = self.slots.get_json(id) {
            self.hub
                .broadcast(&json!({"type": "sensor.updated", "sensor": sensor}));
        }
    }

    /// Create a sensor from a JSON body, generating a unique id from its
    /// name by appending ` <n>` when needed.
    pub fn add_sensor(&self, body: &Value) -> Result<Value, ApiError> {
        let _guard = self.patch_lock.lock();
        let object = body
            .as_object()
            .ok_or_else(|| ApiError::invalid_json("Invalid JSON in request body"))?;

        let sensor_type = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::invalid_field("Missing required field: type"))?;
        if !matches!(sensor_type, "hokuyo_urg_eth" | "sim" | "unknown") {
            return Err(ApiError::invalid_value(
                "Sensor type must be 'hokuyo_urg_eth', 'sim' or 'unknown'",
            ));
        }

        let name = object
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("sensor")
            .to_string();
        let id = self.generate_sensor_id(&name);

        let mut sensor = SensorConfig {
            id: id.clone(),
            sensor_type: sensor_type.to_string(),
            name,
            enabled: object.get("enabled").and_then(Value::as_bool).unwrap_or(true),
            ..Default::default()
        };

        if let Some(endpoint) = object.get("endpoint").and_then(Value::as_str) {
            let (host, port) = parse_endpoint(endpoint);
            sensor.host = host;
            sensor.port = port;
        }
        if sensor.port == 0 {
            return Err(ApiError::invalid_value("Port must be between 1 and 65535"));
        }

        if let Some(mode) = object.get("mode").and_then(Value::as_str) {
            sensor.mode = AcquisitionMode::parse(mode)
                .ok_or_else(|| ApiError::invalid_value("Mode must be 'MD' or 'ME'"))?;
        }
        if let Some(interval) = object.get("interval").and_then(Value::as_u64) {
            sensor.interval = interval as u32;
        }
        if let Some(skip) = object.get("skip_step").and_then(Value::as_i64) {
            sensor.skip_step = skip.max(1) as u32;
        }
        if let Some(flag) = object.get("ignore_checksum_error") {
            sensor.ignore_checksum_error = flag
                .as_bool()
                .or_else(|| flag.as_i64().map(|i| i != 0))
                .unwrap_or(true);
        }
        if let Some(pose) = object.get("pose").and_then(Value::as_object) {
            sensor.pose.tx = pose.get("tx").and_then(Value::as_f64).unwrap_or(0.0) as f32;
            sensor.pose.ty = pose.get("ty").and_then(Value::as_f64).unwrap_or(0.0) as f32;
            sensor.pose.theta_deg = pose
                .get("theta_deg")
                .or_else(|| pose.get("theta"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0) as f32;
        }
        if let Some(mask) = object.get("mask") {
            if let Ok(parsed) = serde_json::from_value(mask.clone()) {
                sensor.mask = parsed;
                sensor.mask.normalize();
            }
        }

        let sensors = {
            let mut config = self.config.write();
            config.sensors.push(sensor);
            config.sensors.clone()
        };
        self.slots.configure(&sensors);
        self.config.write().sensors = self.slots.sensor_configs();
        self.sync_noise_models();
        self.broadcast_snapshot();
        info!(sensor_id = %id, "sensor added");

        self.sensor_json(&id)
    }

    fn generate_sensor_id(&self, base: &str) -> String {
        let config = self.config.read();
        let mut appendix_max = 0u32;
        for sensor in &config.sensors {
            if let Some(suffix) = sensor.id.strip_prefix(base) {
                if suffix.is_empty() {
                    appendix_max = appendix_max.max(1);
                } else if let Some(number) = suffix.strip_prefix(' ') {
                    if let Ok(number) = number.parse::<u32>() {
                        appendix_max = appendix_max.max(number + 1);
                    }
                }
            }
        }
        if appendix_max > 0 {
            format!("{} {}", base, appendix_max)
        } else {
            base.to_string()
        }
    }

    pub fn delete_sensor(&self, id: &str) -> Result<(), ApiError> {
        let _guard = self.patch_lock.lock();
        let sensors = {
            let mut config = self.config.write();
            let before = config.sensors.len();
            config.sensors.retain(|sensor| sensor.id != id);
            if config.sensors.len() == before {
                return Err(ApiError::not_found("Sensor not found"));
            }
            config.sensors.clone()
        };
        self.slots.configure(&sensors);
        self.sync_noise_models();
        self.broadcast_snapshot();
        info!(sensor_id = %id, "sensor deleted");
        Ok(())
    }

    // --- filters -----------------------------------------------------------

    pub fn filters_json(&self) -> Value {
        json!({
            "prefilter": serde_json::to_value(self.pipeline.filters().prefilter_config())
                .unwrap_or(Value::Null),
            "postfilter": serde_json::to_value(self.pipeline.filters().postfilter_config())
                .unwrap_or(Value::Null),
        })
    }

    pub fn put_prefilter(&self, body: &Value) -> Result<Value, ApiError> {
        let _guard = self.patch_lock.lock();
        let parsed: PrefilterConfig = serde_json::from_value(body.clone())
            .map_err(|err| ApiError::invalid_json(err.to_string()))?;
        self.pipeline.filters().set_prefilter_config(parsed.clone());
        self.config.write().prefilter = parsed;
        self.broadcast_filters_updated();
        Ok(self.filters_json())
    }

    pub fn put_postfilter(&self, body: &Value) -> Result<Value, ApiError> {
        let _guard = self.patch_lock.lock();
        let parsed: PostfilterConfig = serde_json::from_value(body.clone())
            .map_err(|err| ApiError::invalid_json(err.to_string()))?;
        self.pipeline
            .filters()
            .set_postfilter_config(parsed.clone());
        self.config.write().postfilter = parsed;
        self.broadcast_filters_updated();
        Ok(self.filters_json())
    }

    /// Combined update, `{prefilter: ..., postfilter: ...}` with either key
    /// optional.
    pub fn update_filters(&self, body: &Value) -> Result<(), ApiError> {
        let object = body
            .as_object()
            .ok_or_else(|| ApiError::invalid_json("filter config must be an object"))?;
        if let Some(prefilter) = object.get("prefilter") {
            self.put_prefilter(prefilter)?;
        }
        if let Some(postfilter) = object.get("postfilter") {
            self.put_postfilter(postfilter)?;
        }
        Ok(())
    }

    fn broadcast_filters_updated(&self) {
        self.hub.broadcast(&json!({
            "type": "filter.updated",
            "config": self.filters_json(),
        }));
    }

    // --- dbscan ------------------------------------------------------------

    pub fn dbscan_json(&self) -> Value {
        serde_json::to_value(self.pipeline.dbscan().config()).unwrap_or(Value::Null)
    }

    /// Partial update of clustering parameters with bounds validation;
    /// unknown fields are ignored, a legacy `eps` key is read as `eps_norm`.
    pub fn update_dbscan(&self, body: &Value) -> Result<Value, ApiError> {
        let _guard = self.patch_lock.lock();
        let object = body
            .as_object()
            .ok_or_else(|| ApiError::invalid_json("dbscan config must be an object"))?;

        let mut next = self.pipeline.dbscan().config();
        let number = |key: &str| -> Option<f64> { object.get(key).and_then(Value::as_f64) };

        if let Some(value) = number("eps_norm").or_else(|| number("eps")) {
            next.eps_norm = value as f32;
        }
        if let Some(value) = object.get("minPts").and_then(Value::as_u64) {
            next.min_pts = value as u32;
        }
        if let Some(value) = number("k_scale") {
            next.k_scale = value as f32;
        }
        if let Some(value) = number("h_min") {
            next.h_min = value as f32;
        }
        if let Some(value) = number("h_max") {
            next.h_max = value as f32;
        }
        if let Some(value) = object.get("R_max").and_then(Value::as_u64) {
            next.r_max = value as u32;
        }
        if let Some(value) = object.get("M_max").and_then(Value::as_u64) {
            next.m_max = value as u32;
        }

        let problems = validate_dbscan(&next);
        if let Some(first) = problems.first() {
            return Err(ApiError::invalid_value(first.to_string()));
        }

        self.pipeline.dbscan().set_config(next.clone());
        self.config.write().dbscan = next;
        self.hub.broadcast(&json!({
            "type": "dbscan.updated",
            "config": self.dbscan_json(),
        }));
        Ok(self.dbscan_json())
    }

    // --- sinks -------------------------------------------------------------

    pub fn sinks_json(&self) -> Value {
        serde_json::to_value(&self.config.read().sinks).unwrap_or(Value::Null)
    }

    pub fn add_sink(&self, body: &Value) -> Result<Value, ApiError> {
        let _guard = self.patch_lock.lock();
        let sink = parse_sink(body)?;
        {
            let mut config = self.config.write();
            config.sinks.push(sink);
        }
        self.apply_sinks_runtime();
        Ok(self.sinks_json())
    }

    pub fn update_sink(&self, index: usize, patch: &Value) -> Result<Value, ApiError> {
        let _guard = self.patch_lock.lock();
        let object = patch
            .as_object()
            .ok_or_else(|| ApiError::invalid_json("sink patch must be an object"))?;
        {
            let mut config = self.config.write();
            let sink = config
                .sinks
                .get_mut(index)
                .ok_or_else(|| ApiError::not_found("Sink not found"))?;

            if object.contains_key("type") {
                return Err(ApiError::invalid_field(
                    "Sink type cannot be changed; delete and re-add",
                ));
            }
            if let Some(topic) = object.get("topic").and_then(Value::as_str) {
                sink.topic = topic.to_string();
            }
            if let Some(rate) = object.get("rate_limit").and_then(Value::as_u64) {
                sink.rate_limit = rate as u32;
            }
            match &mut sink.kind {
                SinkKind::Nng { url, encoding } => {
                    if let Some(value) = object.get("url").and_then(Value::as_str) {
                        if !value.starts_with("tcp://") {
                            return Err(ApiError::invalid_value(
                                "NNG sink URL must start with 'tcp://'",
                            ));
                        }
                        *url = value.to_string();
                    }
                    if let Some(value) = object.get("encoding").and_then(Value::as_str) {
                        *encoding = NngEncoding::parse(value).ok_or_else(|| {
                            ApiError::invalid_value(
                                "NNG encoding must be 'msgpack' or 'json'",
                            )
                        })?;
                    }
                }
                SinkKind::Osc {
                    url,
                    in_bundle,
                    bundle_fragment_size,
                } => {
                    if let Some(value) = object.get("url").and_then(Value::as_str) {
                        if !value.starts_with("osc://") {
                            return Err(ApiError::invalid_value(
                                "OSC sink URL must start with 'osc://'",
                            ));
                        }
                        *url = value.to_string();
                    }
                    if let Some(value) = object.get("in_bundle").and_then(Value::as_bool) {
                        *in_bundle = value;
                    }
                    if let Some(value) =
                        object.get("bundle_fragment_size").and_then(Value::as_u64)
                    {
                        *bundle_fragment_size = value as u32;
                    }
                }
            }
        }
        self.apply_sinks_runtime();
        Ok(self.sinks_json())
    }

    pub fn delete_sink(&self, index: usize) -> Result<Value, ApiError> {
        let _guard = self.patch_lock.lock();
        {
            let mut config = self.config.write();
            if index >= config.sinks.len() {
                return Err(ApiError::not_found("Sink not found"));
            }
            config.sinks.remove(index);
        }
        self.apply_sinks_runtime();
        Ok(self.sinks_json())
    }

    fn apply_sinks_runtime(&self) {
        let sinks = self.config.read().sinks.clone();
        if !self.pipeline.publishers().configure(&sinks) {
            warn!("one or more sink publishers failed to start");
        }
    }

    // --- world mask --------------------------------------------------------

    /// Patch shape `{world_mask: {includes: [...], excludes: [...]}}`
    /// (`include`/`exclude` accepted as aliases). Absent keys keep their
    /// current polygon list.
    pub fn update_world_mask(&self, patch: &Value) -> Result<Value, ApiError> {
        let _guard = self.patch_lock.lock();
        let mask_patch = patch
            .get("world_mask")
            .and_then(Value::as_object)
            .ok_or_else(|| ApiError::invalid_field("missing 'world_mask' object"))?;

        let mut mask = self.config.read().world_mask.clone();
        if let Some(value) = mask_patch.get("includes").or_else(|| mask_patch.get("include")) {
            mask.include = parse_polygons(value)?;
        }
        if let Some(value) = mask_patch.get("excludes").or_else(|| mask_patch.get("exclude")) {
            mask.exclude = parse_polygons(value)?;
        }

        self.pipeline.set_world_mask(mask.clone());
        let as_json = serde_json::to_value(&mask).unwrap_or(Value::Null);
        self.config.write().world_mask = mask;
        self.hub.broadcast(&json!({
            "type": "world.updated",
            "world_mask": as_json,
        }));
        Ok(as_json)
    }

    // --- stored configs ----------------------------------------------------

    pub fn configs_list(&self) -> Result<Value, ApiError> {
        let names = list_configs(&self.config_dir).map_err(config_error)?;
        Ok(json!({"configs": names}))
    }

    pub fn configs_save(&self, name: &str) -> Result<Value, ApiError> {
        if !is_valid_config_name(name) {
            return Err(ApiError::invalid_value("Invalid config name"));
        }
        let config = self.config.read().clone();
        save_named_config(&self.config_dir, name, &config).map_err(config_error)?;
        Ok(json!({"saved": name}))
    }

    pub fn configs_load(&self, name: &str) -> Result<Value, ApiError> {
        if !is_valid_config_name(name) {
            return Err(ApiError::invalid_value("Invalid config name"));
        }
        let loaded = load_named_config(&self.config_dir, name).map_err(config_error)?;
        self.apply_full_config(loaded);
        Ok(json!({"loaded": name}))
    }

    pub fn configs_import(&self, yaml: &str) -> Result<Value, ApiError> {
        let parsed = scanhub_config::from_yaml_str(yaml).map_err(config_error)?;
        self.apply_full_config(parsed);
        Ok(json!({"imported": true}))
    }

    pub fn configs_export(&self) -> Result<String, ApiError> {
        let config = self.config.read().clone();
        scanhub_config::to_yaml_string(&config).map_err(config_error)
    }

    /// Swap in a complete configuration and rebuild all runtime state.
    /// Already-applied pieces are not rolled back if a later piece fails;
    /// the system stays in a well-defined (possibly degraded) state.
    fn apply_full_config(&self, new_config: AppConfig) {
        let _guard = self.patch_lock.lock();
        *self.config.write() = new_config;

        let snapshot = self.config.read().clone();
        self.slots.configure(&snapshot.sensors);
        self.config.write().sensors = self.slots.sensor_configs();
        self.sync_noise_models();
        self.pipeline
            .filters()
            .set_prefilter_config(snapshot.prefilter.clone());
        self.pipeline
            .filters()
            .set_postfilter_config(snapshot.postfilter.clone());
        self.pipeline.dbscan().set_config(snapshot.dbscan.clone());
        self.pipeline.set_world_mask(snapshot.world_mask.clone());
        self.pipeline.publishers().configure(&snapshot.sinks);
        self.broadcast_snapshot();
        info!("full configuration applied");
    }
}

fn config_error(err: ConfigError) -> ApiError {
    match err {
        ConfigError::FileNotFound(message) => ApiError::not_found(message),
        ConfigError::InvalidName(name) => {
            ApiError::invalid_value(format!("Invalid config name: {}", name))
        }
        ConfigError::Parse(err) => ApiError::invalid_json(err.to_string()),
        ConfigError::Validation(message) => ApiError::invalid_value(message),
        ConfigError::Io(err) => ApiError::internal(err.to_string()),
    }
}

fn parse_polygons(value: &Value) -> Result<Vec<Polygon>, ApiError> {
    let polygons: Vec<Polygon> = serde_json::from_value(value.clone())
        .map_err(|err| ApiError::invalid_value(format!("invalid polygon list: {}", err)))?;
    for polygon in &polygons {
        if polygon.points.len() < 3 {
            return Err(ApiError::invalid_value(
                "polygons need at least 3 vertices",
            ));
        }
    }
    Ok(polygons)
}

fn parse_sink(body: &Value) -> Result<SinkConfig, ApiError> {
    let object = body
        .as_object()
        .ok_or_else(|| ApiError::invalid_json("Invalid JSON in request body"))?;
    let sink_type = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::invalid_field("Missing required field: type"))?;
    let url = object
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::invalid_field("Missing required field: url"))?
        .to_string();
    let topic = object
        .get("topic")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let rate_limit = object
        .get("rate_limit")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;

    let kind = match sink_type {
        "nng" => {
            if !url.starts_with("tcp://") {
                return Err(ApiError::invalid_value(
                    "NNG sink URL must start with 'tcp://'",
                ));
            }
            let encoding = match object.get("encoding").and_then(Value::as_str) {
                Some(value) => NngEncoding::parse(value).ok_or_else(|| {
                    ApiError::invalid_value("NNG encoding must be 'msgpack' or 'json'")
                })?,
                None => NngEncoding::Msgpack,
            };
            SinkKind::Nng { url, encoding }
        }
        "osc" => {
            if !url.starts_with("osc://") {
                return Err(ApiError::invalid_value(
                    "OSC sink URL must start with 'osc://'",
                ));
            }
            SinkKind::Osc {
                url,
                in_bundle: object
                    .get("in_bundle")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                bundle_fragment_size: object
                    .get("bundle_fragment_size")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u32,
            }
        }
        _ => {
            return Err(ApiError::invalid_value("Sink type must be 'nng' or 'osc'"));
        }
    };

    Ok(SinkConfig {
        topic,
        rate_limit,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanhub_core::{DbscanHandle, FilterManager};
    use scanhub_io::PublisherManager;
    use scanhub_sensors::DriverRegistry;
    use tempfile::TempDir;

    fn adapter() -> (Arc<ControlAdapter>, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::default();
        let slots = Arc::new(SlotManager::new(DriverRegistry::with_builtin()));
        let pipeline = Arc::new(DetectionPipeline::new(
            Arc::new(FilterManager::new(
                config.prefilter.clone(),
                config.postfilter.clone(),
            )),
            Arc::new(DbscanHandle::new(config.dbscan.clone())),
            config.world_mask.clone(),
            Arc::new(PublisherManager::new()),
        ));
        let adapter = Arc::new(ControlAdapter::new(
            config,
            slots,
            pipeline,
            WsHub::new(),
            dir.path().to_path_buf(),
        ));
        adapter.apply_initial_runtime();
        (adapter, dir)
    }

    fn sim_body(name: &str) -> Value {
        json!({"type": "sim", "name": name, "enabled": false})
    }

    #[test]
    fn add_sensor_generates_unique_ids() {
        let (adapter, _dir) = adapter();
        let first = adapter.add_sensor(&sim_body("lidar")).unwrap();
        assert_eq!(first["id"], "lidar");

        let second = adapter.add_sensor(&sim_body("lidar")).unwrap();
        assert_eq!(second["id"], "lidar 1");

        let third = adapter.add_sensor(&sim_body("lidar")).unwrap();
        assert_eq!(third["id"], "lidar 2");
    }

    #[test]
    fn add_sensor_rejects_unknown_type() {
        let (adapter, _dir) = adapter();
        let err = adapter
            .add_sensor(&json!({"type": "velodyne"}))
            .unwrap_err();
        assert_eq!(err.kind, "invalid_value");
    }

    #[test]
    fn delete_sensor_reconfigures_slots() {
        let (adapter, _dir) = adapter();
        adapter.add_sensor(&sim_body("a")).unwrap();
        adapter.add_sensor(&sim_body("b")).unwrap();
        adapter.delete_sensor("a").unwrap();

        let sensors = adapter.sensors_json();
        let array = sensors.as_array().unwrap();
        assert_eq!(array.len(), 1);
        assert_eq!(array[0]["id"], "b");
        assert_eq!(array[0]["slot"], 0);

        assert!(adapter.delete_sensor("a").is_err());
    }

    #[test]
    fn dbscan_update_validates_bounds() {
        let (adapter, _dir) = adapter();
        let err = adapter
            .update_dbscan(&json!({"eps_norm": 50.0}))
            .unwrap_err();
        assert_eq!(err.kind, "invalid_value");
        assert!(err.message.contains("eps_norm"));

        let updated = adapter
            .update_dbscan(&json!({"eps_norm": 1.5, "minPts": 4}))
            .unwrap();
        assert_eq!(updated["eps_norm"], 1.5);
        assert_eq!(updated["minPts"], 4);
    }

    #[test]
    fn dbscan_update_accepts_legacy_eps() {
        let (adapter, _dir) = adapter();
        let updated = adapter.update_dbscan(&json!({"eps": 2.0})).unwrap();
        assert_eq!(updated["eps_norm"], 2.0);
    }

    #[test]
    fn sink_lifecycle_with_validation() {
        let (adapter, _dir) = adapter();
        let err = adapter
            .add_sink(&json!({"type": "nng", "url": "ipc://x"}))
            .unwrap_err();
        assert!(err.message.contains("tcp://"));

        adapter
            .add_sink(&json!({
                "type": "osc",
                "url": "osc://127.0.0.1:17100/hub",
                "in_bundle": true,
            }))
            .unwrap();
        let sinks = adapter.sinks_json();
        assert_eq!(sinks.as_array().unwrap().len(), 1);

        let updated = adapter
            .update_sink(0, &json!({"rate_limit": 15, "bundle_fragment_size": 900}))
            .unwrap();
        assert_eq!(updated[0]["rate_limit"], 15);
        assert_eq!(updated[0]["bundle_fragment_size"], 900);

        assert!(adapter.update_sink(5, &json!({})).is_err());

        adapter.delete_sink(0).unwrap();
        assert!(adapter.sinks_json().as_array().unwrap().is_empty());
    }

    #[test]
    fn world_mask_patch_replaces_named_lists() {
        let (adapter, _dir) = adapter();
        let result = adapter
            .update_world_mask(&json!({
                "world_mask": {
                    "includes": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]],
                }
            }))
            .unwrap();
        assert_eq!(result["include"].as_array().unwrap().len(), 1);

        let err = adapter
            .update_world_mask(&json!({
                "world_mask": {"excludes": [[[0.0, 0.0], [1.0, 0.0]]]}
            }))
            .unwrap_err();
        assert!(err.message.contains("3 vertices"));
    }

    #[test]
    fn config_save_load_round_trip() {
        let (adapter, _dir) = adapter();
        adapter.update_dbscan(&json!({"eps_norm": 3.25})).unwrap();
        adapter.configs_save("site").unwrap();

        adapter.update_dbscan(&json!({"eps_norm": 0.5})).unwrap();
        adapter.configs_load("site").unwrap();
        assert_eq!(adapter.dbscan_json()["eps_norm"], 3.25);

        let listed = adapter.configs_list().unwrap();
        assert_eq!(listed["configs"][0], "site");
    }

    #[test]
    fn config_name_validation() {
        let (adapter, _dir) = adapter();
        assert!(adapter.configs_save("../evil").is_err());
        assert!(adapter.configs_load("no such").is_err());
    }

    #[test]
    fn export_import_round_trip() {
        let (source, _dir) = adapter();
        source
            .add_sink(&json!({
                "type": "nng",
                "url": "tcp://0.0.0.0:17200",
                "encoding": "json",
                "topic": "clusters",
            }))
            .unwrap();
        let yaml = source.configs_export().unwrap();

        let (fresh, _dir2) = adapter();
        fresh.configs_import(&yaml).unwrap();
        assert_eq!(fresh.sinks_json(), source.sinks_json());
    }

    #[test]
    fn filter_put_round_trips_and_persists() {
        let (adapter, _dir) = adapter();
        let mut config = PrefilterConfig::default();
        config.neighborhood.k = 9;
        adapter
            .put_prefilter(&serde_json::to_value(&config).unwrap())
            .unwrap();
        assert_eq!(adapter.filters_json()["prefilter"]["neighborhood"]["k"], 9);
        assert!(adapter.configs_export().unwrap().contains("k: 9"));
    }
}
