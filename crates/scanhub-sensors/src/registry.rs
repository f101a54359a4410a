// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Driver construction by configuration type tag.

use crate::sim::SimSensor;
use crate::traits::RangeSensor;
use std::collections::HashMap;
use tracing::warn;

type DriverCtor = fn() -> Box<dyn RangeSensor>;

/// Maps sensor type tags (`"sim"`, `"hokuyo_urg_eth"`, ...) to driver
/// constructors.
///
/// Vendor driver crates register their tags at startup; unknown tags
/// produce no driver and the owning slot stays silent.
pub struct DriverRegistry {
    constructors: HashMap<String, DriverCtor>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry pre-populated with the built-in synthetic driver.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("sim", || Box::new(SimSensor::new()));
        registry
    }

    pub fn register(&mut self, type_tag: &str, ctor: DriverCtor) {
        self.constructors.insert(type_tag.to_string(), ctor);
    }

    pub fn supports(&self, type_tag: &str) -> bool {
        self.constructors.contains_key(type_tag)
    }

    pub fn create(&self, type_tag: &str) -> Option<Box<dyn RangeSensor>> {
        match self.constructors.get(type_tag) {
            Some(ctor) => Some(ctor()),
            None => {
                warn!(type_tag, "no driver registered for sensor type");
                None
            }
        }
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
