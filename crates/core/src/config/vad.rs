// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Voice-activity-detection threshold configuration.

use crate::json::{self, JsonValue};

pub const DEFAULT_ZERO_CROSSINGS_RATE_THRESHOLD_HERTZ: f64 = 50_000.0;
pub const DEFAULT_POWERLEVEL_DENSITY_THRESHOLD_DB: f64 = -40.0;

const KEY_VAD: &str = "vad";
const KEY_ZERO_CROSSINGS_RATE_HERTZ: &str = "zero_crossings_rate_hertz";
const KEY_POWERLEVEL_DENSITY_DB: &str = "powerlevel_density_db";

/// VAD thresholds. Zero means "unset" - [`VadConfig::to_json`] substitutes
/// the defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VadConfig {
    pub zero_crossings_rate_threshold_hertz: f64,
    pub powerlevel_density_threshold_db: f64,
}

impl VadConfig {
    /// Reads the thresholds from the `"vad"` section of `json`.
    ///
    /// Missing section or non-number members leave the corresponding field
    /// at zero; wrong types are logged.
    pub fn from_json(json: &JsonValue) -> Self {
        let mut cfg = Self::default();

        let Some(section) = json::get(json, "/vad") else {
            return cfg;
        };

        match json::get(section, "/zero_crossings_rate_hertz") {
            Some(JsonValue::Number(n)) => cfg.zero_crossings_rate_threshold_hertz = *n,
            _ => {
                tracing::error!("/{KEY_ZERO_CROSSINGS_RATE_HERTZ} in config is not a number");
            },
        }

        match json::get(section, "/powerlevel_density_db") {
            Some(JsonValue::Number(n)) => cfg.powerlevel_density_threshold_db = *n,
            _ => tracing::error!("/{KEY_POWERLEVEL_DENSITY_DB} in config is not a number"),
        }

        cfg
    }

    /// Writes the thresholds (zero fields replaced by the defaults) under
    /// the `"vad"` key of `target`, or into a fresh object.
    pub fn to_json(self, target: Option<JsonValue>) -> JsonValue {
        let mut zcr = self.zero_crossings_rate_threshold_hertz;
        let mut pwr = self.powerlevel_density_threshold_db;

        if zcr == 0.0 {
            zcr = DEFAULT_ZERO_CROSSINGS_RATE_THRESHOLD_HERTZ;
        }
        if pwr == 0.0 {
            pwr = DEFAULT_POWERLEVEL_DENSITY_THRESHOLD_DB;
        }

        let mut vad = JsonValue::object();
        let _ = vad.object_set(KEY_ZERO_CROSSINGS_RATE_HERTZ, JsonValue::number(zcr));
        let _ = vad.object_set(KEY_POWERLEVEL_DENSITY_DB, JsonValue::number(pwr));

        let mut out = target.unwrap_or_else(JsonValue::object);
        if out.object_set(KEY_VAD, vad).is_err() {
            tracing::error!("VAD config target is not an object");
        }
        out
    }
}
