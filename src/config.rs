/*
 * This file is part of argonfan.
 *
 * Copyright (C) 2025 argonfan contributors
 *
 * argonfan is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * argonfan is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with argonfan. If not, see <https://www.gnu.org/licenses/>.
 */

//! Add-on options
//!
//! The supervisor hands us a flat JSON object with human-readable keys.
//! Loading never fails: every missing or malformed value is replaced by its
//! default and reported as a warning, and an inverted temperature range is
//! swapped rather than rejected.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use af_error::ArgonfanError;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::constants::{defaults, paths};
use crate::temperature::TemperatureUnit;

pub const KEY_MIN_TEMP: &str = "Minimum Temperature";
pub const KEY_MAX_TEMP: &str = "Maximum Temperature";
pub const KEY_CREATE_ENTITY: &str = "Create Entity";
pub const KEY_UNIT: &str = "Temperature Unit";
pub const KEY_BUS_OVERRIDE: &str = "I2C Bus Override";
pub const KEY_BACKEND: &str = "Backend";
pub const KEY_LOG_TEMPERATURE: &str = "Log current temperature every 30 seconds";

/// Which hardware backend to use
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum BackendMode {
    /// Probe I2C first, fall back to PWM
    #[default]
    Auto,
    ForceI2c,
    ForcePwm,
}

impl BackendMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "i2c" => Some(Self::ForceI2c),
            "pwm" => Some(Self::ForcePwm),
            _ => None,
        }
    }
}

/// Resolved, immutable controller configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    /// Fan off at or below this temperature (configured unit)
    pub min_temp: f64,
    /// Full speed at or above this temperature (configured unit)
    pub max_temp: f64,
    pub unit: TemperatureUnit,
    /// Publish the duty cycle as a state entity
    pub reporting_enabled: bool,
    pub backend_mode: BackendMode,
    /// Bus number probed before the default list
    pub bus_override: Option<u8>,
    /// Log temperature and duty every cycle at info level
    pub log_temperature: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            min_temp: defaults::MIN_TEMP,
            max_temp: defaults::MAX_TEMP,
            unit: TemperatureUnit::Fahrenheit,
            reporting_enabled: false,
            backend_mode: BackendMode::Auto,
            bus_override: None,
            log_temperature: false,
        }
    }
}

/// Options document as written by the supervisor, before validation
#[derive(Debug, Default, Deserialize)]
pub struct RawOptions {
    #[serde(rename = "Minimum Temperature")]
    pub min_temp: Option<Value>,
    #[serde(rename = "Maximum Temperature")]
    pub max_temp: Option<Value>,
    #[serde(rename = "Create Entity")]
    pub create_entity: Option<Value>,
    #[serde(rename = "Temperature Unit")]
    pub unit: Option<Value>,
    #[serde(rename = "I2C Bus Override")]
    pub bus_override: Option<Value>,
    #[serde(rename = "Backend")]
    pub backend: Option<Value>,
    #[serde(rename = "Log current temperature every 30 seconds")]
    pub log_temperature: Option<Value>,
}

fn number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn boolean(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" => Some(true),
            "false" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn bus_number(v: &Value) -> Option<u8> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u8>().ok(),
        _ => None,
    }
}

/// Resolve one optional field, recording an issue when present but invalid
fn resolve<T>(
    raw: Option<&Value>,
    field: &str,
    parse: impl Fn(&Value) -> Option<T>,
    default: T,
    issues: &mut Vec<ArgonfanError>,
) -> T {
    match raw {
        None | Some(Value::Null) => default,
        Some(v) => parse(v).unwrap_or_else(|| {
            issues.push(ArgonfanError::config(field, format!("unusable value {}", v)));
            default
        }),
    }
}

impl Configuration {
    /// Build a configuration from raw options.
    ///
    /// Returns the configuration together with every value that had to be
    /// replaced by a default.
    pub fn from_options(raw: &RawOptions) -> (Configuration, Vec<ArgonfanError>) {
        let mut issues = Vec::new();
        let d = Configuration::default();

        let mut min_temp = resolve(raw.min_temp.as_ref(), KEY_MIN_TEMP, number, d.min_temp, &mut issues);
        let mut max_temp = resolve(raw.max_temp.as_ref(), KEY_MAX_TEMP, number, d.max_temp, &mut issues);
        if min_temp > max_temp {
            issues.push(ArgonfanError::config(
                KEY_MIN_TEMP,
                format!("minimum {} above maximum {}, swapped", min_temp, max_temp),
            ));
            std::mem::swap(&mut min_temp, &mut max_temp);
        }

        let unit = resolve(
            raw.unit.as_ref(),
            KEY_UNIT,
            |v| v.as_str().and_then(TemperatureUnit::parse),
            d.unit,
            &mut issues,
        );
        let backend_mode = resolve(
            raw.backend.as_ref(),
            KEY_BACKEND,
            |v| v.as_str().and_then(BackendMode::parse),
            d.backend_mode,
            &mut issues,
        );
        let reporting_enabled = resolve(raw.create_entity.as_ref(), KEY_CREATE_ENTITY, boolean, d.reporting_enabled, &mut issues);
        let log_temperature = resolve(raw.log_temperature.as_ref(), KEY_LOG_TEMPERATURE, boolean, d.log_temperature, &mut issues);
        let bus_override = resolve(raw.bus_override.as_ref(), KEY_BUS_OVERRIDE, |v| bus_number(v).map(Some), None, &mut issues);

        let cfg = Configuration {
            min_temp,
            max_temp,
            unit,
            reporting_enabled,
            backend_mode,
            bus_override,
            log_temperature,
        };
        (cfg, issues)
    }
}

/// Location of the options document
pub fn options_path() -> PathBuf {
    match env::var(paths::OPTIONS_ENV) {
        Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
        _ => PathBuf::from(paths::OPTIONS_FILE),
    }
}

/// Parse an options document. Unparseable input yields the defaults.
pub fn parse_configuration(json: &str) -> (Configuration, Vec<ArgonfanError>) {
    match serde_json::from_str::<RawOptions>(json) {
        Ok(raw) => Configuration::from_options(&raw),
        Err(e) => (Configuration::default(), vec![ArgonfanError::from(e)]),
    }
}

/// Load the configuration, logging and repairing every problem found
pub fn load_configuration(path: &Path) -> Configuration {
    let (cfg, issues) = match fs::read_to_string(path) {
        Ok(data) => parse_configuration(&data),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Options file unreadable, using defaults");
            (Configuration::default(), Vec::new())
        }
    };

    for issue in &issues {
        warn!("CONFIG: {} - default applied", issue);
    }

    debug!(?cfg, "Resolved configuration");
    info!(
        min = cfg.min_temp,
        max = cfg.max_temp,
        unit = cfg.unit.letter(),
        backend = ?cfg.backend_mode,
        bus_override = ?cfg.bus_override,
        reporting = cfg.reporting_enabled,
        "Configuration loaded"
    );
    cfg
}
