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

//! CPU temperature source
//!
//! The kernel exposes the SoC temperature as an integer in millidegrees
//! Celsius. Samples are rounded to one decimal in the configured unit.

use std::fs;
use std::path::{Path, PathBuf};
use std::fmt;

use af_error::{ArgonfanError, Result};

use crate::constants::paths;

const MILLIDEGREE_DIVISOR: f64 = 1000.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Parse the option value (`C` or `F`, case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "C" | "c" => Some(Self::Celsius),
            "F" | "f" => Some(Self::Fahrenheit),
            _ => None,
        }
    }

    /// Single letter used in report attributes and log lines
    pub fn letter(self) -> &'static str {
        match self {
            Self::Celsius => "C",
            Self::Fahrenheit => "F",
        }
    }

    /// Convert a Celsius reading into this unit (unrounded)
    pub fn from_celsius(self, celsius: f64) -> f64 {
        match self {
            Self::Celsius => celsius,
            Self::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    /// Convert a value in this unit back to Celsius (unrounded)
    pub fn to_celsius(self, value: f64) -> f64 {
        match self {
            Self::Celsius => value,
            Self::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "°{}", self.letter())
    }
}

/// Round to one decimal place
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TemperatureSample {
    pub value: f64,
    pub unit: TemperatureUnit,
}

impl TemperatureSample {
    /// Build a sample from a Celsius reading, converted and rounded
    pub fn from_celsius(celsius: f64, unit: TemperatureUnit) -> Self {
        Self {
            value: round_tenth(unit.from_celsius(celsius)),
            unit,
        }
    }
}

impl fmt::Display for TemperatureSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}{}", self.value, self.unit)
    }
}

/// Anything that can produce one temperature sample per control cycle
pub trait TemperatureSource: Send {
    fn read(&mut self) -> Result<TemperatureSample>;
}

/// Sysfs thermal zone reader
#[derive(Debug, Clone)]
pub struct SysfsTemperature {
    path: PathBuf,
    unit: TemperatureUnit,
}

impl SysfsTemperature {
    /// Reader for the SoC thermal zone
    pub fn cpu(unit: TemperatureUnit) -> Self {
        Self::new(paths::CPU_TEMP, unit)
    }

    pub fn new(path: impl Into<PathBuf>, unit: TemperatureUnit) -> Self {
        Self { path: path.into(), unit }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemperatureSource for SysfsTemperature {
    fn read(&mut self) -> Result<TemperatureSample> {
        let content = fs::read_to_string(&self.path)
            .map_err(|e| ArgonfanError::sensor(&self.path, format!("Failed to read: {}", e)))?;

        let millidegrees = content
            .trim()
            .parse::<i64>()
            .map_err(|e| ArgonfanError::sensor(&self.path, format!("Failed to parse '{}': {}", content.trim(), e)))?;

        let celsius = millidegrees as f64 / MILLIDEGREE_DIVISOR;
        Ok(TemperatureSample::from_celsius(celsius, self.unit))
    }
}
