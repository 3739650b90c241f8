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

//! Backend selection
//!
//! Runs once at startup. In automatic mode each candidate bus gets a
//! read-probe scan and is accepted only if the fan controller answers AND
//! the bus is not answering almost everywhere: a dense grid of responders
//! is line noise, not a populated bus. PWM discovery always runs as well
//! so a failing I2C controller has somewhere to fall back to.

use std::fmt;
use std::path::PathBuf;

use af_error::{ArgonfanError, Result};
use tracing::{debug, info, warn};

use crate::config::{BackendMode, Configuration};
use crate::constants::{i2c as i2c_const, paths};
use crate::i2c::{self, I2cAdapter, I2cBus};
use crate::pwm::{self, PwmFan};

/// Which backend is driving the fan
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BackendKind {
    I2c,
    Pwm,
    Unselected,
}

/// Inputs to backend selection
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPolicy {
    pub mode: BackendMode,
    pub bus_override: Option<u8>,
    pub default_buses: Vec<u8>,
    pub pwm_roots: Vec<PathBuf>,
}

impl SelectionPolicy {
    pub fn from_config(cfg: &Configuration) -> Self {
        Self {
            mode: cfg.backend_mode,
            bus_override: cfg.bus_override,
            default_buses: i2c_const::DEFAULT_BUS_PRIORITY.to_vec(),
            pwm_roots: paths::PWM_SEARCH_ROOTS.iter().map(PathBuf::from).collect(),
        }
    }

    /// Buses to try, in order: override, known defaults present on this
    /// host, then every other bus present.
    pub fn candidate_buses(&self, available: &[u8]) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::new();
        let mut push = |bus: u8| {
            if !out.contains(&bus) {
                out.push(bus);
            }
        };
        if let Some(bus) = self.bus_override {
            push(bus);
        }
        for &bus in &self.default_buses {
            if available.contains(&bus) {
                push(bus);
            }
        }
        for &bus in available {
            push(bus);
        }
        out
    }
}

/// Does a scan result look like a real fan controller?
pub fn accept_scan(responders: &[u16]) -> bool {
    let has_fan = responders.iter().any(|a| i2c_const::FAN_ADDRESSES.contains(a));
    has_fan && responders.len() < i2c_const::NOISE_REJECTION_THRESHOLD
}

/// Result of selection, handed over to the actuator
pub struct Selection {
    /// Active I2C bus, when I2C won
    pub i2c: Option<Box<dyn I2cBus>>,
    /// PWM fan; the active backend when `i2c` is `None`, otherwise the
    /// downgrade target
    pub pwm: Option<PwmFan>,
}

impl Selection {
    pub fn kind(&self) -> BackendKind {
        match (&self.i2c, &self.pwm) {
            (Some(_), _) => BackendKind::I2c,
            (None, Some(_)) => BackendKind::Pwm,
            (None, None) => BackendKind::Unselected,
        }
    }
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("i2c_bus", &self.i2c.as_ref().map(|b| b.bus_number()))
            .field("pwm", &self.pwm)
            .finish()
    }
}

/// Scan candidate buses and return the first one hosting the controller
fn probe_i2c(policy: &SelectionPolicy, adapter: &dyn I2cAdapter) -> Option<Box<dyn I2cBus>> {
    let candidates = policy.candidate_buses(&adapter.available_buses());
    debug!(?candidates, "Probing I2C buses");

    for bus_nr in candidates {
        let mut bus = match adapter.open(bus_nr) {
            Ok(b) => b,
            Err(e) => {
                debug!(bus = bus_nr, error = %e, "Skipping I2C bus");
                continue;
            }
        };
        let responders = i2c::scan(bus.as_mut());
        if accept_scan(&responders) {
            info!(bus = bus_nr, responders = responders.len(), "Fan controller found on I2C bus");
            return Some(bus);
        }
        if responders.len() >= i2c_const::NOISE_REJECTION_THRESHOLD {
            warn!(bus = bus_nr, responders = responders.len(), "Rejecting I2C bus as noise");
        } else {
            debug!(bus = bus_nr, ?responders, "No fan controller on I2C bus");
        }
    }
    None
}

/// First candidate bus that opens, without scanning
fn open_forced_i2c(policy: &SelectionPolicy, adapter: &dyn I2cAdapter) -> Option<Box<dyn I2cBus>> {
    policy
        .candidate_buses(&adapter.available_buses())
        .into_iter()
        .find_map(|bus_nr| match adapter.open(bus_nr) {
            Ok(bus) => Some(bus),
            Err(e) => {
                debug!(bus = bus_nr, error = %e, "Forced I2C bus unavailable");
                None
            }
        })
}

/// Decide which backend drives the fan
pub fn select_backend(policy: &SelectionPolicy, adapter: &dyn I2cAdapter) -> Result<Selection> {
    let selection = match policy.mode {
        BackendMode::ForcePwm => {
            let fan = pwm::discover(&policy.pwm_roots)
                .ok_or_else(|| ArgonfanError::NoHardwareFound("backend forced to PWM but no PWM fan found".into()))?;
            Selection { i2c: None, pwm: Some(fan) }
        }
        BackendMode::ForceI2c => {
            let bus = open_forced_i2c(policy, adapter)
                .ok_or_else(|| ArgonfanError::NoHardwareFound("backend forced to I2C but no I2C bus could be opened".into()))?;
            Selection { i2c: Some(bus), pwm: None }
        }
        BackendMode::Auto => {
            let bus = probe_i2c(policy, adapter);
            let fan = pwm::discover(&policy.pwm_roots);
            if bus.is_none() && fan.is_none() {
                return Err(ArgonfanError::NoHardwareFound(
                    "no I2C fan controller and no PWM fan".into(),
                ));
            }
            Selection { i2c: bus, pwm: fan }
        }
    };

    info!(mode = ?policy.mode, kind = ?selection.kind(), ?selection, "Backend selected");
    Ok(selection)
}
