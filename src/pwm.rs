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

//! Native PWM fan control through sysfs
//!
//! # PWM Values
//!
//! The hwmon `pwm1` file takes counts from 0 to 255. Duty percentages are
//! scaled with integer truncation, so 50 % is written as 127.
//!
//! Writing `1` to `pwm1_enable` first puts the channel into manual mode;
//! without it the kernel's own thermal governor keeps overriding us.

use std::fs;
use std::path::{Path, PathBuf};

use af_error::{ArgonfanError, Result};
use tracing::{debug, trace};

use crate::constants::pwm;
use crate::curve::DutyCycle;

/// A hwmon directory exposing a `pwm1` duty file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PwmFan {
    dir: PathBuf,
}

impl PwmFan {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn duty_path(&self) -> PathBuf {
        self.dir.join(pwm::DUTY_FILE)
    }

    pub fn enable_path(&self) -> PathBuf {
        self.dir.join(pwm::ENABLE_FILE)
    }

    /// Enable manual mode and write the scaled duty. Returns the PWM count written.
    pub fn write_duty(&self, duty: DutyCycle) -> Result<u8> {
        let value = pwm::from_percent(duty.percent());

        let enable_path = self.enable_path();
        if enable_path.exists() {
            fs::write(&enable_path, pwm::ENABLE_MANUAL.to_string()).map_err(|e| {
                ArgonfanError::write(
                    enable_path.display().to_string(),
                    format!("Failed to enable manual PWM control: {}", e),
                )
            })?;
        }

        let duty_path = self.duty_path();
        fs::write(&duty_path, value.to_string()).map_err(|e| {
            ArgonfanError::write(
                duty_path.display().to_string(),
                format!("Failed to write PWM value {}: {}", value, e),
            )
        })?;

        trace!(path = %duty_path.display(), value, "PWM written");
        Ok(value)
    }
}

fn hwmon_index(name: &str) -> Option<u32> {
    name.strip_prefix("hwmon")?.parse().ok()
}

/// First `hwmonN` (lowest N) directly under `root` that has a duty file
fn discover_in(root: &Path) -> Option<PwmFan> {
    let mut dirs: Vec<(u32, PathBuf)> = fs::read_dir(root)
        .ok()?
        .flatten()
        .filter_map(|e| {
            let idx = hwmon_index(&e.file_name().to_string_lossy())?;
            Some((idx, e.path()))
        })
        .collect();
    dirs.sort_by_key(|(idx, _)| *idx);

    dirs.into_iter()
        .map(|(_, dir)| dir)
        .find(|dir| dir.join(pwm::DUTY_FILE).is_file())
        .map(PwmFan::new)
}

/// Search the given roots in order and return the first PWM fan found
pub fn discover<P: AsRef<Path>>(roots: &[P]) -> Option<PwmFan> {
    for root in roots {
        let root = root.as_ref();
        if let Some(fan) = discover_in(root) {
            debug!(path = %fan.dir().display(), "PWM fan found");
            return Some(fan);
        }
        trace!(root = %root.display(), "No PWM fan under root");
    }
    None
}
