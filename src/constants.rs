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

//! Constants for argonfan
//!
//! Every path, bus address, register and threshold lives here.
//! Other modules refer to these by name.

use std::time::Duration;

/// Filesystem locations
pub mod paths {
    /// Options document written by the add-on supervisor
    pub const OPTIONS_FILE: &str = "/data/options.json";

    /// Environment variable overriding [`OPTIONS_FILE`]
    pub const OPTIONS_ENV: &str = "ARGONFAN_OPTIONS";

    /// CPU temperature in millidegrees Celsius
    pub const CPU_TEMP: &str = "/sys/class/thermal/thermal_zone0/temp";

    /// Character devices for I2C adapters live here as `i2c-N`
    pub const DEV_DIR: &str = "/dev";

    /// Roots searched (in order) for a `hwmonN` directory exposing a PWM fan
    pub const PWM_SEARCH_ROOTS: &[&str] = &[
        "/sys/devices/platform/cooling_fan/hwmon",
        "/sys/devices/platform/pwm-fan/hwmon",
        "/sys/class/hwmon",
    ];
}

/// I2C fan controller protocol
pub mod i2c {
    /// Primary controller address
    pub const PRIMARY_ADDRESS: u16 = 0x1A;

    /// Secondary controller address (newer board revisions)
    pub const SECONDARY_ADDRESS: u16 = 0x1B;

    /// Addresses tried in order on every write
    pub const FAN_ADDRESSES: [u16; 2] = [PRIMARY_ADDRESS, SECONDARY_ADDRESS];

    /// Duty cycle control register for the two-byte write
    pub const DUTY_REGISTER: u8 = 0x80;

    /// First address covered by a bus scan (same window as i2cdetect)
    pub const SCAN_FIRST: u16 = 0x03;

    /// Last address covered by a bus scan
    pub const SCAN_LAST: u16 = 0x77;

    /// A scan with this many or more responders is bus noise, not a device
    pub const NOISE_REJECTION_THRESHOLD: usize = 10;

    /// Bus numbers tried after the override, most likely first
    pub const DEFAULT_BUS_PRIORITY: &[u8] = &[1, 0, 13, 14, 20, 21, 22];

    /// `I2C_SLAVE` ioctl request from linux/i2c-dev.h
    pub const IOCTL_SLAVE: u64 = 0x0703;
}

/// PWM sysfs interface
pub mod pwm {
    /// Duty file inside a hwmon directory
    pub const DUTY_FILE: &str = "pwm1";

    /// Mode file inside a hwmon directory
    pub const ENABLE_FILE: &str = "pwm1_enable";

    /// Mode value for manual (software) control
    pub const ENABLE_MANUAL: u8 = 1;

    /// Full-scale PWM count
    pub const MAX_VALUE: u32 = 255;

    /// Scale a duty percentage onto PWM counts, truncating
    pub fn from_percent(percent: u8) -> u8 {
        (u32::from(percent.min(100)) * MAX_VALUE / 100) as u8
    }
}

/// Actuation policy
pub mod actuator {
    /// Consecutive failed I2C cycles before switching to PWM for good
    pub const I2C_FAILURE_THRESHOLD: u32 = 5;

    /// Duty applied when the daemon stops
    pub const SAFE_MODE_DUTY: u8 = 100;
}

/// Configuration defaults
pub mod defaults {
    pub const MIN_TEMP: f64 = 55.0;
    pub const MAX_TEMP: f64 = 85.0;
}

/// Loop and reporting timing
pub mod timing {
    use super::Duration;

    /// Fixed delay between control cycles
    pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

    /// Upper bound on one detached state report
    pub const REPORT_TIMEOUT: Duration = Duration::from_secs(5);
}

/// State reporting endpoint
pub mod reporting {
    /// Supervisor state API for the fan speed sensor
    pub const ENDPOINT: &str = "http://supervisor/core/api/states/sensor.argon_one_addon_fan_speed";

    /// Environment variable holding the bearer token
    pub const TOKEN_ENV: &str = "SUPERVISOR_TOKEN";

    pub const FRIENDLY_NAME: &str = "Argon Fan Speed";

    pub const ICON: &str = "mdi:fan";

    pub const UNIT_OF_MEASUREMENT: &str = "%";
}
