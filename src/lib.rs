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

//! argonfan - temperature-driven fan control for Argon ONE style cases
//!
//! Reads the SoC temperature, maps it linearly onto a duty cycle and drives
//! the case fan either through the I2C microcontroller or a native PWM
//! output, falling back from I2C to PWM when the bus keeps failing.

pub mod actuator;
pub mod config;
pub mod constants;
pub mod control;
pub mod curve;
pub mod i2c;
pub mod pwm;
pub mod reporter;
pub mod selector;
pub mod temperature;

pub use af_error::{ArgonfanError, Result};

#[cfg(test)]
pub mod test_utils;
