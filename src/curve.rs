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

//! Temperature to duty cycle mapping
//!
//! A straight line between the configured minimum (fan off) and maximum
//! (full speed) temperatures. The fraction is truncated, not rounded, so
//! the result always lands on an integer duty step the controller accepts.

use std::fmt;

/// Fan duty cycle in percent, always within `0..=100`
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DutyCycle(u8);

impl DutyCycle {
    pub const OFF: DutyCycle = DutyCycle(0);
    pub const FULL: DutyCycle = DutyCycle(100);

    /// Clamp any integer into a valid duty cycle
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(0, 100) as u8)
    }

    pub fn percent(self) -> u8 {
        self.0
    }
}

impl From<DutyCycle> for u8 {
    fn from(d: DutyCycle) -> u8 {
        d.0
    }
}

impl fmt::Display for DutyCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Map a temperature onto a duty cycle between `min` and `max`
///
/// `min` and `max` are in the same unit as `temp`. A NaN temperature maps
/// to full speed; a zero-width range always maps to off.
pub fn map_duty(temp: f64, min: f64, max: f64) -> DutyCycle {
    if temp.is_nan() {
        return DutyCycle::FULL;
    }
    // Degenerate range: no slope to follow, leave the fan off
    if max == min {
        return DutyCycle::OFF;
    }
    if temp <= min {
        return DutyCycle::OFF;
    }
    if temp >= max {
        return DutyCycle::FULL;
    }
    let scaled = ((temp - min) * 100.0 / (max - min)).floor();
    DutyCycle::clamped(scaled as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_scenario() {
        assert_eq!(map_duty(70.0, 55.0, 85.0).percent(), 50);
    }

    #[test]
    fn boundaries() {
        assert_eq!(map_duty(55.0, 55.0, 85.0), DutyCycle::OFF);
        assert_eq!(map_duty(85.0, 55.0, 85.0), DutyCycle::FULL);
        assert_eq!(map_duty(90.0, 55.0, 85.0), DutyCycle::FULL);
        assert_eq!(map_duty(20.0, 55.0, 85.0), DutyCycle::OFF);
    }

    #[test]
    fn truncates_instead_of_rounding() {
        // 15.8 / 30 * 100 = 52.66..
        assert_eq!(map_duty(70.8, 55.0, 85.0).percent(), 52);
        // 29.9 / 30 * 100 = 99.66..
        assert_eq!(map_duty(84.9, 55.0, 85.0).percent(), 99);
        assert_eq!(map_duty(55.1, 55.0, 85.0).percent(), 0);
    }

    #[test]
    fn negative_temperatures() {
        assert_eq!(map_duty(-10.0, -20.0, 0.0).percent(), 50);
        assert_eq!(map_duty(-30.0, -20.0, 0.0), DutyCycle::OFF);
        assert_eq!(map_duty(-40.0, 55.0, 85.0), DutyCycle::OFF);
    }

    #[test]
    fn degenerate_range_never_divides() {
        for t in [-50.0, 0.0, 59.9, 60.0, 60.1, 1000.0] {
            assert_eq!(map_duty(t, 60.0, 60.0), DutyCycle::OFF, "t = {}", t);
        }
    }

    #[test]
    fn non_finite_input() {
        assert_eq!(map_duty(f64::NAN, 55.0, 85.0), DutyCycle::FULL);
        assert_eq!(map_duty(f64::INFINITY, 55.0, 85.0), DutyCycle::FULL);
        assert_eq!(map_duty(f64::NEG_INFINITY, 55.0, 85.0), DutyCycle::OFF);
    }

    #[test]
    fn monotonic_and_bounded_inside_range() {
        let (min, max) = (131.0, 185.0);
        let mut last = 0u8;
        let mut t = min - 5.0;
        while t <= max + 5.0 {
            let d = map_duty(t, min, max).percent();
            assert!(d <= 100);
            assert!(d >= last, "duty fell from {} to {} at {}", last, d, t);
            last = d;
            t += 0.1;
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn clamped_constructor() {
        assert_eq!(DutyCycle::clamped(-5), DutyCycle::OFF);
        assert_eq!(DutyCycle::clamped(250), DutyCycle::FULL);
        assert_eq!(DutyCycle::clamped(42).to_string(), "42%");
    }
}
