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

//! Fan actuation with fallback
//!
//! The actuator owns the selected hardware and the backend state. Each
//! I2C write walks a fixed chain (register write to both addresses, then
//! the legacy single-byte write to both) and stops at the first success.
//! When a whole chain fails [`I2C_FAILURE_THRESHOLD`] cycles in a row and
//! a PWM fan was discovered at startup, the actuator switches to PWM for
//! the rest of the process lifetime. There is no way back to I2C.

use std::path::PathBuf;

use af_error::{ArgonfanError, Result};
use tracing::{debug, error, info, warn};

use crate::constants::actuator::I2C_FAILURE_THRESHOLD;
use crate::constants::i2c::{DUTY_REGISTER, PRIMARY_ADDRESS, SECONDARY_ADDRESS};
use crate::curve::DutyCycle;
use crate::i2c::I2cBus;
use crate::pwm::PwmFan;
use crate::selector::{BackendKind, Selection};

/// Actuator state machine position
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ActuatorState {
    I2cActive,
    PwmActive,
    /// Selection found nothing; every write fails
    Failed,
}

/// Backend bookkeeping, mutated only by [`Actuator::write`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendState {
    pub kind: BackendKind,
    pub i2c_bus: Option<u8>,
    pub pwm_path: Option<PathBuf>,
    pub consecutive_i2c_failures: u32,
}

/// How the duty byte was framed on the bus
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum I2cProtocol {
    /// `[0x80, duty]`
    Register,
    /// `[duty]`
    Legacy,
}

impl I2cProtocol {
    fn frame(self, duty: u8) -> Vec<u8> {
        match self {
            Self::Register => vec![DUTY_REGISTER, duty],
            Self::Legacy => vec![duty],
        }
    }
}

/// Attempt order for one I2C write
pub const I2C_ATTEMPTS: [(u16, I2cProtocol); 4] = [
    (PRIMARY_ADDRESS, I2cProtocol::Register),
    (SECONDARY_ADDRESS, I2cProtocol::Register),
    (PRIMARY_ADDRESS, I2cProtocol::Legacy),
    (SECONDARY_ADDRESS, I2cProtocol::Legacy),
];

/// What a successful write hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    I2c {
        bus: u8,
        address: u16,
        protocol: I2cProtocol,
    },
    Pwm {
        value: u8,
    },
}

pub struct Actuator {
    state: BackendState,
    i2c: Option<Box<dyn I2cBus>>,
    pwm: Option<PwmFan>,
}

impl Actuator {
    pub fn new(selection: Selection) -> Self {
        let state = BackendState {
            kind: selection.kind(),
            i2c_bus: selection.i2c.as_ref().map(|b| b.bus_number()),
            pwm_path: selection.pwm.as_ref().map(|p| p.duty_path()),
            consecutive_i2c_failures: 0,
        };
        Self {
            state,
            i2c: selection.i2c,
            pwm: selection.pwm,
        }
    }

    /// Actuator with no hardware
    pub fn unavailable() -> Self {
        Self::new(Selection { i2c: None, pwm: None })
    }

    pub fn state(&self) -> ActuatorState {
        match self.state.kind {
            BackendKind::I2c => ActuatorState::I2cActive,
            BackendKind::Pwm => ActuatorState::PwmActive,
            BackendKind::Unselected => ActuatorState::Failed,
        }
    }

    pub fn backend_state(&self) -> &BackendState {
        &self.state
    }

    /// Drive the fan to `duty` percent (clamped to 0..=100)
    pub fn write(&mut self, duty: i64) -> Result<WriteOutcome> {
        let duty = DutyCycle::clamped(duty);
        match self.state.kind {
            BackendKind::I2c => self.write_i2c(duty),
            BackendKind::Pwm => self.write_pwm(duty),
            BackendKind::Unselected => Err(ArgonfanError::write("fan", "no backend selected")),
        }
    }

    fn write_i2c(&mut self, duty: DutyCycle) -> Result<WriteOutcome> {
        let bus = match self.i2c.as_mut() {
            Some(b) => b,
            None => return Err(ArgonfanError::write("i2c", "bus not open")),
        };
        let bus_nr = bus.bus_number();

        let mut last_error = None;
        for (address, protocol) in I2C_ATTEMPTS {
            match bus.write(address, &protocol.frame(duty.percent())) {
                Ok(()) => {
                    if self.state.consecutive_i2c_failures > 0 {
                        info!(
                            bus = bus_nr,
                            failures = self.state.consecutive_i2c_failures,
                            "I2C writes recovered"
                        );
                    }
                    self.state.consecutive_i2c_failures = 0;
                    debug!(bus = bus_nr, address = %format!("{:#04x}", address), ?protocol, %duty, "I2C write ok");
                    return Ok(WriteOutcome::I2c { bus: bus_nr, address, protocol });
                }
                Err(e) => {
                    debug!(bus = bus_nr, address = %format!("{:#04x}", address), ?protocol, error = %e, "I2C attempt failed");
                    last_error = Some(e);
                }
            }
        }

        self.state.consecutive_i2c_failures += 1;
        let failures = self.state.consecutive_i2c_failures;
        let reason = format!(
            "all {} attempts failed ({} in a row): {}",
            I2C_ATTEMPTS.len(),
            failures,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        );
        warn!(bus = bus_nr, failures, %duty, "I2C write failed on every address and protocol");

        if failures >= I2C_FAILURE_THRESHOLD {
            if self.pwm.is_some() {
                self.downgrade_to_pwm();
            } else if failures % I2C_FAILURE_THRESHOLD == 0 {
                error!(bus = bus_nr, failures, "I2C keeps failing and no PWM fan is available");
            }
        }

        Err(ArgonfanError::write(format!("i2c-{}", bus_nr), reason))
    }

    fn downgrade_to_pwm(&mut self) {
        warn!(
            from_bus = ?self.state.i2c_bus,
            to = ?self.state.pwm_path,
            "Switching to PWM fan control for the rest of this run"
        );
        self.state.kind = BackendKind::Pwm;
        self.i2c = None;
    }

    fn write_pwm(&mut self, duty: DutyCycle) -> Result<WriteOutcome> {
        let fan = self
            .pwm
            .as_ref()
            .ok_or_else(|| ArgonfanError::write("pwm", "no PWM fan"))?;
        match fan.write_duty(duty) {
            Ok(value) => {
                debug!(%duty, value, "PWM write ok");
                Ok(WriteOutcome::Pwm { value })
            }
            Err(e) => {
                error!(error = %e, %duty, "PWM write failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::MockI2cBus;
    use crate::test_utils::test_utils::{create_mock_pwm_root, FakeBus};
    use mockall::Sequence;
    use std::fs;
    use std::sync::atomic::Ordering;

    fn failing_bus() -> FakeBus {
        let bus = FakeBus::new(1, vec![0x1A]);
        bus.failure_switch().store(true, Ordering::SeqCst);
        bus
    }

    #[test]
    fn register_write_to_primary_address_first() {
        let bus = FakeBus::new(1, vec![0x1A]);
        let log = bus.write_log();
        let mut act = Actuator::new(Selection { i2c: Some(Box::new(bus)), pwm: None });

        let out = act.write(42).unwrap();
        assert_eq!(out, WriteOutcome::I2c { bus: 1, address: 0x1A, protocol: I2cProtocol::Register });
        assert_eq!(log.lock().unwrap().as_slice(), &[(0x1A, vec![0x80, 42])]);
    }

    #[test]
    fn attempt_chain_order() {
        let mut bus = MockI2cBus::new();
        let mut seq = Sequence::new();
        bus.expect_bus_number().return_const(1u8);
        bus.expect_write()
            .withf(|addr, bytes| *addr == 0x1A && bytes == &[0x80u8, 64][..])
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(ArgonfanError::write("0x1a", "nack")));
        bus.expect_write()
            .withf(|addr, bytes| *addr == 0x1B && bytes == &[0x80u8, 64][..])
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(ArgonfanError::write("0x1b", "nack")));
        bus.expect_write()
            .withf(|addr, bytes| *addr == 0x1A && bytes == &[64u8][..])
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(ArgonfanError::write("0x1a", "nack")));
        bus.expect_write()
            .withf(|addr, bytes| *addr == 0x1B && bytes == &[64u8][..])
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let mut act = Actuator::new(Selection { i2c: Some(Box::new(bus)), pwm: None });
        let out = act.write(64).unwrap();
        assert_eq!(out, WriteOutcome::I2c { bus: 1, address: 0x1B, protocol: I2cProtocol::Legacy });
    }

    #[test]
    fn duty_is_clamped_before_framing() {
        let bus = FakeBus::new(1, vec![0x1A]);
        let log = bus.write_log();
        let mut act = Actuator::new(Selection { i2c: Some(Box::new(bus)), pwm: None });
        act.write(250).unwrap();
        act.write(-3).unwrap();
        let log = log.lock().unwrap();
        assert_eq!(log[0].1, vec![0x80, 100]);
        assert_eq!(log[1].1, vec![0x80, 0]);
    }

    #[test]
    fn success_resets_failure_counter() {
        let bus = FakeBus::new(1, vec![0x1A]);
        let switch = bus.failure_switch();
        let mut act = Actuator::new(Selection { i2c: Some(Box::new(bus)), pwm: None });

        switch.store(true, Ordering::SeqCst);
        for _ in 0..3 {
            assert!(act.write(50).is_err());
        }
        assert_eq!(act.backend_state().consecutive_i2c_failures, 3);

        switch.store(false, Ordering::SeqCst);
        act.write(50).unwrap();
        assert_eq!(act.backend_state().consecutive_i2c_failures, 0);
    }

    #[test]
    fn five_failures_downgrade_to_pwm_for_good() {
        let root = create_mock_pwm_root(&[0]);
        let fan = PwmFan::new(root.path().join("hwmon0"));
        let bus = failing_bus();
        let log = bus.write_log();
        let switch = bus.failure_switch();
        let mut act = Actuator::new(Selection { i2c: Some(Box::new(bus)), pwm: Some(fan.clone()) });

        for i in 1..I2C_FAILURE_THRESHOLD {
            assert!(act.write(60).is_err());
            assert_eq!(act.state(), ActuatorState::I2cActive, "after {} failures", i);
        }
        assert!(act.write(60).is_err());
        assert_eq!(act.state(), ActuatorState::PwmActive);
        let i2c_writes = log.lock().unwrap().len();
        assert_eq!(i2c_writes, 4 * I2C_FAILURE_THRESHOLD as usize);

        // the bus would work again, but it is never touched
        switch.store(false, Ordering::SeqCst);
        for duty in [0, 50, 100] {
            let out = act.write(duty).unwrap();
            assert!(matches!(out, WriteOutcome::Pwm { .. }));
        }
        assert_eq!(log.lock().unwrap().len(), i2c_writes);
        assert_eq!(fs::read_to_string(fan.duty_path()).unwrap(), "255");
        assert_eq!(act.state(), ActuatorState::PwmActive);
    }

    #[test]
    fn no_downgrade_without_pwm_fan() {
        let mut act = Actuator::new(Selection { i2c: Some(Box::new(failing_bus())), pwm: None });
        for _ in 0..(I2C_FAILURE_THRESHOLD * 3) {
            assert!(matches!(act.write(70), Err(ArgonfanError::WriteFailed { .. })));
        }
        assert_eq!(act.state(), ActuatorState::I2cActive);
        assert_eq!(act.backend_state().consecutive_i2c_failures, I2C_FAILURE_THRESHOLD * 3);
    }

    #[test]
    fn pwm_failure_keeps_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let fan = PwmFan::new(dir.path().join("gone"));
        let mut act = Actuator::new(Selection { i2c: None, pwm: Some(fan) });
        assert_eq!(act.state(), ActuatorState::PwmActive);
        assert!(act.write(40).is_err());
        assert_eq!(act.state(), ActuatorState::PwmActive);
    }

    #[test]
    fn pwm_backend_scales_duty() {
        let root = create_mock_pwm_root(&[0]);
        let fan = PwmFan::new(root.path().join("hwmon0"));
        let mut act = Actuator::new(Selection { i2c: None, pwm: Some(fan.clone()) });
        assert_eq!(act.write(50).unwrap(), WriteOutcome::Pwm { value: 127 });
        assert_eq!(fs::read_to_string(fan.enable_path()).unwrap(), "1");
        assert_eq!(act.backend_state().pwm_path, Some(fan.duty_path()));
    }

    #[test]
    fn unavailable_actuator_always_fails() {
        let mut act = Actuator::unavailable();
        assert_eq!(act.state(), ActuatorState::Failed);
        assert!(act.write(10).is_err());
    }
}
