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

//! The control loop
//!
//! Every cycle reads the CPU temperature, maps it onto a duty cycle,
//! drives the actuator and hands a report off to the reporter. The loop
//! owns the actuator outright; nothing else writes to the fan while it
//! runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use af_error::Result;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::actuator::{Actuator, WriteOutcome};
use crate::config::Configuration;
use crate::constants::{actuator::SAFE_MODE_DUTY, timing};
use crate::curve::{map_duty, DutyCycle};
use crate::reporter::{ReportEvent, Reporter};
use crate::temperature::{TemperatureSample, TemperatureSource};

/// Shutdown signal shared between the signal handler and the loop
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<ShutdownInner>,
}

#[derive(Debug, Default)]
struct ShutdownInner {
    requested: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown; safe to call from any thread
    pub fn trigger(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
        self.inner.notify.notify_one();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    async fn notified(&self) {
        self.inner.notify.notified().await
    }
}

/// Result of one control cycle that got as far as a temperature sample
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    pub sample: TemperatureSample,
    pub duty: DutyCycle,
    /// `None` when the write failed
    pub applied: Option<WriteOutcome>,
}

pub struct ControlLoop {
    config: Configuration,
    source: Box<dyn TemperatureSource>,
    actuator: Actuator,
    reporter: Option<Box<dyn Reporter>>,
    interval: Duration,
    last_duty: Option<DutyCycle>,
}

impl ControlLoop {
    pub fn new(config: Configuration, source: Box<dyn TemperatureSource>, actuator: Actuator) -> Self {
        Self {
            config,
            source,
            actuator,
            reporter: None,
            interval: timing::POLL_INTERVAL,
            last_duty: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn actuator(&self) -> &Actuator {
        &self.actuator
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one cycle
    ///
    /// Returns the sensor error when no sample could be taken; in that case
    /// nothing is written and nothing is reported. Write failures are logged
    /// by the actuator and show up as `applied: None`.
    pub fn tick(&mut self) -> Result<Cycle> {
        let sample = match self.source.read() {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "CONTROL: Temperature unavailable, skipping cycle");
                return Err(e);
            }
        };

        let duty = map_duty(sample.value, self.config.min_temp, self.config.max_temp);
        debug!(temperature = %sample, %duty, "CONTROL: Cycle");

        if self.config.log_temperature {
            info!("CONTROL: Current temperature {} (fan {})", sample, duty);
        }
        if self.last_duty != Some(duty) {
            match self.last_duty {
                Some(prev) => info!("ACTION: Fan speed {} -> {} at {}", prev, duty, sample),
                None => info!("ACTION: Fan speed set to {} at {}", duty, sample),
            }
            self.last_duty = Some(duty);
        }

        let applied = self.actuator.write(i64::from(duty.percent())).ok();

        if let Some(reporter) = &self.reporter {
            reporter.report(ReportEvent { duty, temperature: sample });
        }

        Ok(Cycle { sample, duty, applied })
    }

    /// Cycle until `shutdown` fires, then leave the fan at full speed
    pub async fn run(&mut self, shutdown: &Shutdown) {
        info!(
            "CONTROL: Loop starting ({:?} interval, {:.1}-{:.1}{})",
            self.interval, self.config.min_temp, self.config.max_temp, self.config.unit
        );

        while !shutdown.is_triggered() {
            // Errors are already logged and never end the loop
            let _ = self.tick();

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.notified() => {
                    debug!("CONTROL: Woken by shutdown signal");
                }
            }
        }

        self.enter_safe_mode();
        info!("CONTROL: Loop stopped");
    }

    /// Drive the fan to full speed
    pub fn enter_safe_mode(&mut self) {
        match self.actuator.write(i64::from(SAFE_MODE_DUTY)) {
            Ok(_) => info!("SHUTDOWN: Fan left at {}%", SAFE_MODE_DUTY),
            Err(e) => warn!(error = %e, "SHUTDOWN: Could not set fan to safe speed"),
        }
    }
}
