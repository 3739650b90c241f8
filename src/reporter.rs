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

//! Duty cycle state reporting
//!
//! Reports are fire-and-forget. Each one runs as its own tokio task bounded
//! by a timeout, and its result never reaches the control loop.

use std::env;
use std::time::Duration;

use af_error::{ArgonfanError, Result};
use reqwest::Client;
use serde_json::{json, Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::constants::{reporting, timing};
use crate::curve::DutyCycle;
use crate::temperature::TemperatureSample;

/// One report, handed off and forgotten
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ReportEvent {
    pub duty: DutyCycle,
    pub temperature: TemperatureSample,
}

/// Sink for duty cycle reports
pub trait Reporter: Send {
    /// Dispatch `event` without waiting for it to complete
    fn report(&self, event: ReportEvent);
}

/// Posts the fan speed sensor state to the Home Assistant supervisor API
#[derive(Debug, Clone)]
pub struct HomeAssistantReporter {
    client: Client,
    endpoint: String,
    token: String,
    timeout: Duration,
}

impl HomeAssistantReporter {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            token: token.into(),
            timeout: timing::REPORT_TIMEOUT,
        }
    }

    /// Reporter for the supervisor endpoint, or `None` without a token
    pub fn from_env() -> Option<Self> {
        match env::var(reporting::TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => {
                Some(Self::new(reporting::ENDPOINT, token.trim()))
            }
            _ => {
                warn!(
                    "STARTUP: {} is not set, state reporting disabled",
                    reporting::TOKEN_ENV
                );
                None
            }
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Request body for one report
    pub fn body(event: &ReportEvent) -> Value {
        let mut attributes = Map::new();
        attributes.insert(
            "unit_of_measurement".into(),
            json!(reporting::UNIT_OF_MEASUREMENT),
        );
        attributes.insert("icon".into(), json!(reporting::ICON));
        attributes.insert(
            format!("Temperature {}", event.temperature.unit.letter()),
            json!(event.temperature.value),
        );
        attributes.insert("friendly_name".into(), json!(reporting::FRIENDLY_NAME));

        json!({
            "state": event.duty.percent(),
            "attributes": attributes,
        })
    }

    /// Spawn the POST for `event` onto the runtime
    ///
    /// Must be called from within a tokio runtime. The handle resolves once
    /// the request finishes or the timeout abandons it.
    pub fn dispatch(&self, event: ReportEvent) -> JoinHandle<Result<()>> {
        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&Self::body(&event));
        let timeout = self.timeout;

        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, request.send()).await {
                Ok(Ok(response)) if response.status().is_success() => Ok(()),
                Ok(Ok(response)) => Err(ArgonfanError::ReportingFailed(format!(
                    "HTTP {}",
                    response.status()
                ))),
                Ok(Err(e)) => Err(ArgonfanError::ReportingFailed(e.to_string())),
                Err(_) => Err(ArgonfanError::ReportingFailed(format!(
                    "no response within {:?}",
                    timeout
                ))),
            };
            match &result {
                Ok(()) => debug!(duty = %event.duty, "State reported"),
                Err(e) => warn!(error = %e, "State report dropped"),
            }
            result
        })
    }
}

impl Reporter for HomeAssistantReporter {
    fn report(&self, event: ReportEvent) {
        drop(self.dispatch(event));
    }
}
