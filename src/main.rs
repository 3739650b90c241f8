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

//! argonfand - fan control daemon
//!
//! Selects the fan backend once at startup, then runs the control loop
//! until SIGINT/SIGTERM. Exits 1 when no fan hardware can be found.

use std::path::Path;

use anyhow::Context;
use tracing::{error, info, warn};

use argonfan::actuator::Actuator;
use argonfan::config::{load_configuration, options_path};
use argonfan::control::{ControlLoop, Shutdown};
use argonfan::i2c::LinuxI2cAdapter;
use argonfan::reporter::{HomeAssistantReporter, Reporter};
use argonfan::selector::{select_backend, SelectionPolicy};
use argonfan::temperature::SysfsTemperature;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable selecting the log filter
const LOG_ENV: &str = "ARGONFAN_LOG";

const JOURNALD_SOCKET: &str = "/run/systemd/journal/socket";

// ============================================================================
// CLI
// ============================================================================

fn print_help() {
    eprintln!("argonfand {} - Argon ONE fan control daemon", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    argonfand [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -v, --version       Print version");
    eprintln!("    -h, --help          Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    {:<19} Log level (trace, debug, info, warn, error)", LOG_ENV);
    eprintln!("    ARGONFAN_OPTIONS    Options file (default /data/options.json)");
    eprintln!("    SUPERVISOR_TOKEN    Bearer token for state reporting");
}

fn print_version() {
    println!("argonfand {}", VERSION);
}

// ============================================================================
// Logging
// ============================================================================

/// Install the global subscriber; returns whether the journal is used
fn init_logging(log_level: &str) -> bool {
    if Path::new(JOURNALD_SOCKET).exists() {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                use tracing_subscriber::prelude::*;
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(tracing_subscriber::EnvFilter::new(log_level))
                    .init();
                return true;
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stdout", e);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(log_level)
        .init();
    false
}

// ============================================================================
// Daemon
// ============================================================================

async fn run_daemon() -> anyhow::Result<()> {
    let options = options_path();
    let config = load_configuration(&options);

    let policy = SelectionPolicy::from_config(&config);
    let selection = select_backend(&policy, &LinuxI2cAdapter::default())
        .context("hardware selection failed")?;
    let actuator = Actuator::new(selection);
    info!("STARTUP: Fan backend {:?}", actuator.backend_state());

    let reporter: Option<Box<dyn Reporter>> = if config.reporting_enabled {
        HomeAssistantReporter::from_env().map(|r| {
            info!("STARTUP: Reporting fan speed to {}", r.endpoint());
            Box::new(r) as Box<dyn Reporter>
        })
    } else {
        None
    };

    let shutdown = Shutdown::new();
    let handler_shutdown = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("SIGNAL: Received SIGINT/SIGTERM - initiating shutdown");
        handler_shutdown.trigger();
    }) {
        warn!("Failed to set signal handler: {}. Shutdown via signals may not work cleanly.", e);
    }

    let source = SysfsTemperature::cpu(config.unit);
    info!("STARTUP: Reading temperature from {}", source.path().display());

    let mut control = ControlLoop::new(config, Box::new(source), actuator);
    if let Some(reporter) = reporter {
        control = control.with_reporter(reporter);
    }
    control.run(&shutdown).await;

    Ok(())
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                return;
            }
            "-v" | "--version" => {
                print_version();
                return;
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                std::process::exit(1);
            }
        }
    }

    let log_level = std::env::var(LOG_ENV).unwrap_or_else(|_| "info".to_string());
    let journald = init_logging(&log_level);

    info!("STARTUP: argonfand {} starting", VERSION);
    info!("STARTUP: Logging to {}", if journald { "systemd journal" } else { "stdout" });
    info!("STARTUP: Log level: {}", log_level);

    if let Err(e) = run_daemon().await {
        error!("STARTUP: {:#}", e);
        std::process::exit(1);
    }

    info!("SHUTDOWN: argonfand stopped");
}
