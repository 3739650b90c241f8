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

//! I2C transport for the case microcontroller
//!
//! Talks to `/dev/i2c-N` through the `I2C_SLAVE` ioctl followed by plain
//! `read`/`write` calls, which is what SMBus "write byte data" and
//! "receive byte" boil down to for a device this simple.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;

use af_error::{ArgonfanError, Result};
use tracing::trace;

use crate::constants::{i2c, paths};

#[cfg(test)]
use mockall::automock;

/// One opened I2C bus
#[cfg_attr(test, automock)]
pub trait I2cBus: Send {
    /// Bus number (`N` in `/dev/i2c-N`)
    fn bus_number(&self) -> u8;

    /// Read-probe: does a device acknowledge a one-byte read at `address`?
    fn probe(&mut self, address: u16) -> bool;

    /// Send `bytes` as a single write transaction to `address`
    fn write(&mut self, address: u16, bytes: &[u8]) -> Result<()>;
}

/// Source of I2C buses
pub trait I2cAdapter {
    /// Bus numbers present on this host, ascending
    fn available_buses(&self) -> Vec<u8>;

    fn open(&self, bus: u8) -> Result<Box<dyn I2cBus>>;
}

/// Read-probe every address in the scan window, like `i2cdetect -r`
pub fn scan(bus: &mut dyn I2cBus) -> Vec<u16> {
    let responders: Vec<u16> = (i2c::SCAN_FIRST..=i2c::SCAN_LAST)
        .filter(|&addr| bus.probe(addr))
        .collect();
    trace!(bus = bus.bus_number(), count = responders.len(), "Bus scan complete");
    responders
}

/// `/dev/i2c-N` bus
#[derive(Debug)]
pub struct LinuxI2cBus {
    bus: u8,
    file: File,
}

impl LinuxI2cBus {
    fn select(&self, address: u16) -> io::Result<()> {
        // SAFETY: the fd is owned by self.file and stays open for the call; I2C_SLAVE
        // takes the 7-bit address by value and does not touch user memory.
        let rc = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                i2c::IOCTL_SLAVE as _,
                address as libc::c_ulong,
            )
        };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

impl I2cBus for LinuxI2cBus {
    fn bus_number(&self) -> u8 {
        self.bus
    }

    fn probe(&mut self, address: u16) -> bool {
        match self.select(address) {
            Ok(()) => {}
            // A kernel driver owns the address, so something is there
            Err(e) if e.raw_os_error() == Some(libc::EBUSY) => return true,
            Err(_) => return false,
        }
        let mut buf = [0u8; 1];
        matches!((&self.file).read(&mut buf), Ok(1))
    }

    fn write(&mut self, address: u16, bytes: &[u8]) -> Result<()> {
        let target = format!("i2c-{}@{:#04x}", self.bus, address);
        self.select(address)
            .map_err(|e| ArgonfanError::write(&target, format!("select address: {}", e)))?;
        match (&self.file).write(bytes) {
            Ok(n) if n == bytes.len() => Ok(()),
            Ok(n) => Err(ArgonfanError::write(&target, format!("short write ({} of {} bytes)", n, bytes.len()))),
            Err(e) => Err(ArgonfanError::write(&target, e.to_string())),
        }
    }
}

/// Buses exposed as character devices under a device directory
#[derive(Debug, Clone)]
pub struct LinuxI2cAdapter {
    dev_dir: PathBuf,
}

impl LinuxI2cAdapter {
    pub fn new(dev_dir: impl Into<PathBuf>) -> Self {
        Self { dev_dir: dev_dir.into() }
    }
}

impl Default for LinuxI2cAdapter {
    fn default() -> Self {
        Self::new(paths::DEV_DIR)
    }
}

/// Parse `i2c-N` into `N`
pub fn parse_bus_name(name: &str) -> Option<u8> {
    name.strip_prefix("i2c-")?.parse().ok()
}

impl I2cAdapter for LinuxI2cAdapter {
    fn available_buses(&self) -> Vec<u8> {
        let mut buses: Vec<u8> = fs::read_dir(&self.dev_dir)
            .map(|entries| {
                entries
                    .flatten()
                    .filter_map(|e| parse_bus_name(&e.file_name().to_string_lossy()))
                    .collect()
            })
            .unwrap_or_default();
        buses.sort_unstable();
        buses
    }

    fn open(&self, bus: u8) -> Result<Box<dyn I2cBus>> {
        let path = self.dev_dir.join(format!("i2c-{}", bus));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| ArgonfanError::ProbeFailed {
                bus,
                reason: format!("open {}: {}", path.display(), e),
            })?;
        Ok(Box::new(LinuxI2cBus { bus, file }))
    }
}
