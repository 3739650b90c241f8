//! Unified error handling for argonfan
//!
//! One error type covers the whole controller. Each variant maps onto a
//! recovery policy: sensor and write failures are transient, configuration
//! problems are repaired with defaults, and only `NoHardwareFound` ends the
//! process.

use std::io;
use std::path::PathBuf;

/// Result type alias using ArgonfanError
pub type Result<T> = std::result::Result<T, ArgonfanError>;

/// Unified error type for all argonfan operations
#[derive(thiserror::Error, Debug)]
pub enum ArgonfanError {
    // ============================================================================
    // I/O and Parsing
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Sensor
    // ============================================================================
    #[error("Temperature sensor {path} unavailable: {reason}")]
    SensorUnavailable {
        path: PathBuf,
        reason: String,
    },

    // ============================================================================
    // Configuration
    // ============================================================================
    #[error("Invalid configuration value for {field}: {reason}")]
    ConfigInvalid {
        field: String,
        reason: String,
    },

    // ============================================================================
    // Hardware selection
    // ============================================================================
    #[error("Probe of I2C bus {bus} failed: {reason}")]
    ProbeFailed {
        bus: u8,
        reason: String,
    },

    #[error("No fan hardware found: {0}")]
    NoHardwareFound(String),

    // ============================================================================
    // Actuation
    // ============================================================================
    #[error("Fan write to {target} failed: {reason}")]
    WriteFailed {
        target: String,
        reason: String,
    },

    // ============================================================================
    // Reporting
    // ============================================================================
    #[error("State report failed: {0}")]
    ReportingFailed(String),
}

impl ArgonfanError {
    /// Create a sensor error for the given path
    pub fn sensor(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SensorUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error for a single field
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a write error for a hardware target
    pub fn write(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error must stop the daemon
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoHardwareFound(_))
    }
}
