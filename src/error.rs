/*
 * This file is part of Pifan.
 *
 * Copyright (C) 2025 Pifan contributors
 *
 * Pifan is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Pifan is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Pifan. If not, see <https://www.gnu.org/licenses/>.
 */

//! Unified error handling for Pifan
//!
//! A single error type is used across the sensor, GPIO, signal and daemon
//! layers. `PifanError::class` maps each variant onto the way the control
//! loop treats it: setup failures abort before the loop starts, runtime
//! failures end the loop, sensor failures are survivable.

use std::io;
use std::path::PathBuf;

/// Result type alias using PifanError
pub type Result<T> = std::result::Result<T, PifanError>;

/// How a failure is handled by the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Acquiring a capability failed; the loop never starts
    Setup,
    /// The wait primitive or the signal record read failed while running
    Runtime,
    /// The temperature source could not be read; not fatal
    Sensor,
    /// Bad command line input
    Usage,
}

/// Unified error type for all Pifan operations
#[derive(thiserror::Error, Debug)]
pub enum PifanError {
    // ============================================================================
    // Sensor Errors
    // ============================================================================
    #[error("Failed to read temperature from {path}: {source}")]
    SensorRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse temperature from {path}: {raw:?}")]
    SensorParse {
        path: PathBuf,
        raw: String,
    },

    // ============================================================================
    // GPIO Errors
    // ============================================================================
    #[error("unable to open \"{chip}\" - {source}")]
    ChipOpen {
        chip: String,
        #[source]
        source: io::Error,
    },

    #[error("unable to open line {pin} - {reason}")]
    LineUnavailable {
        pin: u32,
        reason: String,
    },

    #[error("unable to get ownership on line {pin} - {source}")]
    LineRequest {
        pin: u32,
        #[source]
        source: io::Error,
    },

    #[error("unable to access value of line {pin} - {source}")]
    LineValue {
        pin: u32,
        #[source]
        source: io::Error,
    },

    // ============================================================================
    // Signal Errors
    // ============================================================================
    #[error("sigprocmask failed - {0}")]
    SignalMask(#[source] io::Error),

    #[error("signalfd failed - {0}")]
    SignalFd(#[source] io::Error),

    #[error("signal poll failed - {0}")]
    SignalPoll(#[source] io::Error),

    #[error("signal read failed - {0}")]
    SignalRead(#[source] io::Error),

    #[error("signal read failed - short read of {got} bytes (expected {expected})")]
    ShortSignalRead {
        got: usize,
        expected: usize,
    },

    // ============================================================================
    // Process Errors
    // ============================================================================
    #[error("unable to {step} - {source}")]
    Daemonize {
        step: &'static str,
        #[source]
        source: io::Error,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    #[error("{0}")]
    Usage(String),
}

impl PifanError {
    /// Create an invalid configuration error
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }

    /// Create a usage error from a string
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Which part of the daemon lifecycle this error belongs to
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::SensorRead { .. } | Self::SensorParse { .. } => ErrorClass::Sensor,
            Self::SignalPoll(_) | Self::SignalRead(_) | Self::ShortSignalRead { .. } => {
                ErrorClass::Runtime
            }
            Self::LineValue { .. } => ErrorClass::Runtime,
            Self::InvalidConfig { .. } | Self::Usage(_) => ErrorClass::Usage,
            Self::ChipOpen { .. }
            | Self::LineUnavailable { .. }
            | Self::LineRequest { .. }
            | Self::SignalMask(_)
            | Self::SignalFd(_)
            | Self::Daemonize { .. } => ErrorClass::Setup,
        }
    }

    /// Whether the control loop can carry on after this error
    pub fn is_fatal(&self) -> bool {
        !matches!(self.class(), ErrorClass::Sensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PifanError::ChipOpen {
            chip: "gpiochip0".to_string(),
            source: io::Error::from_raw_os_error(libc::ENOENT),
        };
        assert!(err.to_string().starts_with("unable to open \"gpiochip0\" - "));

        let err = PifanError::ShortSignalRead { got: 12, expected: 128 };
        assert_eq!(
            err.to_string(),
            "signal read failed - short read of 12 bytes (expected 128)"
        );

        let err = PifanError::invalid_config("interval", "must be positive");
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for interval: must be positive"
        );
    }

    #[test]
    fn test_error_classes() {
        let io_err = || io::Error::new(io::ErrorKind::Other, "test");

        assert_eq!(PifanError::SignalMask(io_err()).class(), ErrorClass::Setup);
        assert_eq!(PifanError::SignalFd(io_err()).class(), ErrorClass::Setup);
        assert_eq!(PifanError::SignalPoll(io_err()).class(), ErrorClass::Runtime);
        assert_eq!(PifanError::SignalRead(io_err()).class(), ErrorClass::Runtime);
        assert_eq!(
            PifanError::LineRequest { pin: 14, source: io_err() }.class(),
            ErrorClass::Setup
        );
        assert_eq!(
            PifanError::SensorRead { path: PathBuf::from("/x"), source: io_err() }.class(),
            ErrorClass::Sensor
        );
        assert_eq!(PifanError::usage("bad").class(), ErrorClass::Usage);
    }

    #[test]
    fn test_only_sensor_errors_are_survivable() {
        let sensor = PifanError::SensorParse {
            path: PathBuf::from("/sys/class/thermal/thermal_zone0/temp"),
            raw: "garbage".to_string(),
        };
        assert!(!sensor.is_fatal());
        assert!(PifanError::ShortSignalRead { got: 0, expected: 128 }.is_fatal());
    }
}
