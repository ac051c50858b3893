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

use std::time::Duration;

use crate::constants::defaults;
use crate::error::{PifanError, Result};

/// Daemon configuration, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// GPIO line offset on the fan chip
    pub pin: u32,
    /// Seconds between two temperature samples
    pub interval: u32,
    /// Lower threshold (°C), fan stops below it
    pub min: f32,
    /// Upper threshold (°C), fan starts above it
    pub max: f32,
    /// Detach from the controlling terminal before acquiring resources
    pub daemonize: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pin: defaults::PIN,
            interval: defaults::INTERVAL_SECS,
            min: defaults::LOWER_THRESHOLD,
            max: defaults::UPPER_THRESHOLD,
            daemonize: true,
        }
    }
}

impl Config {
    /// Sampling period as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval))
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval == 0 {
            return Err(PifanError::invalid_config("interval", "must be at least 1 second"));
        }
        if !self.min.is_finite() {
            return Err(PifanError::invalid_config("lower threshold", format!("{} is not a temperature", self.min)));
        }
        if !self.max.is_finite() {
            return Err(PifanError::invalid_config("upper threshold", format!("{} is not a temperature", self.max)));
        }
        if self.min >= self.max {
            return Err(PifanError::invalid_config(
                "thresholds",
                format!("lower threshold {:.2}°C must be below upper threshold {:.2}°C", self.min, self.max),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_usage_text() {
        let config = Config::default();
        assert_eq!(config.pin, 14);
        assert_eq!(config.interval, 2);
        assert_eq!(config.min, 60.0);
        assert_eq!(config.max, 70.0);
        assert!(config.daemonize);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_interval_duration() {
        let config = Config { interval: 5, ..Config::default() };
        assert_eq!(config.interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = Config { interval: 0, ..Config::default() };
        assert!(matches!(
            config.validate(),
            Err(PifanError::InvalidConfig { field: "interval", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_or_equal_thresholds() {
        let inverted = Config { min: 75.0, max: 70.0, ..Config::default() };
        assert!(inverted.validate().is_err());

        let equal = Config { min: 65.0, max: 65.0, ..Config::default() };
        assert!(equal.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_nan() {
        let config = Config { min: f32::NAN, ..Config::default() };
        assert!(config.validate().is_err());
        let config = Config { max: f32::INFINITY, ..Config::default() };
        assert!(config.validate().is_err());
    }
}
