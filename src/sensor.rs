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

//! Temperature source
//!
//! Linux thermal zones report millidegrees Celsius (e.g. 48312 = 48.312°C).
//! The conversion happens here so the control loop only sees degrees.

use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{paths, temperature};
use crate::error::{PifanError, Result};

/// Anything that can produce a CPU temperature in degrees Celsius.
#[cfg_attr(test, mockall::automock)]
pub trait TemperatureSource {
    fn read_celsius(&mut self) -> Result<f32>;
}

/// sysfs thermal zone file
#[derive(Debug, Clone)]
pub struct ThermalZone {
    path: PathBuf,
}

impl ThermalZone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The SoC thermal zone used on Raspberry Pi boards
    pub fn cpu() -> Self {
        Self::new(paths::CPU_THERMAL_ZONE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemperatureSource for ThermalZone {
    fn read_celsius(&mut self) -> Result<f32> {
        let content = fs::read_to_string(&self.path).map_err(|source| PifanError::SensorRead {
            path: self.path.clone(),
            source,
        })?;
        parse_millidegrees(&content).ok_or_else(|| PifanError::SensorParse {
            path: self.path.clone(),
            raw: content.trim().to_string(),
        })
    }
}

/// Parse a thermal zone reading into degrees Celsius.
///
/// Some drivers print a fractional value, so the text is read as a float.
pub fn parse_millidegrees(raw: &str) -> Option<f32> {
    raw.trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|millidegrees| millidegrees / temperature::MILLIDEGREE_DIVISOR)
}
