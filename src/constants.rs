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

//! Constants for Pifan
//!
//! Fixed resource names and the defaults used when an option is not given
//! on the command line.

/// Binary name, used as syslog identifier and GPIO consumer label
pub const BINARY_NAME: &str = "pifan";

/// Version string reported by `-v`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the log filter (trace, debug, info, warn, error)
pub const LOG_ENV: &str = "PIFAN_LOG";

/// Default log filter when `PIFAN_LOG` is not set
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// System paths
pub mod paths {
    /// CPU thermal zone, reports millidegrees Celsius
    pub const CPU_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

    /// Directory holding the GPIO character devices
    pub const DEV_DIR: &str = "/dev";

    /// journald socket, used to decide whether the journal layer is installed
    pub const JOURNALD_SOCKET: &str = "/run/systemd/journal/socket";

    /// Target of the standard streams once detached
    pub const DEV_NULL: &str = "/dev/null";
}

/// GPIO settings
pub mod gpio {
    /// Chip carrying the fan line on a Raspberry Pi
    pub const CHIP_NAME: &str = "gpiochip0";

    /// Line value written when the line is requested (fan off)
    pub const INITIAL_VALUE: bool = false;
}

/// Control loop defaults
pub mod defaults {
    /// BCM line driving the fan transistor
    pub const PIN: u32 = 14;

    /// Seconds between two temperature samples
    pub const INTERVAL_SECS: u32 = 2;

    /// Fan stops below this temperature (°C)
    pub const LOWER_THRESHOLD: f32 = 60.0;

    /// Fan starts above this temperature (°C)
    pub const UPPER_THRESHOLD: f32 = 70.0;
}

/// Temperature conversion
pub mod temperature {
    /// sysfs thermal zones report millidegrees
    pub const MILLIDEGREE_DIVISOR: f32 = 1000.0;
}
