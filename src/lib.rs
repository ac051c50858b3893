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

//! Pifan - thermal-threshold fan controller for Linux
//!
//! Reads the CPU thermal zone periodically and switches a fan on a single
//! GPIO line using two thresholds. SIGINT and SIGTERM are turned into a
//! pollable event so the sampling wait doubles as the shutdown wait.

pub mod cli;
pub mod config;
pub mod constants;
pub mod controller;
pub mod daemon;
pub mod error;
pub mod gpio;
pub mod hysteresis;
pub mod logging;
pub mod sensor;
pub mod signals;

pub use config::Config;
pub use controller::{Controller, LoopState, Step};
pub use error::{ErrorClass, PifanError, Result};
pub use gpio::{FanActuator, GpioFan};
pub use hysteresis::{FanState, Hysteresis, Thresholds, Transition};
pub use sensor::{TemperatureSource, ThermalZone};
pub use signals::{Readiness, ShutdownSignals, ShutdownSource, TerminationReason};
