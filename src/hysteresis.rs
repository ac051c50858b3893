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

//! Two-threshold hysteresis for a binary fan
//!
//! The fan starts when the temperature rises strictly above the upper
//! threshold and stops when it falls strictly below the lower one. Anything
//! in between, boundaries included, keeps the current state.

use std::fmt;

use tracing::info;

use crate::config::Config;
use crate::error::{PifanError, Result};
use crate::gpio::FanActuator;

/// What the controller believes the fan is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanState {
    Off,
    On,
}

impl FanState {
    pub fn from_line(value: bool) -> Self {
        if value { Self::On } else { Self::Off }
    }

    pub fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for FanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::On => "on",
        })
    }
}

/// A change of fan state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Stop,
}

impl Transition {
    pub fn target(&self) -> FanState {
        match self {
            Self::Start => FanState::On,
            Self::Stop => FanState::Off,
        }
    }

    fn notice(&self) -> &'static str {
        match self {
            Self::Start => "starting fan",
            Self::Stop => "stopping fan",
        }
    }
}

/// Lower and upper switching temperatures, `min < max`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    min: f32,
    max: f32,
}

impl Thresholds {
    pub fn new(min: f32, max: f32) -> Result<Self> {
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(PifanError::invalid_config(
                "thresholds",
                format!("need finite lower < upper, got {} and {}", min, max),
            ));
        }
        Ok(Self { min, max })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.min, config.max)
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }
}

/// Pure transition rule
pub fn decide(state: FanState, temp: f32, thresholds: &Thresholds) -> Option<Transition> {
    match state {
        FanState::Off if temp > thresholds.max => Some(Transition::Start),
        FanState::On if temp < thresholds.min => Some(Transition::Stop),
        _ => None,
    }
}

/// Hysteresis state machine driving one actuator
#[derive(Debug, Clone)]
pub struct Hysteresis {
    thresholds: Thresholds,
    state: FanState,
}

impl Hysteresis {
    pub fn new(thresholds: Thresholds, initial: FanState) -> Self {
        Self { thresholds, state: initial }
    }

    pub fn state(&self) -> FanState {
        self.state
    }

    /// Feed one sample; switches the actuator when a threshold is crossed.
    ///
    /// The believed state changes, and the notice is logged, only once the
    /// actuator write succeeded.
    pub fn apply<A: FanActuator + ?Sized>(&mut self, temp: f32, actuator: &mut A) -> Result<Option<Transition>> {
        let Some(transition) = decide(self.state, temp, &self.thresholds) else {
            return Ok(None);
        };

        actuator.set(transition.target().is_on())?;
        self.state = transition.target();
        info!(temp, "{} - cpu temp: {:.2}°C", transition.notice(), temp);
        Ok(Some(transition))
    }
}
