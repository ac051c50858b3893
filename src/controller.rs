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

//! Control loop
//!
//! One iteration: sample the temperature, run the hysteresis check, then
//! block on the shutdown source for one sampling interval. The wait is the
//! only suspension point, so a shutdown request takes effect at the end of
//! the iteration in which it arrived.
//!
//! ```text
//!            timeout / unexpected signal
//!              +-----+
//!              v     |
//!   setup --> Running --- SIGINT / SIGTERM ---> ShuttingDown
//!                 |
//!                 +------ poll / read error ---> Failed
//! ```

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{PifanError, Result};
use crate::gpio::FanActuator;
use crate::hysteresis::{FanState, Hysteresis, Thresholds};
use crate::sensor::TemperatureSource;
use crate::signals::{Readiness, ShutdownSource, TerminationReason};

/// Lifecycle of the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    ShuttingDown(TerminationReason),
    Failed,
}

/// Outcome of a single iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Shutdown(TerminationReason),
}

/// Owns the three capabilities for the lifetime of the daemon
pub struct Controller<T, A, S> {
    config: Config,
    sensor: T,
    fan: A,
    signals: S,
    hysteresis: Hysteresis,
    state: LoopState,
    iterations: u64,
}

impl<T, A, S> Controller<T, A, S>
where
    T: TemperatureSource,
    A: FanActuator,
    S: ShutdownSource,
{
    /// Build a running controller from acquired capabilities.
    ///
    /// The fan line is read once here; afterwards the controller's own
    /// belief is authoritative.
    pub fn new(config: Config, sensor: T, mut fan: A, signals: S) -> Result<Self> {
        let thresholds = Thresholds::from_config(&config)?;
        let initial = FanState::from_line(fan.get()?);
        debug!(
            min = thresholds.min(),
            max = thresholds.max(),
            interval = config.interval,
            fan = %initial,
            "control loop ready"
        );

        Ok(Self {
            config,
            sensor,
            fan,
            signals,
            hysteresis: Hysteresis::new(thresholds, initial),
            state: LoopState::Running,
            iterations: 0,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn fan_state(&self) -> FanState {
        self.hysteresis.state()
    }

    /// Completed iterations
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Run until a termination signal arrives or a fatal error occurs
    pub fn run(&mut self) -> Result<TerminationReason> {
        loop {
            if let Step::Shutdown(reason) = self.step()? {
                return Ok(reason);
            }
        }
    }

    /// One sample, one decision, one wait
    pub fn step(&mut self) -> Result<Step> {
        if let LoopState::ShuttingDown(reason) = self.state {
            return Ok(Step::Shutdown(reason));
        }

        self.sample();

        let readiness = match self.signals.poll(self.config.interval()) {
            Ok(readiness) => readiness,
            Err(e) => return Err(self.fail(e)),
        };

        let step = match readiness {
            Readiness::Timeout => Step::Continue,
            Readiness::Ready => match self.signals.read_and_classify() {
                Ok(Some(reason)) => {
                    info!(signal = reason.signal_name(), "received {} signal", reason);
                    self.state = LoopState::ShuttingDown(reason);
                    Step::Shutdown(reason)
                }
                Ok(None) => {
                    warn!("received unexpected signal, ignoring");
                    Step::Continue
                }
                Err(e) => return Err(self.fail(e)),
            },
        };

        self.iterations += 1;
        Ok(step)
    }

    fn sample(&mut self) {
        match self.sensor.read_celsius() {
            Ok(temp) => {
                if let Err(e) = self.hysteresis.apply(temp, &mut self.fan) {
                    error!(error = %e, "unable to switch fan - {}", e);
                }
            }
            Err(e) => {
                // Unknown is not cold: keep whatever the fan is doing.
                warn!(error = %e, fan = %self.hysteresis.state(), "temperature unavailable, holding fan state");
            }
        }
    }

    fn fail(&mut self, e: PifanError) -> PifanError {
        self.state = LoopState::Failed;
        e
    }

    /// Hand the capabilities back, e.g. for explicit release
    pub fn into_parts(self) -> (T, A, S) {
        (self.sensor, self.fan, self.signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::MockFanActuator;
    use crate::sensor::MockTemperatureSource;
    use crate::signals::MockShutdownSource;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::io;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config() -> Config {
        Config {
            pin: 14,
            interval: 2,
            min: 60.0,
            max: 70.0,
            daemonize: false,
        }
    }

    fn fan_reading(initial: bool) -> MockFanActuator {
        let mut fan = MockFanActuator::new();
        fan.expect_get().times(1).returning(move || Ok(initial));
        fan
    }

    fn sensor_sequence(temps: Vec<f32>) -> MockTemperatureSource {
        let mut sensor = MockTemperatureSource::new();
        let mut temps = temps.into_iter();
        sensor
            .expect_read_celsius()
            .returning(move || Ok(temps.next().expect("sensor read more often than scripted")));
        sensor
    }

    #[test]
    fn test_new_rejects_bad_thresholds() {
        let bad = Config { min: 80.0, ..config() };
        let result = Controller::new(
            bad,
            MockTemperatureSource::new(),
            MockFanActuator::new(),
            MockShutdownSource::new(),
        );
        assert!(matches!(result, Err(PifanError::InvalidConfig { .. })));
    }

    #[test]
    fn test_initial_state_read_from_line() {
        let controller = Controller::new(
            config(),
            MockTemperatureSource::new(),
            fan_reading(true),
            MockShutdownSource::new(),
        )
        .unwrap();
        assert_eq!(controller.fan_state(), FanState::On);
        assert_eq!(controller.state(), LoopState::Running);
        assert_eq!(controller.iterations(), 0);
    }

    #[test]
    fn test_timeouts_keep_running() {
        let mut signals = MockShutdownSource::new();
        signals
            .expect_poll()
            .with(eq(Duration::from_secs(2)))
            .times(5)
            .returning(|_| Ok(Readiness::Timeout));
        signals.expect_read_and_classify().never();

        let mut controller = Controller::new(
            config(),
            sensor_sequence(vec![50.0; 5]),
            fan_reading(false),
            signals,
        )
        .unwrap();

        for _ in 0..5 {
            assert_eq!(controller.step().unwrap(), Step::Continue);
        }
        assert_eq!(controller.iterations(), 5);
        assert_eq!(controller.state(), LoopState::Running);
    }

    #[test]
    fn test_sample_happens_before_wait() {
        let mut seq = Sequence::new();
        let mut sensor = MockTemperatureSource::new();
        let mut fan = fan_reading(false);
        let mut signals = MockShutdownSource::new();

        sensor.expect_read_celsius().times(1).in_sequence(&mut seq).returning(|| Ok(75.0));
        fan.expect_set().with(eq(true)).times(1).in_sequence(&mut seq).returning(|_| Ok(()));
        signals.expect_poll().times(1).in_sequence(&mut seq).returning(|_| Ok(Readiness::Ready));
        signals
            .expect_read_and_classify()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(Some(TerminationReason::Terminate)));

        let mut controller = Controller::new(config(), sensor, fan, signals).unwrap();
        assert_eq!(controller.run().unwrap(), TerminationReason::Terminate);
        assert_eq!(controller.fan_state(), FanState::On);
        assert_eq!(controller.state(), LoopState::ShuttingDown(TerminationReason::Terminate));
    }

    #[test]
    fn test_interrupt_on_third_iteration() {
        let mut signals = MockShutdownSource::new();
        let mut polls = 0;
        signals.expect_poll().times(3).returning(move |_| {
            polls += 1;
            Ok(if polls == 3 { Readiness::Ready } else { Readiness::Timeout })
        });
        signals
            .expect_read_and_classify()
            .times(1)
            .returning(|| Ok(Some(TerminationReason::Interrupt)));

        let mut controller = Controller::new(
            config(),
            sensor_sequence(vec![55.0, 56.0, 57.0]),
            fan_reading(false),
            signals,
        )
        .unwrap();

        assert_eq!(controller.run().unwrap(), TerminationReason::Interrupt);
        assert_eq!(controller.iterations(), 3);
        // Stepping again after shutdown does not touch the capabilities.
        assert_eq!(controller.step().unwrap(), Step::Shutdown(TerminationReason::Interrupt));
    }

    #[test]
    fn test_unexpected_signal_is_ignored() {
        let mut signals = MockShutdownSource::new();
        signals.expect_poll().returning(|_| Ok(Readiness::Ready));
        let mut reads = 0;
        signals.expect_read_and_classify().times(2).returning(move || {
            reads += 1;
            Ok(if reads == 1 { None } else { Some(TerminationReason::Interrupt) })
        });

        let mut controller = Controller::new(
            config(),
            sensor_sequence(vec![50.0, 50.0]),
            fan_reading(false),
            signals,
        )
        .unwrap();

        assert_eq!(controller.step().unwrap(), Step::Continue);
        assert_eq!(controller.step().unwrap(), Step::Shutdown(TerminationReason::Interrupt));
    }

    #[test]
    fn test_poll_failure_is_fatal() {
        let mut signals = MockShutdownSource::new();
        signals
            .expect_poll()
            .times(1)
            .returning(|_| Err(PifanError::SignalPoll(io::Error::from_raw_os_error(libc::EBADF))));

        let mut controller = Controller::new(
            config(),
            sensor_sequence(vec![50.0]),
            fan_reading(false),
            signals,
        )
        .unwrap();

        assert!(matches!(controller.run(), Err(PifanError::SignalPoll(_))));
        assert_eq!(controller.state(), LoopState::Failed);
        assert_eq!(controller.iterations(), 0);
    }

    #[test]
    fn test_short_signal_read_is_fatal() {
        let mut signals = MockShutdownSource::new();
        signals.expect_poll().returning(|_| Ok(Readiness::Ready));
        signals
            .expect_read_and_classify()
            .times(1)
            .returning(|| Err(PifanError::ShortSignalRead { got: 4, expected: 128 }));

        let mut controller = Controller::new(
            config(),
            sensor_sequence(vec![50.0]),
            fan_reading(false),
            signals,
        )
        .unwrap();

        let err = controller.run().unwrap_err();
        assert_eq!(err.class(), crate::error::ErrorClass::Runtime);
        assert_eq!(controller.state(), LoopState::Failed);
    }

    #[test]
    fn test_sensor_failure_holds_fan_on() {
        let mut sensor = MockTemperatureSource::new();
        sensor.expect_read_celsius().returning(|| {
            Err(PifanError::SensorRead {
                path: PathBuf::from("/sys/class/thermal/thermal_zone0/temp"),
                source: io::Error::from_raw_os_error(libc::ENOENT),
            })
        });
        let mut fan = fan_reading(true);
        fan.expect_set().never();
        let mut signals = MockShutdownSource::new();
        signals.expect_poll().returning(|_| Ok(Readiness::Timeout));

        let mut controller = Controller::new(config(), sensor, fan, signals).unwrap();
        for _ in 0..3 {
            assert_eq!(controller.step().unwrap(), Step::Continue);
        }
        assert_eq!(controller.fan_state(), FanState::On);
    }

    #[test]
    fn test_actuator_failure_is_retried() {
        let mut fan = fan_reading(false);
        let mut writes = 0;
        fan.expect_set().with(eq(true)).times(2).returning(move |_| {
            writes += 1;
            if writes == 1 {
                Err(PifanError::LineValue { pin: 14, source: io::Error::from_raw_os_error(libc::EIO) })
            } else {
                Ok(())
            }
        });
        let mut signals = MockShutdownSource::new();
        signals.expect_poll().returning(|_| Ok(Readiness::Timeout));

        let mut controller = Controller::new(
            config(),
            sensor_sequence(vec![72.0, 72.0, 72.0]),
            fan,
            signals,
        )
        .unwrap();

        controller.step().unwrap();
        assert_eq!(controller.fan_state(), FanState::Off);
        controller.step().unwrap();
        assert_eq!(controller.fan_state(), FanState::On);
        controller.step().unwrap();
        assert_eq!(controller.state(), LoopState::Running);
    }
}
