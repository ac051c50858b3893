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

use std::process::ExitCode;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use pifan::cli::{self, Command};
use pifan::constants::{gpio, BINARY_NAME, VERSION};
use pifan::{daemon, logging};
use pifan::{Config, Controller, GpioFan, ShutdownSignals, TemperatureSource, TerminationReason, ThermalZone};

fn main() -> ExitCode {
    let command = match cli::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}: {}", BINARY_NAME, e);
            print!("{}", cli::usage());
            return ExitCode::FAILURE;
        }
    };

    match command {
        Command::Help => {
            print!("{}", cli::usage());
            ExitCode::SUCCESS
        }
        Command::Version => {
            println!("{}", cli::version());
            ExitCode::SUCCESS
        }
        Command::PrintTemperature => match ThermalZone::cpu().read_celsius() {
            Ok(temp) => {
                println!("cpu temp: {:.2}°C", temp);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", BINARY_NAME, e);
                ExitCode::FAILURE
            }
        },
        Command::Run(config) => {
            let target = logging::init();
            debug!(?target, "logging initialised");
            if config.daemonize && !target.survives_detach() {
                warn!(
                    "systemd journal not available, log output is discarded once detached; \
                     run with -n to keep it on stderr"
                );
            }
            match run(config) {
                Ok(reason) => {
                    info!(signal = reason.signal_name(), "{} stopped", BINARY_NAME);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("{:#}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

/// Acquire everything in order, run the loop, release everything.
fn run(config: Config) -> Result<TerminationReason> {
    if config.daemonize {
        daemon::daemonize()?;
    }

    // Anything acquired before a failing step is dropped on the way out.
    let signals = ShutdownSignals::install()?;
    let fan = GpioFan::acquire(gpio::CHIP_NAME, config.pin, BINARY_NAME, gpio::INITIAL_VALUE)?;

    info!(
        pin = fan.pin(),
        interval = config.interval,
        min = config.min,
        max = config.max,
        chip = fan.chip().name(),
        "{} {} started",
        BINARY_NAME,
        VERSION
    );

    let mut controller = Controller::new(config, ThermalZone::cpu(), fan, signals)?;
    let outcome = controller.run();

    let (_sensor, fan, signals) = controller.into_parts();
    fan.release();
    // Leave SIGINT/SIGTERM blocked so a late one cannot override the exit status.
    signals.close();

    Ok(outcome?)
}
