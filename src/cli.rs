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

//! Command line handling
//!
//! Short options only, parsed the way getopt(3) does with the option string
//! `chi:l:np:u:v`: flags may be clustered (`-nc`), option arguments may be
//! attached (`-i5`) or separate (`-i 5`), and `--` ends option parsing.
//! `-c`, `-h` and `-v` take effect as soon as they are seen.

use std::str::FromStr;

use crate::config::Config;
use crate::constants::{defaults, BINARY_NAME, VERSION};
use crate::error::{PifanError, Result};

/// What the process was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `-c`: print the CPU temperature and exit
    PrintTemperature,
    /// `-h`
    Help,
    /// `-v`
    Version,
    /// Run the controller
    Run(Config),
}

pub fn usage() -> String {
    format!(
        "Usage\n\
         \x20 {name} [options]\n\
         \n\
         Options\n\
         \x20 -c                print the cpu temperature\n\
         \x20 -h                show available options\n\
         \x20 -i interval       sleep interval (default: {interval} seconds)\n\
         \x20 -l threshold      lower threshold (default: {min}°C)\n\
         \x20 -n                don't fork into background\n\
         \x20 -p pin            gpio pin (default: {pin})\n\
         \x20 -u threshold      upper threshold (default: {max}°C)\n\
         \x20 -v                print version\n",
        name = BINARY_NAME,
        interval = defaults::INTERVAL_SECS,
        min = defaults::LOWER_THRESHOLD,
        pin = defaults::PIN,
        max = defaults::UPPER_THRESHOLD,
    )
}

pub fn version() -> String {
    format!("{} version {}", BINARY_NAME, VERSION)
}

fn parse_value<T: FromStr>(opt: char, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| PifanError::usage(format!("invalid argument '{}' for option -- '{}'", raw, opt)))
}

/// Parse the arguments following the program name
pub fn parse<I, S>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut config = Config::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let arg = arg.as_ref();
        if arg == "--" {
            break;
        }
        // Operands are ignored, as getopt(3) would leave them to the caller.
        let Some(cluster) = arg.strip_prefix('-').filter(|rest| !rest.is_empty()) else {
            continue;
        };

        for (pos, opt) in cluster.char_indices() {
            match opt {
                'c' => return Ok(Command::PrintTemperature),
                'h' => return Ok(Command::Help),
                'v' => return Ok(Command::Version),
                'n' => config.daemonize = false,
                'i' | 'l' | 'p' | 'u' => {
                    let attached = &cluster[pos + opt.len_utf8()..];
                    let value = if attached.is_empty() {
                        match args.next() {
                            Some(next) => next.as_ref().to_string(),
                            None => {
                                return Err(PifanError::usage(format!(
                                    "option requires an argument -- '{}'",
                                    opt
                                )))
                            }
                        }
                    } else {
                        attached.to_string()
                    };

                    match opt {
                        'i' => config.interval = parse_value(opt, &value)?,
                        'l' => config.min = parse_value(opt, &value)?,
                        'p' => config.pin = parse_value(opt, &value)?,
                        _ => config.max = parse_value(opt, &value)?,
                    }
                    // The rest of the cluster was the argument.
                    break;
                }
                other => {
                    return Err(PifanError::usage(format!("invalid option -- '{}'", other)));
                }
            }
        }
    }

    config.validate()?;
    Ok(Command::Run(config))
}
