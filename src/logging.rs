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

//! Logging setup
//!
//! Notices go to the systemd journal when its socket exists and always to
//! stderr as well, which ends up in `/dev/null` once the daemon detaches.
//! `info` events are stored by journald with notice priority.

use std::path::Path;

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::constants::{paths, BINARY_NAME, DEFAULT_LOG_LEVEL, LOG_ENV};

/// Where log records end up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    JournalAndStderr,
    Stderr,
}

impl LogTarget {
    /// Whether records still reach a sink after stderr moves to `/dev/null`
    pub fn survives_detach(&self) -> bool {
        matches!(self, Self::JournalAndStderr)
    }
}

/// Resolve the filter directive from `PIFAN_LOG`
pub fn log_level() -> String {
    std::env::var(LOG_ENV)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

/// Install the global subscriber. Call once, before daemonizing.
pub fn init() -> LogTarget {
    let level = log_level();

    let journald = if Path::new(paths::JOURNALD_SOCKET).exists() {
        match tracing_journald::layer() {
            Ok(layer) => Some(layer.with_syslog_identifier(BINARY_NAME.to_string())),
            Err(e) => {
                eprintln!("{}: journald unavailable ({}), logging to stderr only", BINARY_NAME, e);
                None
            }
        }
    } else {
        None
    };
    let target = if journald.is_some() {
        LogTarget::JournalAndStderr
    } else {
        LogTarget::Stderr
    };

    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    let installed = tracing_subscriber::registry()
        .with(env_filter(&level))
        .with(journald)
        .with(stderr)
        .try_init();
    if let Err(e) = installed {
        eprintln!("{}: logging already initialised: {}", BINARY_NAME, e);
    }

    target
}
