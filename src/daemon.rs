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

//! Detaching from the controlling terminal
//!
//! Fork and let the parent exit, then start a new session in the child with
//! a cleared umask, `/` as working directory and the standard streams on
//! `/dev/null`. Must run before any other thread exists.

use std::fs::OpenOptions;
use std::io;
use std::os::fd::AsRawFd;

use tracing::debug;

use crate::constants::paths;
use crate::error::{PifanError, Result};

fn step_err(step: &'static str) -> PifanError {
    PifanError::Daemonize {
        step,
        source: io::Error::last_os_error(),
    }
}

/// Fork into the background. Returns in the child only.
pub fn daemonize() -> Result<()> {
    // SAFETY: called from the single-threaded startup path, before any
    // resource that must not be shared with a child has been acquired.
    match unsafe { libc::fork() } {
        -1 => return Err(step_err("fork daemon")),
        0 => {}
        // SAFETY: _exit skips atexit handlers and destructors that belong to the child.
        _ => unsafe { libc::_exit(libc::EXIT_SUCCESS) },
    }

    // SAFETY: umask only sets the file creation mask.
    unsafe { libc::umask(0) };

    // SAFETY: setsid has no memory-safety preconditions.
    if unsafe { libc::setsid() } < 0 {
        return Err(step_err("create a new sid"));
    }

    std::env::set_current_dir("/").map_err(|source| PifanError::Daemonize {
        step: "change directory to \"/\"",
        source,
    })?;

    redirect_std_streams()?;
    debug!(pid = std::process::id(), "detached from terminal");
    Ok(())
}

fn redirect_std_streams() -> Result<()> {
    let null = OpenOptions::new()
        .read(true)
        .write(true)
        .open(paths::DEV_NULL)
        .map_err(|source| PifanError::Daemonize {
            step: "open \"/dev/null\"",
            source,
        })?;

    for target in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        // SAFETY: both descriptors are valid; dup2 atomically replaces `target`.
        if unsafe { libc::dup2(null.as_raw_fd(), target) } == -1 {
            return Err(step_err("redirect standard streams"));
        }
    }
    Ok(())
}
