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

//! Shutdown signals as a pollable event source
//!
//! SIGINT and SIGTERM are blocked first, then bound to a signalfd. A signal
//! raised at any point after blocking stays pending on the descriptor until
//! it is read, so the control loop's wait can never miss one that arrives
//! just before it starts waiting. The descriptor is level-triggered: it stays
//! readable for as long as a signal is pending.

use std::fmt;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::raw::{c_int, c_void};
use std::ptr;
use std::time::Duration;

use tracing::debug;

use crate::error::{PifanError, Result};

/// Why the daemon was asked to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// SIGINT
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl TerminationReason {
    pub const ALL: [TerminationReason; 2] = [TerminationReason::Interrupt, TerminationReason::Terminate];

    pub fn from_signo(signo: c_int) -> Option<Self> {
        match signo {
            libc::SIGINT => Some(Self::Interrupt),
            libc::SIGTERM => Some(Self::Terminate),
            _ => None,
        }
    }

    pub fn signo(&self) -> c_int {
        match self {
            Self::Interrupt => libc::SIGINT,
            Self::Terminate => libc::SIGTERM,
        }
    }

    pub fn signal_name(&self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.signal_name())
    }
}

/// Result of one wait on the event source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// A signal record is pending and must be read
    Ready,
    /// Nothing arrived before the timeout
    Timeout,
}

/// Wait multiplexer used by the control loop.
#[cfg_attr(test, mockall::automock)]
pub trait ShutdownSource {
    /// Block for up to `timeout`, waking early when a signal is pending
    fn poll(&mut self, timeout: Duration) -> Result<Readiness>;

    /// Consume one pending signal record.
    ///
    /// Returns `None` for a signal outside the blocked set.
    fn read_and_classify(&mut self) -> Result<Option<TerminationReason>>;
}

// ============================================================================
// Signal mask
// ============================================================================

/// SIGINT and SIGTERM held back from default delivery.
///
/// Restores the previous mask of the calling thread on drop, unless
/// [`BlockedSignals::keep`] was called.
pub struct BlockedSignals {
    set: libc::sigset_t,
    previous: libc::sigset_t,
}

impl BlockedSignals {
    /// Mask the termination signals on the calling thread.
    ///
    /// In the single-threaded daemon this is the process mask.
    pub fn mask_default_handling() -> Result<Self> {
        // SAFETY: sigset_t is plain data; sigemptyset initialises it before use.
        let mut set: libc::sigset_t = unsafe { mem::zeroed() };
        let mut previous: libc::sigset_t = unsafe { mem::zeroed() };

        // SAFETY: both sets are valid, exclusively borrowed sigset_t values.
        unsafe {
            libc::sigemptyset(&mut set);
            for reason in TerminationReason::ALL {
                libc::sigaddset(&mut set, reason.signo());
            }
        }

        // SAFETY: pthread_sigmask only reads `set` and writes `previous`.
        let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, &set, &mut previous) };
        if rc != 0 {
            return Err(PifanError::SignalMask(io::Error::from_raw_os_error(rc)));
        }

        debug!("SIGINT and SIGTERM blocked");
        Ok(Self { set, previous })
    }

    /// Give up the mask restore; the signals stay blocked until exit.
    pub fn keep(self) {
        mem::forget(self);
    }

    pub fn contains(&self, reason: TerminationReason) -> bool {
        // SAFETY: `set` was initialised with sigemptyset.
        unsafe { libc::sigismember(&self.set, reason.signo()) == 1 }
    }
}

impl Drop for BlockedSignals {
    fn drop(&mut self) {
        // SAFETY: `previous` was filled in by pthread_sigmask.
        unsafe {
            libc::pthread_sigmask(libc::SIG_SETMASK, &self.previous, ptr::null_mut());
        }
    }
}

// ============================================================================
// signalfd
// ============================================================================

/// signalfd bound to the blocked termination signals.
///
/// Field order matters: the descriptor is closed before the mask is restored,
/// so a late signal is never delivered with default disposition while the
/// daemon still holds resources.
pub struct ShutdownSignals {
    fd: OwnedFd,
    blocked: BlockedSignals,
}

impl ShutdownSignals {
    /// Block the termination signals and open the event handle
    pub fn install() -> Result<Self> {
        let blocked = BlockedSignals::mask_default_handling()?;
        Self::open(blocked)
    }

    /// Bind an already blocked set to a non-blocking signalfd
    pub fn open(blocked: BlockedSignals) -> Result<Self> {
        // SAFETY: the set is initialised; -1 asks for a new descriptor.
        let fd = unsafe { libc::signalfd(-1, &blocked.set, libc::SFD_NONBLOCK | libc::SFD_CLOEXEC) };
        if fd == -1 {
            return Err(PifanError::SignalFd(io::Error::last_os_error()));
        }
        debug!(fd, "signalfd opened");
        Ok(Self {
            // SAFETY: freshly created descriptor owned by nobody else.
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
            blocked,
        })
    }

    /// Close the signalfd and keep the termination signals blocked.
    ///
    /// Used on the way out of the daemon: a SIGINT or SIGTERM still pending,
    /// or arriving after classification, must not take its default action
    /// before the exit status is reported.
    pub fn close(self) {
        let Self { fd, blocked } = self;
        drop(fd);
        blocked.keep();
        debug!("signalfd closed, termination signals stay blocked");
    }
}

fn timeout_millis(timeout: Duration) -> c_int {
    c_int::try_from(timeout.as_millis()).unwrap_or(c_int::MAX)
}

impl ShutdownSource for ShutdownSignals {
    fn poll(&mut self, timeout: Duration) -> Result<Readiness> {
        let mut pfd = libc::pollfd {
            fd: self.fd.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };

        // SAFETY: one valid pollfd entry.
        let nready = unsafe { libc::poll(&mut pfd, 1, timeout_millis(timeout)) };
        if nready == -1 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                // Stopped and continued (SIGSTOP/SIGCONT); nothing is pending.
                return Ok(Readiness::Timeout);
            }
            return Err(PifanError::SignalPoll(err));
        }
        if nready == 0 {
            return Ok(Readiness::Timeout);
        }
        if pfd.revents & libc::POLLIN != 0 {
            return Ok(Readiness::Ready);
        }
        Err(PifanError::SignalPoll(io::Error::new(
            io::ErrorKind::Other,
            format!("unexpected poll events {:#x} on signalfd", pfd.revents),
        )))
    }

    fn read_and_classify(&mut self) -> Result<Option<TerminationReason>> {
        // SAFETY: signalfd_siginfo is plain data.
        let mut info: libc::signalfd_siginfo = unsafe { mem::zeroed() };
        let expected = mem::size_of::<libc::signalfd_siginfo>();

        // SAFETY: `info` is a writable buffer of exactly `expected` bytes.
        let size = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                &mut info as *mut libc::signalfd_siginfo as *mut c_void,
                expected,
            )
        };
        if size < 0 {
            return Err(PifanError::SignalRead(io::Error::last_os_error()));
        }
        if size as usize != expected {
            return Err(PifanError::ShortSignalRead {
                got: size as usize,
                expected,
            });
        }

        Ok(TerminationReason::from_signo(info.ssi_signo as c_int))
    }
}
