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

//! Fan actuator on a GPIO character device
//!
//! Talks to `/dev/gpiochipN` through the kernel's line-handle ioctl ABI,
//! the same interface libgpiod 1.x uses:
//!
//! 1. open the chip and query its line count (`GPIO_GET_CHIPINFO_IOCTL`)
//! 2. request one line as an output with an initial value
//!    (`GPIO_GET_LINEHANDLE_IOCTL`), which returns a line handle fd
//! 3. get/set the value through the handle fd
//!
//! The handle fd and the chip fd are closed on drop, so a line is released
//! exactly once on every exit path.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::raw::{c_char, c_int};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::constants::paths;
use crate::error::{PifanError, Result};

/// A single binary output driving the fan.
#[cfg_attr(test, mockall::automock)]
pub trait FanActuator {
    /// Current line value, `true` when the fan is powered
    fn get(&mut self) -> Result<bool>;
    fn set(&mut self, on: bool) -> Result<()>;
}

// ============================================================================
// Kernel ABI (include/uapi/linux/gpio.h, v1)
// ============================================================================

const GPIO_MAX_NAME_SIZE: usize = 32;
const GPIOHANDLES_MAX: usize = 64;
const GPIOHANDLE_REQUEST_OUTPUT: u32 = 1 << 1;

#[repr(C)]
struct GpioChipInfo {
    name: [c_char; GPIO_MAX_NAME_SIZE],
    label: [c_char; GPIO_MAX_NAME_SIZE],
    lines: u32,
}

#[repr(C)]
struct GpioHandleRequest {
    lineoffsets: [u32; GPIOHANDLES_MAX],
    flags: u32,
    default_values: [u8; GPIOHANDLES_MAX],
    consumer_label: [c_char; GPIO_MAX_NAME_SIZE],
    lines: u32,
    fd: c_int,
}

#[repr(C)]
struct GpioHandleData {
    values: [u8; GPIOHANDLES_MAX],
}

const GPIO_IOC_MAGIC: u32 = 0xB4;

// asm-generic _IOC encoding (arm, aarch64, x86)
const fn ioc(dir: u32, nr: u32, size: usize) -> u32 {
    (dir << 30) | ((size as u32) << 16) | (GPIO_IOC_MAGIC << 8) | nr
}

const IOC_READ: u32 = 2;
const IOC_READ_WRITE: u32 = 3;

const GPIO_GET_CHIPINFO_IOCTL: u32 = ioc(IOC_READ, 0x01, std::mem::size_of::<GpioChipInfo>());
const GPIO_GET_LINEHANDLE_IOCTL: u32 =
    ioc(IOC_READ_WRITE, 0x03, std::mem::size_of::<GpioHandleRequest>());
const GPIOHANDLE_GET_LINE_VALUES_IOCTL: u32 =
    ioc(IOC_READ_WRITE, 0x08, std::mem::size_of::<GpioHandleData>());
const GPIOHANDLE_SET_LINE_VALUES_IOCTL: u32 =
    ioc(IOC_READ_WRITE, 0x09, std::mem::size_of::<GpioHandleData>());

fn c_chars_to_string(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Copy a label into a fixed, NUL-terminated kernel buffer, truncating if needed.
fn fill_label(dst: &mut [c_char; GPIO_MAX_NAME_SIZE], label: &str) {
    for (slot, byte) in dst
        .iter_mut()
        .zip(label.bytes().take(GPIO_MAX_NAME_SIZE - 1))
    {
        *slot = byte as c_char;
    }
}

/// Check the outcome of a line handle request.
///
/// Must run right after the ioctl, while errno still belongs to it.
fn line_handle_fd(pin: u32, rc: c_int, fd: c_int) -> Result<c_int> {
    if rc == -1 {
        return Err(PifanError::LineRequest {
            pin,
            source: io::Error::last_os_error(),
        });
    }
    if fd < 0 {
        return Err(PifanError::LineRequest {
            pin,
            source: io::Error::new(
                io::ErrorKind::InvalidData,
                format!("kernel returned invalid line handle {}", fd),
            ),
        });
    }
    Ok(fd)
}

// ============================================================================
// Chip and lines
// ============================================================================

/// An open GPIO chip
#[derive(Debug)]
pub struct GpioChip {
    file: File,
    name: String,
    label: String,
    lines: u32,
}

/// A validated line offset on a chip, not yet requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioLine {
    offset: u32,
}

impl GpioChip {
    /// Open a chip by its device name, e.g. `gpiochip0`
    pub fn open(name: &str) -> Result<Self> {
        Self::open_path(name, Path::new(paths::DEV_DIR).join(name))
    }

    pub(crate) fn open_path(name: &str, path: PathBuf) -> Result<Self> {
        let chip_err = |source: io::Error| PifanError::ChipOpen {
            chip: name.to_string(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(chip_err)?;

        // SAFETY: GpioChipInfo is plain old data; all-zero is a valid value.
        let mut info: GpioChipInfo = unsafe { std::mem::zeroed() };
        // SAFETY: the fd is open for the lifetime of `file` and `info` matches the
        // size encoded in the request number.
        let rc = unsafe { libc::ioctl(file.as_raw_fd(), GPIO_GET_CHIPINFO_IOCTL as _, &mut info as *mut GpioChipInfo) };
        if rc == -1 {
            return Err(chip_err(io::Error::last_os_error()));
        }

        let chip = Self {
            file,
            name: c_chars_to_string(&info.name),
            label: c_chars_to_string(&info.label),
            lines: info.lines,
        };
        debug!(chip = %chip.name, label = %chip.label, lines = chip.lines, "opened GPIO chip");
        Ok(chip)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a line by offset
    pub fn line(&self, pin: u32) -> Result<GpioLine> {
        if pin >= self.lines {
            return Err(PifanError::LineUnavailable {
                pin,
                reason: format!("{} only has {} lines", self.name, self.lines),
            });
        }
        Ok(GpioLine { offset: pin })
    }

    /// Take ownership of a line as an output driven to `initial`
    pub fn request_output(&self, line: GpioLine, consumer: &str, initial: bool) -> Result<OutputLine> {
        // SAFETY: GpioHandleRequest is plain old data; all-zero is a valid value.
        let mut req: GpioHandleRequest = unsafe { std::mem::zeroed() };
        req.lineoffsets[0] = line.offset;
        req.flags = GPIOHANDLE_REQUEST_OUTPUT;
        req.default_values[0] = u8::from(initial);
        fill_label(&mut req.consumer_label, consumer);
        req.lines = 1;

        // SAFETY: the chip fd is valid while `self` lives and `req` matches the
        // size encoded in the request number.
        let rc = unsafe { libc::ioctl(self.file.as_raw_fd(), GPIO_GET_LINEHANDLE_IOCTL as _, &mut req as *mut GpioHandleRequest) };
        let fd = line_handle_fd(line.offset, rc, req.fd)?;

        debug!(pin = line.offset, consumer, initial, "requested output line");
        Ok(OutputLine {
            // SAFETY: the kernel handed us a fresh fd that nothing else owns.
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
            pin: line.offset,
        })
    }

    /// Close the chip
    pub fn close(self) {
        debug!(chip = %self.name, "closing GPIO chip");
    }
}

/// A line requested as output. Releasing it hands the line back to the kernel.
#[derive(Debug)]
pub struct OutputLine {
    fd: OwnedFd,
    pin: u32,
}

impl OutputLine {
    pub fn pin(&self) -> u32 {
        self.pin
    }

    pub fn value(&self) -> Result<bool> {
        let mut data = GpioHandleData { values: [0; GPIOHANDLES_MAX] };
        // SAFETY: valid handle fd, buffer size matches the request number.
        let rc = unsafe { libc::ioctl(self.fd.as_raw_fd(), GPIOHANDLE_GET_LINE_VALUES_IOCTL as _, &mut data as *mut GpioHandleData) };
        if rc == -1 {
            return Err(self.value_error());
        }
        Ok(data.values[0] != 0)
    }

    pub fn set_value(&self, on: bool) -> Result<()> {
        let mut data = GpioHandleData { values: [0; GPIOHANDLES_MAX] };
        data.values[0] = u8::from(on);
        // SAFETY: valid handle fd, buffer size matches the request number.
        let rc = unsafe { libc::ioctl(self.fd.as_raw_fd(), GPIOHANDLE_SET_LINE_VALUES_IOCTL as _, &mut data as *mut GpioHandleData) };
        if rc == -1 {
            return Err(self.value_error());
        }
        Ok(())
    }

    fn value_error(&self) -> PifanError {
        PifanError::LineValue {
            pin: self.pin,
            source: io::Error::last_os_error(),
        }
    }

    /// Release the line
    pub fn release(self) {
        debug!(pin = self.pin, "releasing output line");
    }
}

// ============================================================================
// Fan actuator
// ============================================================================

/// Fan transistor on one GPIO line.
///
/// Field order matters: the line handle is dropped before the chip.
#[derive(Debug)]
pub struct GpioFan {
    line: OutputLine,
    chip: GpioChip,
}

impl GpioFan {
    /// Open `chip_name`, then request `pin` as an output held low.
    ///
    /// If the line request fails the chip is closed before returning.
    pub fn acquire(chip_name: &str, pin: u32, consumer: &str, initial: bool) -> Result<Self> {
        let chip = GpioChip::open(chip_name)?;
        let line = chip.line(pin)?;
        let line = chip.request_output(line, consumer, initial)?;
        Ok(Self { line, chip })
    }

    pub fn pin(&self) -> u32 {
        self.line.pin()
    }

    pub fn chip(&self) -> &GpioChip {
        &self.chip
    }

    /// Release the line, then close the chip
    pub fn release(self) {
        let Self { line, chip } = self;
        line.release();
        chip.close();
    }
}

impl FanActuator for GpioFan {
    fn get(&mut self) -> Result<bool> {
        self.line.value()
    }

    fn set(&mut self, on: bool) -> Result<()> {
        self.line.set_value(on)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_abi_struct_sizes() {
        assert_eq!(std::mem::size_of::<GpioChipInfo>(), 68);
        assert_eq!(std::mem::size_of::<GpioHandleRequest>(), 364);
        assert_eq!(std::mem::size_of::<GpioHandleData>(), 64);
    }

    #[test]
    fn test_ioctl_numbers() {
        assert_eq!(GPIO_GET_CHIPINFO_IOCTL, 0x8044_B401);
        assert_eq!(GPIO_GET_LINEHANDLE_IOCTL, 0xC16C_B403);
        assert_eq!(GPIOHANDLE_GET_LINE_VALUES_IOCTL, 0xC040_B408);
        assert_eq!(GPIOHANDLE_SET_LINE_VALUES_IOCTL, 0xC040_B409);
    }

    #[test]
    fn test_fill_label_truncates_and_terminates() {
        let mut buf = [0 as c_char; GPIO_MAX_NAME_SIZE];
        fill_label(&mut buf, "pifan");
        assert_eq!(c_chars_to_string(&buf), "pifan");

        let mut buf = [0 as c_char; GPIO_MAX_NAME_SIZE];
        let long = "x".repeat(64);
        fill_label(&mut buf, &long);
        assert_eq!(c_chars_to_string(&buf).len(), GPIO_MAX_NAME_SIZE - 1);
        assert_eq!(buf[GPIO_MAX_NAME_SIZE - 1], 0);
    }

    #[test]
    fn test_open_missing_chip() {
        let result = GpioChip::open("pifan-test-no-such-chip");
        match result {
            Err(PifanError::ChipOpen { chip, source }) => {
                assert_eq!(chip, "pifan-test-no-such-chip");
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("Expected ChipOpen error, got {:?}", other),
        }
    }

    #[test]
    fn test_open_regular_file_is_not_a_chip() {
        let file = NamedTempFile::new().unwrap();
        let result = GpioChip::open_path("fake", file.path().to_path_buf());
        assert!(matches!(result, Err(PifanError::ChipOpen { .. })));
    }

    #[test]
    fn test_line_handle_without_fd_is_rejected() {
        match line_handle_fd(14, 0, -1) {
            Err(PifanError::LineRequest { pin, source }) => {
                assert_eq!(pin, 14);
                assert_eq!(source.kind(), io::ErrorKind::InvalidData);
                assert!(source.to_string().contains("invalid line handle -1"));
            }
            other => panic!("Expected LineRequest error, got {:?}", other),
        }
        assert_eq!(line_handle_fd(14, 0, 7).unwrap(), 7);
    }

    #[test]
    fn test_acquire_missing_chip_fails_setup() {
        let err = GpioFan::acquire("pifan-test-no-such-chip", 14, "pifan", false).unwrap_err();
        assert_eq!(err.class(), crate::error::ErrorClass::Setup);
    }
}
