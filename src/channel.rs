/*
 * This file is part of Simtemp.
 *
 * Copyright (C) 2025 Simtemp contributors
 *
 * Simtemp is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Simtemp is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Simtemp. If not, see <https://www.gnu.org/licenses/>.
 */

//! Data channel access
//!
//! The character device is opened read-only and non-blocking. Readiness is
//! observed with `poll(2)` for `POLLIN | POLLPRI`; each read asks for exactly
//! one record.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{Result, SimtempError};
use crate::sample::Sample;

/// A source of fixed-size records with a bounded readiness wait.
pub trait SampleSource {
    /// Block until readable or `timeout` elapses. `Ok(false)` means nothing is ready.
    fn wait_readable(&mut self, timeout: Duration) -> Result<bool>;

    /// Read at most one record into `buf`, returning the byte count.
    /// A non-blocking read with no data returns `Ok(0)`.
    fn read_record(&mut self, buf: &mut [u8; Sample::SIZE]) -> Result<usize>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn wait_readable(&mut self, timeout: Duration) -> Result<bool> {
        (**self).wait_readable(timeout)
    }

    fn read_record(&mut self, buf: &mut [u8; Sample::SIZE]) -> Result<usize> {
        (**self).read_record(buf)
    }
}

/// The simtemp character device. Closed when dropped.
#[derive(Debug)]
pub struct CharDevice {
    file: File,
    path: PathBuf,
}

impl CharDevice {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|source| SimtempError::ChannelOpen { path: path.to_path_buf(), source })?;
        debug!(device = %path.display(), "data channel opened");
        Ok(Self { file, path: path.to_path_buf() })
    }
}

impl SampleSource for CharDevice {
    fn wait_readable(&mut self, timeout: Duration) -> Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN | libc::POLLPRI,
            revents: 0,
        };
        let timeout_ms = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);

        // SAFETY: pfd is a single valid pollfd for a descriptor owned by self.file,
        // and nfds is 1 to match.
        let ready = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                trace!("poll interrupted by signal");
                return Ok(false);
            }
            return Err(err.into());
        }
        Ok(ready > 0)
    }

    fn read_record(&mut self, buf: &mut [u8; Sample::SIZE]) -> Result<usize> {
        match self.file.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for CharDevice {
    fn drop(&mut self) {
        debug!(device = %self.path.display(), "data channel closed");
    }
}
