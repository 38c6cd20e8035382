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

//! Sysfs attribute access for one simtemp instance
//!
//! Instance discovery, the attribute store abstraction and the sampling
//! period unit fallback (`sampling_us` preferred, `sampling_ms` on older
//! driver revisions).

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info};

use crate::channel::CharDevice;
use crate::constants::{attr, paths, units};
use crate::error::{Result, SimtempError};

/// Named text attribute storage for one device instance.
#[cfg_attr(test, mockall::automock)]
pub trait AttributeStore {
    /// Read an attribute with surrounding whitespace removed.
    fn read_text(&self, name: &str) -> Result<String>;

    /// Write `value` followed by exactly one newline.
    fn write(&self, name: &str, value: &str) -> Result<()>;

    fn read_int(&self, name: &str) -> Result<i64> {
        let raw = self.read_text(name)?;
        raw.parse::<i64>().map_err(|_| SimtempError::InvalidAttribute {
            name: name.to_string(),
            value: raw,
        })
    }
}

/// Simulation mode exposed through the `mode` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    Normal,
    Noisy,
    Ramp,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Noisy => "noisy",
            Mode::Ramp => "ramp",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = SimtempError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "normal" => Ok(Mode::Normal),
            "noisy" => Ok(Mode::Noisy),
            "ramp" => Ok(Mode::Ramp),
            other => Err(SimtempError::InvalidMode(other.to_string())),
        }
    }
}

/// Requested sampling period, in whichever unit the operator gave it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingPeriod {
    Micros(u64),
    Millis(u64),
}

impl SamplingPeriod {
    pub fn as_micros(&self) -> u64 {
        match *self {
            SamplingPeriod::Micros(us) => us,
            SamplingPeriod::Millis(ms) => ms.saturating_mul(units::MICROS_PER_MILLI),
        }
    }
}

/// Snapshot of the writable configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub sampling_us: u64,
    pub threshold_mc: i32,
    pub mode: Mode,
}

impl DeviceConfig {
    /// Read the full configuration before anything is changed.
    pub fn snapshot<A: AttributeStore + ?Sized>(store: &A) -> Result<Self> {
        let sampling_us = read_sampling_us(store)?;
        let threshold_mc = read_threshold(store)?;
        let mode = store.read_text(attr::MODE)?.parse()?;
        Ok(Self { sampling_us, threshold_mc, mode })
    }
}

/// Configuration changes requested on the command line; `None` leaves a field alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub sampling: Option<SamplingPeriod>,
    pub threshold_mc: Option<i32>,
    pub mode: Option<Mode>,
}

impl ConfigOverrides {
    /// Write every requested field: sampling, then threshold, then mode.
    pub fn apply<A: AttributeStore + ?Sized>(&self, store: &A) -> Result<()> {
        if let Some(period) = self.sampling {
            write_sampling(store, period)?;
        }
        if let Some(threshold) = self.threshold_mc {
            store.write(attr::THRESHOLD_MC, &threshold.to_string())?;
        }
        if let Some(mode) = self.mode {
            store.write(attr::MODE, mode.as_str())?;
        }
        Ok(())
    }
}

/// Write the sampling period.
///
/// Microseconds go to `sampling_us`; if that attribute does not exist the
/// value is converted to whole milliseconds (never below 1) and written to
/// `sampling_ms`. Millisecond requests are written to `sampling_ms` directly.
pub fn write_sampling<A: AttributeStore + ?Sized>(store: &A, period: SamplingPeriod) -> Result<()> {
    let ms = match period {
        SamplingPeriod::Micros(us) => match store.write(attr::SAMPLING_US, &us.to_string()) {
            Ok(()) => return Ok(()),
            Err(e) if e.is_not_found() => {
                let ms = micros_to_millis(us);
                info!(sampling_us = us, sampling_ms = ms, "sampling_us missing, falling back to sampling_ms");
                ms
            }
            Err(e) => return Err(e),
        },
        SamplingPeriod::Millis(ms) => ms,
    };
    store.write(attr::SAMPLING_MS, &ms.to_string())
}

/// Read the sampling period in microseconds, falling back to `sampling_ms`.
pub fn read_sampling_us<A: AttributeStore + ?Sized>(store: &A) -> Result<u64> {
    match store.read_int(attr::SAMPLING_US) {
        Ok(us) => non_negative(attr::SAMPLING_US, us),
        Err(e) if e.is_not_found() => {
            debug!("sampling_us missing, reading sampling_ms");
            let ms = non_negative(attr::SAMPLING_MS, store.read_int(attr::SAMPLING_MS)?)?;
            Ok(ms.saturating_mul(units::MICROS_PER_MILLI))
        }
        Err(e) => Err(e),
    }
}

fn read_threshold<A: AttributeStore + ?Sized>(store: &A) -> Result<i32> {
    let raw = store.read_int(attr::THRESHOLD_MC)?;
    i32::try_from(raw).map_err(|_| SimtempError::InvalidAttribute {
        name: attr::THRESHOLD_MC.to_string(),
        value: raw.to_string(),
    })
}

fn non_negative(name: &str, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| SimtempError::InvalidAttribute {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Truncating microsecond to millisecond conversion, floored at 1 ms.
pub fn micros_to_millis(us: u64) -> u64 {
    (us / units::MICROS_PER_MILLI).max(1)
}

/// Attribute store backed by files in a sysfs instance directory
#[derive(Debug, Clone)]
pub struct SysfsAttributes {
    dir: PathBuf,
}

impl SysfsAttributes {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn attr_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl AttributeStore for SysfsAttributes {
    fn read_text(&self, name: &str) -> Result<String> {
        let path = self.attr_path(name);
        let content = fs::read_to_string(&path).map_err(|e| SimtempError::attribute_read(name, &path, e))?;
        Ok(content.trim().to_string())
    }

    fn write(&self, name: &str, value: &str) -> Result<()> {
        let path = self.attr_path(name);
        // sysfs attributes cannot be created, so never create here either
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| SimtempError::attribute_write(name, &path, e))?;
        file.write_all(format!("{}\n", value).as_bytes())
            .map_err(|e| SimtempError::attribute_write(name, &path, e))?;
        debug!(attr = name, value, "attribute written");
        Ok(())
    }
}

/// One selected device instance: its attribute directory and its data channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub sysfs_dir: PathBuf,
    pub char_device: PathBuf,
}

impl DeviceHandle {
    /// Select instance `index` from the lexicographically sorted `simtemp*`
    /// directories under `sysfs_root`.
    pub fn resolve(sysfs_root: &Path, index: usize, char_device: Option<PathBuf>) -> Result<Self> {
        if !sysfs_root.exists() {
            return Err(SimtempError::SysfsRootMissing(sysfs_root.to_path_buf()));
        }

        let devices = list_instances(sysfs_root)?;
        if devices.is_empty() {
            return Err(SimtempError::NoDevices(sysfs_root.to_path_buf()));
        }
        let max = devices.len() - 1;
        let sysfs_dir = devices
            .into_iter()
            .nth(index)
            .ok_or(SimtempError::IndexOutOfRange { index, max })?;

        let char_device = char_device.unwrap_or_else(|| PathBuf::from(paths::CHAR_DEVICE));
        debug!(dir = %sysfs_dir.display(), device = %char_device.display(), "resolved simtemp instance");
        Ok(Self { sysfs_dir, char_device })
    }

    pub fn attributes(&self) -> SysfsAttributes {
        SysfsAttributes::new(&self.sysfs_dir)
    }

    /// Open the data channel read-only and non-blocking.
    pub fn open_channel(&self) -> Result<CharDevice> {
        CharDevice::open(&self.char_device)
    }
}

fn list_instances(root: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(root).map_err(|e| SimtempError::attribute_read("sysfs root", root, e))?;
    let mut devices: Vec<PathBuf> = entries
        .flatten()
        .filter(|ent| ent.file_name().to_string_lossy().starts_with(paths::INSTANCE_PREFIX))
        .map(|ent| ent.path())
        .filter(|p| p.is_dir())
        .collect();
    devices.sort();
    Ok(devices)
}
