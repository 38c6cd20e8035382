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

//! Unified error handling for simtemp
//!
//! A single error type shared by the attribute store, the data channel and
//! both sessions. `is_not_found` drives the sampling unit fallback and
//! `exit_code` maps errors onto the process exit status.

use std::io;
use std::path::PathBuf;

use crate::constants::exit;

/// Result type alias using SimtempError
pub type Result<T> = std::result::Result<T, SimtempError>;

/// Unified error type for all simtemp operations
#[derive(thiserror::Error, Debug)]
pub enum SimtempError {
    // ============================================================================
    // Discovery Errors
    // ============================================================================
    #[error("sysfs root {0} does not exist")]
    SysfsRootMissing(PathBuf),

    #[error("no simtemp devices under {0}")]
    NoDevices(PathBuf),

    #[error("requested device index {index} out of range (0-{max})")]
    IndexOutOfRange {
        index: usize,
        max: usize,
    },

    // ============================================================================
    // Attribute Errors
    // ============================================================================
    #[error("attribute {name} not found at {path}")]
    AttributeMissing {
        name: String,
        path: PathBuf,
    },

    #[error("Failed to read attribute {path}: {source}")]
    AttributeRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write attribute {path}: {source}")]
    AttributeWrite {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Invalid value for attribute {name}: {value:?}")]
    InvalidAttribute {
        name: String,
        value: String,
    },

    #[error("Invalid mode: {0} (expected normal, noisy or ramp)")]
    InvalidMode(String),

    // ============================================================================
    // Data Channel Errors
    // ============================================================================
    #[error("Failed to open data channel {path}: {source}")]
    ChannelOpen {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Data channel I/O error: {0}")]
    Channel(#[from] io::Error),

    // ============================================================================
    // Session Errors
    // ============================================================================
    #[error("Interrupted before the self-test completed")]
    Interrupted,

    #[error("Failed to write report: {0}")]
    Report(String),
}

impl SimtempError {
    /// True when the failure means "this attribute/device does not exist".
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::AttributeMissing { .. } | Self::SysfsRootMissing(_) | Self::NoDevices(_) => true,
            Self::AttributeRead { source, .. } | Self::AttributeWrite { source, .. } => {
                source.kind() == io::ErrorKind::NotFound
            }
            Self::ChannelOpen { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Process exit code for this error.
    ///
    /// Missing devices, attributes and out-of-range indexes are configuration
    /// problems and share the usage code; everything else is a runtime failure.
    pub fn exit_code(&self) -> i32 {
        if self.is_not_found() || matches!(self, Self::IndexOutOfRange { .. }) {
            exit::USAGE
        } else {
            exit::FAILURE
        }
    }

    /// Create an attribute read error, promoting NotFound to `AttributeMissing`
    pub fn attribute_read(name: &str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::AttributeMissing { name: name.to_string(), path }
        } else {
            Self::AttributeRead { path, source }
        }
    }

    /// Create an attribute write error, promoting NotFound to `AttributeMissing`
    pub fn attribute_write(name: &str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::AttributeMissing { name: name.to_string(), path }
        } else {
            Self::AttributeWrite { path, source }
        }
    }
}
