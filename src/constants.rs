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

//! Constants and defaults for simtemp
//!
//! Paths, attribute names and protocol values live here so the rest of the
//! crate never carries magic numbers.

use std::time::Duration;

/// Filesystem locations exposed by the driver
pub mod paths {
    /// Class directory holding one `simtempN` directory per instance
    pub const SYSFS_ROOT: &str = "/sys/class/simtemp";

    /// Character device streaming binary sample records
    pub const CHAR_DEVICE: &str = "/dev/nxp_simtemp";

    /// Instance directories are matched by this name prefix
    pub const INSTANCE_PREFIX: &str = "simtemp";
}

/// Attribute file names under an instance directory
pub mod attr {
    /// Sampling period in microseconds (newer driver revisions)
    pub const SAMPLING_US: &str = "sampling_us";
    /// Sampling period in milliseconds (always present)
    pub const SAMPLING_MS: &str = "sampling_ms";
    /// Alert threshold in milli-degrees Celsius
    pub const THRESHOLD_MC: &str = "threshold_mC";
    /// Simulation mode: `normal`, `noisy` or `ramp`
    pub const MODE: &str = "mode";
}

/// Binary sample record layout: `u64 timestamp_ns | i32 temp_mC | u32 flags`, little-endian
pub mod record {
    pub const SIZE: usize = 16;

    pub const TIMESTAMP_OFFSET: usize = 0;
    pub const TEMP_OFFSET: usize = 8;
    pub const FLAGS_OFFSET: usize = 12;

    /// Bit 0: a fresh sample was produced
    pub const FLAG_NEW_SAMPLE: u32 = 1 << 0;
    /// Bit 1: the sample crossed the configured threshold
    pub const FLAG_ALERT: u32 = 1 << 1;
}

/// Poll loop timing
pub mod polling {
    use super::Duration;

    /// Upper bound on a single readiness wait
    pub const WAKE_TIMEOUT: Duration = Duration::from_millis(1000);

    /// Shortest wait issued while a deadline is still pending
    pub const MIN_WAKE: Duration = Duration::from_millis(50);
}

/// Self-test defaults
pub mod selftest {
    use super::Duration;

    /// Threshold written for the test when none is requested (milli-degrees)
    pub const DEFAULT_THRESHOLD_MC: i32 = 20_000;

    /// Sampling periods to wait for an alert before failing
    pub const DEFAULT_MAX_PERIODS: u32 = 2;

    /// Floor for the alert deadline so very fast sampling still gets a fair window
    pub const MIN_DEADLINE: Duration = Duration::from_millis(500);
}

/// Unit conversions
pub mod units {
    pub const MICROS_PER_MILLI: u64 = 1_000;
    pub const MILLIDEGREE_DIVISOR: f64 = 1_000.0;
}

/// Process exit codes
pub mod exit {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const USAGE: i32 = 2;
}

/// Environment variables consulted by the binary
pub mod env {
    pub const LOG_FILTER: &str = "SIMTEMP_LOG";
    pub const SYSFS_ROOT: &str = "SIMTEMP_SYSFS_ROOT";
    pub const DEVICE: &str = "SIMTEMP_DEVICE";
}
