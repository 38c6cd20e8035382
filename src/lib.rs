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

//! Simtemp - control and monitoring CLI for the simulated temperature sensor
//!
//! The driver exposes configuration as sysfs attributes and streams binary
//! sample records through a character device. This library configures an
//! instance, streams decoded samples, and runs a threshold alert self-test
//! that always puts the original configuration back.

pub mod constants;
pub mod error;
pub mod sysfs;
pub mod sample;
pub mod channel;
pub mod poll_loop;
pub mod format;
pub mod stream;
pub mod selftest;
pub mod logger;

#[cfg(test)]
pub mod test_utils;

pub use error::{Result, SimtempError};
