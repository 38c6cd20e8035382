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

//! Sample record decoding
//!
//! The character device hands out fixed 16-byte little-endian records:
//!
//! | bytes | field          | type |
//! |-------|----------------|------|
//! | 0..8  | timestamp (ns) | u64  |
//! | 8..12 | temperature mC | i32  |
//! | 12..16| flags          | u32  |

use serde::Serialize;

use crate::constants::{record, units};

/// One decoded sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sample {
    pub timestamp_ns: u64,
    pub temp_mc: i32,
    pub flags: u32,
}

impl Sample {
    pub const SIZE: usize = record::SIZE;

    /// Decode exactly one record.
    pub fn decode(raw: &[u8; Self::SIZE]) -> Self {
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&raw[record::TIMESTAMP_OFFSET..record::TEMP_OFFSET]);
        let mut temp = [0u8; 4];
        temp.copy_from_slice(&raw[record::TEMP_OFFSET..record::FLAGS_OFFSET]);
        let mut flags = [0u8; 4];
        flags.copy_from_slice(&raw[record::FLAGS_OFFSET..record::SIZE]);

        Self {
            timestamp_ns: u64::from_le_bytes(ts),
            temp_mc: i32::from_le_bytes(temp),
            flags: u32::from_le_bytes(flags),
        }
    }

    /// Decode from a read buffer; short buffers are "no data yet".
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let raw: &[u8; Self::SIZE] = data.get(..Self::SIZE)?.try_into().ok()?;
        Some(Self::decode(raw))
    }

    /// Encode back to the wire layout. Used by fakes and tests.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[record::TIMESTAMP_OFFSET..record::TEMP_OFFSET].copy_from_slice(&self.timestamp_ns.to_le_bytes());
        out[record::TEMP_OFFSET..record::FLAGS_OFFSET].copy_from_slice(&self.temp_mc.to_le_bytes());
        out[record::FLAGS_OFFSET..record::SIZE].copy_from_slice(&self.flags.to_le_bytes());
        out
    }

    pub fn is_alert(&self) -> bool {
        self.flags & record::FLAG_ALERT != 0
    }

    pub fn is_new_sample(&self) -> bool {
        self.flags & record::FLAG_NEW_SAMPLE != 0
    }

    /// Temperature in degrees Celsius
    pub fn temp_c(&self) -> f64 {
        self.temp_mc as f64 / units::MILLIDEGREE_DIVISOR
    }
}
