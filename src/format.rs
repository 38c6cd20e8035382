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

//! Human-readable and JSON rendering of samples and self-test verdicts

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::error::{Result, SimtempError};
use crate::sample::Sample;

/// Output style for streamed samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// UTC ISO-8601 with millisecond precision, e.g. `2025-01-01T00:00:00.123+00:00`
pub fn iso8601_from_ns(ns: u64) -> String {
    let secs = (ns / 1_000_000_000) as i64;
    let nanos = (ns % 1_000_000_000) as u32;
    match DateTime::<Utc>::from_timestamp(secs, nanos) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, false),
        None => format!("{}ns", ns),
    }
}

pub fn sample_line(sample: &Sample) -> String {
    format!(
        "{} temp={:.1}C alert={} flags=0x{:02x}",
        iso8601_from_ns(sample.timestamp_ns),
        sample.temp_c(),
        u8::from(sample.is_alert()),
        sample.flags
    )
}

/// One JSON output line: the raw record plus its decoded fields
#[derive(Debug, Serialize)]
struct SampleLine<'a> {
    #[serde(flatten)]
    sample: &'a Sample,
    timestamp: String,
    temp_c: f64,
    alert: bool,
    new_sample: bool,
}

impl<'a> From<&'a Sample> for SampleLine<'a> {
    fn from(sample: &'a Sample) -> Self {
        Self {
            sample,
            timestamp: iso8601_from_ns(sample.timestamp_ns),
            temp_c: sample.temp_c(),
            alert: sample.is_alert(),
            new_sample: sample.is_new_sample(),
        }
    }
}

pub fn sample_json(sample: &Sample) -> Result<String> {
    serde_json::to_string(&SampleLine::from(sample)).map_err(|e| SimtempError::Report(e.to_string()))
}

pub fn render_sample(sample: &Sample, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(sample_line(sample)),
        OutputFormat::Json => sample_json(sample),
    }
}

pub fn pass_line(samples: u64, sample: &Sample) -> String {
    format!(
        "PASS: alert observed after {} sample(s) at {} temp={:.1}C flags=0x{:02x}",
        samples,
        iso8601_from_ns(sample.timestamp_ns),
        sample.temp_c(),
        sample.flags
    )
}

pub fn fail_line(max_periods: u32, sampling_us: u64) -> String {
    format!(
        "FAIL: no threshold alert within {} period(s) (sampling_us={})",
        max_periods, sampling_us
    )
}
