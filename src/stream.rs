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

//! Streaming session
//!
//! Configuring -> Opening -> Polling -> Closing. The data channel is owned by
//! this function, so it is released on every exit path including errors.

use std::io::Write;
use std::ops::ControlFlow;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use tracing::{debug, info};

use crate::channel::SampleSource;
use crate::error::{Result, SimtempError};
use crate::format::{render_sample, OutputFormat};
use crate::poll_loop::{Clock, PollLimits, PollLoop, StopReason};
use crate::sysfs::{AttributeStore, ConfigOverrides};

#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    /// Stop after this many samples
    pub count: Option<u64>,
    /// Stop after this much time
    pub duration: Option<Duration>,
    pub overrides: ConfigOverrides,
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// A count or duration bound was reached
    Done,
    /// Stopped by an external interrupt
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub samples: u64,
    pub outcome: StreamOutcome,
}

/// Apply overrides, open the channel and print samples until a bound or an interrupt.
pub fn run_stream<A, S, O, C, W>(
    store: &A,
    open: O,
    opts: &StreamOptions,
    clock: &C,
    cancel: &AtomicBool,
    out: &mut W,
) -> Result<StreamSummary>
where
    A: AttributeStore + ?Sized,
    S: SampleSource,
    O: FnOnce() -> Result<S>,
    C: Clock + ?Sized,
    W: Write,
{
    debug!(state = "configuring", overrides = ?opts.overrides);
    opts.overrides.apply(store)?;

    debug!(state = "opening");
    let mut channel = open()?;

    debug!(state = "polling", count = ?opts.count, duration = ?opts.duration);
    let limits = PollLimits { max_samples: opts.count, duration: opts.duration };
    let report = PollLoop::new(clock)
        .limits(limits)
        .cancel_on(cancel)
        .run(&mut channel, |sample, _| {
            let line = render_sample(sample, opts.format)?;
            writeln!(out, "{}", line)
                .map_err(|e| SimtempError::Report(e.to_string()))?;
            Ok(ControlFlow::Continue(()))
        });

    debug!(state = "closing");
    drop(channel);
    let report = report?;

    let outcome = match report.stop {
        StopReason::Interrupted => StreamOutcome::Interrupted,
        _ => StreamOutcome::Done,
    };
    info!(samples = report.samples, ?outcome, "stream finished");
    Ok(StreamSummary { samples: report.samples, outcome })
}
