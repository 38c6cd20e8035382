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

//! Threshold alert self-test
//!
//! Snapshotting -> Configuring -> Opening -> Polling -> Evaluating -> Restoring -> Done.
//!
//! The restore step is owned by [`RestoreGuard`], armed right after the
//! snapshot. Every path out of Configuring and later goes through it exactly
//! once: explicitly on normal return, or from `Drop` while unwinding. A
//! failed restore replaces whatever verdict the test produced.
//!
//! The threshold is always written back. Sampling period and mode are only
//! written back when the test overrode them.

use std::ops::ControlFlow;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::channel::SampleSource;
use crate::constants::{attr, exit, selftest};
use crate::error::{Result, SimtempError};
use crate::format::{fail_line, pass_line};
use crate::poll_loop::{Clock, PollLimits, PollLoop, StopReason};
use crate::sample::Sample;
use crate::sysfs::{write_sampling, AttributeStore, DeviceConfig, Mode, SamplingPeriod};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfTestOptions {
    pub sampling: Option<SamplingPeriod>,
    pub mode: Option<Mode>,
    /// Threshold used while testing; defaults to [`selftest::DEFAULT_THRESHOLD_MC`]
    pub threshold_mc: Option<i32>,
    pub max_periods: u32,
}

impl Default for SelfTestOptions {
    fn default() -> Self {
        Self {
            sampling: None,
            mode: None,
            threshold_mc: None,
            max_periods: selftest::DEFAULT_MAX_PERIODS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Snapshotting,
    Configuring,
    Opening,
    Polling,
    Evaluating,
    Restoring,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// An alert sample arrived before the deadline
    Pass(Sample),
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfTestReport {
    pub verdict: Verdict,
    /// Samples delivered before the loop stopped
    pub samples: u64,
    pub max_periods: u32,
    /// Sampling period the deadline was derived from
    pub sampling_us: u64,
    pub threshold_mc: i32,
    pub deadline: Duration,
    /// Configuration restored at the end of the run
    pub original: DeviceConfig,
}

impl SelfTestReport {
    pub fn passed(&self) -> bool {
        matches!(self.verdict, Verdict::Pass(_))
    }

    pub fn sample(&self) -> Option<Sample> {
        match self.verdict {
            Verdict::Pass(sample) => Some(sample),
            Verdict::Fail => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            exit::SUCCESS
        } else {
            exit::FAILURE
        }
    }

    pub fn summary(&self) -> String {
        match self.verdict {
            Verdict::Pass(sample) => pass_line(self.samples, &sample),
            Verdict::Fail => fail_line(self.max_periods, self.sampling_us),
        }
    }
}

/// Time allowed for an alert: `max_periods` sampling periods, never under 500 ms.
pub fn alert_deadline(sampling_us: u64, max_periods: u32) -> Duration {
    Duration::from_micros(sampling_us.saturating_mul(u64::from(max_periods))).max(selftest::MIN_DEADLINE)
}

/// Which attributes the restore step writes back besides the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RestorePlan {
    sampling: bool,
    mode: bool,
}

struct RestoreGuard<'a, A: AttributeStore + ?Sized> {
    store: &'a A,
    original: DeviceConfig,
    plan: RestorePlan,
    pending: bool,
}

impl<'a, A: AttributeStore + ?Sized> RestoreGuard<'a, A> {
    fn arm(store: &'a A, original: DeviceConfig, plan: RestorePlan) -> Self {
        Self { store, original, plan, pending: true }
    }

    fn restore(mut self) -> Result<DeviceConfig> {
        self.pending = false;
        restore_config(self.store, &self.original, self.plan)?;
        Ok(self.original.clone())
    }
}

impl<A: AttributeStore + ?Sized> Drop for RestoreGuard<'_, A> {
    fn drop(&mut self) {
        if self.pending {
            self.pending = false;
            warn!("self-test unwinding, restoring device configuration");
            if let Err(e) = restore_config(self.store, &self.original, self.plan) {
                error!("failed to restore device configuration: {}", e);
            }
        }
    }
}

/// Attempt every planned write, then report the first failure.
fn restore_config<A: AttributeStore + ?Sized>(store: &A, original: &DeviceConfig, plan: RestorePlan) -> Result<()> {
    let mut first_err: Option<SimtempError> = None;

    note_restore(
        &mut first_err,
        attr::THRESHOLD_MC,
        store.write(attr::THRESHOLD_MC, &original.threshold_mc.to_string()),
    );
    if plan.sampling {
        note_restore(
            &mut first_err,
            attr::SAMPLING_US,
            write_sampling(store, SamplingPeriod::Micros(original.sampling_us)),
        );
    }
    if plan.mode {
        note_restore(&mut first_err, attr::MODE, store.write(attr::MODE, original.mode.as_str()));
    }

    match first_err {
        Some(e) => Err(e),
        None => {
            debug!(?original, "device configuration restored");
            Ok(())
        }
    }
}

fn note_restore(first_err: &mut Option<SimtempError>, what: &str, res: Result<()>) {
    if let Err(e) = res {
        error!(attr = what, "restore failed: {}", e);
        first_err.get_or_insert(e);
    }
}

fn enter(phase: Phase) {
    debug!(?phase, "self-test phase");
}

/// Lower the threshold and wait for an alert, leaving the device as it was found.
pub fn run_self_test<A, S, O, C>(
    store: &A,
    open: O,
    opts: &SelfTestOptions,
    clock: &C,
    cancel: Option<&AtomicBool>,
) -> Result<SelfTestReport>
where
    A: AttributeStore + ?Sized,
    S: SampleSource,
    O: FnOnce() -> Result<S>,
    C: Clock + ?Sized,
{
    enter(Phase::Snapshotting);
    let original = DeviceConfig::snapshot(store)?;
    info!(?original, "configuration snapshot taken");

    let plan = RestorePlan { sampling: opts.sampling.is_some(), mode: opts.mode.is_some() };
    let guard = RestoreGuard::arm(store, original.clone(), plan);

    let outcome = configure_and_poll(store, open, opts, &original, clock, cancel);

    enter(Phase::Restoring);
    let restored = guard.restore();

    let report = match (outcome, restored) {
        (outcome, Err(restore_err)) => {
            if let Err(e) = &outcome {
                warn!("self-test error superseded by restore failure: {}", e);
            }
            return Err(restore_err);
        }
        (outcome, Ok(_)) => outcome?,
    };

    enter(Phase::Done);
    info!(passed = report.passed(), samples = report.samples, "self-test finished");
    Ok(report)
}

fn configure_and_poll<A, S, O, C>(
    store: &A,
    open: O,
    opts: &SelfTestOptions,
    original: &DeviceConfig,
    clock: &C,
    cancel: Option<&AtomicBool>,
) -> Result<SelfTestReport>
where
    A: AttributeStore + ?Sized,
    S: SampleSource,
    O: FnOnce() -> Result<S>,
    C: Clock + ?Sized,
{
    enter(Phase::Configuring);
    if let Some(period) = opts.sampling {
        write_sampling(store, period)?;
    }
    if let Some(mode) = opts.mode {
        store.write(attr::MODE, mode.as_str())?;
    }
    let threshold_mc = opts.threshold_mc.unwrap_or(selftest::DEFAULT_THRESHOLD_MC);
    store.write(attr::THRESHOLD_MC, &threshold_mc.to_string())?;

    let sampling_us = opts.sampling.map_or(original.sampling_us, |p| p.as_micros());
    let deadline = alert_deadline(sampling_us, opts.max_periods);

    enter(Phase::Opening);
    let mut channel = open()?;

    enter(Phase::Polling);
    debug!(threshold_mc, sampling_us, ?deadline, "waiting for alert");
    let mut poll = PollLoop::new(clock)
        .wake_timeout(deadline)
        .limits(PollLimits { max_samples: None, duration: Some(deadline) });
    if let Some(flag) = cancel {
        poll = poll.cancel_on(flag);
    }
    let report = poll.run(&mut channel, |sample, _| {
        Ok(if sample.is_alert() { ControlFlow::Break(()) } else { ControlFlow::Continue(()) })
    });
    drop(channel);
    let report = report?;

    enter(Phase::Evaluating);
    if report.stop == StopReason::Interrupted {
        return Err(SimtempError::Interrupted);
    }
    let verdict = report.matched().map_or(Verdict::Fail, Verdict::Pass);

    Ok(SelfTestReport {
        verdict,
        samples: report.samples,
        max_periods: opts.max_periods,
        sampling_us,
        threshold_mc,
        deadline,
        original: original.clone(),
    })
}
