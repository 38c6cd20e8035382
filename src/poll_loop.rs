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

//! Poll loop engine
//!
//! Shared by streaming and the self-test: wait for readability with a
//! bounded timeout, drain one record per wake-up, hand the decoded sample to
//! the caller and stop on the caller's signal, a sample count, a deadline or
//! an external interrupt.
//!
//! Wake-ups with nothing ready and short reads are absorbed here and never
//! count as delivered samples.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::channel::SampleSource;
use crate::constants::polling;
use crate::error::Result;
use crate::sample::Sample;

/// Monotonic time source
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// External bounds on a run; all optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollLimits {
    pub max_samples: Option<u64>,
    pub duration: Option<Duration>,
}

/// Why the loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The per-sample callback asked to stop on this sample
    Matched(Sample),
    CountReached,
    DeadlineElapsed,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    /// Fully decoded records delivered to the callback
    pub samples: u64,
    pub stop: StopReason,
}

impl PollReport {
    pub fn matched(&self) -> Option<Sample> {
        match self.stop {
            StopReason::Matched(sample) => Some(sample),
            _ => None,
        }
    }
}

pub struct PollLoop<'a, C: Clock + ?Sized> {
    clock: &'a C,
    wake_timeout: Duration,
    limits: PollLimits,
    cancel: Option<&'a AtomicBool>,
}

impl<'a, C: Clock + ?Sized> PollLoop<'a, C> {
    pub fn new(clock: &'a C) -> Self {
        Self {
            clock,
            wake_timeout: polling::WAKE_TIMEOUT,
            limits: PollLimits::default(),
            cancel: None,
        }
    }

    /// Upper bound on a single readiness wait
    pub fn wake_timeout(mut self, timeout: Duration) -> Self {
        self.wake_timeout = timeout;
        self
    }

    pub fn limits(mut self, limits: PollLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Flag checked on every wake; once set the loop returns `Interrupted`.
    pub fn cancel_on(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Run until `on_sample` breaks or a bound is reached.
    pub fn run<S, F>(&self, source: &mut S, mut on_sample: F) -> Result<PollReport>
    where
        S: SampleSource + ?Sized,
        F: FnMut(&Sample, u64) -> Result<ControlFlow<()>>,
    {
        let start = self.clock.now();
        // a duration past the clock's range is no deadline at all
        let deadline = self.limits.duration.and_then(|d| start.checked_add(d));
        let mut samples: u64 = 0;
        let mut buf = [0u8; Sample::SIZE];

        let stop = loop {
            if self.cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
                break StopReason::Interrupted;
            }
            if self.limits.max_samples.is_some_and(|max| samples >= max) {
                break StopReason::CountReached;
            }

            let wait = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(self.clock.now());
                    if remaining.is_zero() {
                        break StopReason::DeadlineElapsed;
                    }
                    remaining.max(polling::MIN_WAKE).min(self.wake_timeout)
                }
                None => self.wake_timeout,
            };

            if !source.wait_readable(wait)? {
                trace!(?wait, "no data before wake timeout");
                continue;
            }

            let n = source.read_record(&mut buf)?;
            let Some(sample) = Sample::from_bytes(&buf[..n]) else {
                trace!(bytes = n, "short read ignored");
                continue;
            };
            samples += 1;
            if on_sample(&sample, samples)?.is_break() {
                break StopReason::Matched(sample);
            }
        };

        debug!(samples, ?stop, "poll loop finished");
        Ok(PollReport { samples, stop })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_utils::{ScriptedSource, StepClock, Wake};

    fn alert(ts: u64) -> Sample {
        Sample { timestamp_ns: ts, temp_mc: 47_000, flags: 0x3 }
    }

    fn quiet(ts: u64) -> Sample {
        Sample { timestamp_ns: ts, temp_mc: 30_000, flags: 0x1 }
    }

    #[test]
    fn test_stops_on_predicate() {
        let clock = StepClock::new(Duration::from_millis(1));
        let mut source = ScriptedSource::new(vec![Wake::Record(quiet(1)), Wake::Record(alert(2)), Wake::Record(quiet(3))]);

        let report = PollLoop::new(&clock)
            .limits(PollLimits { duration: Some(Duration::from_secs(1)), ..Default::default() })
            .run(&mut source, |s, _| Ok(if s.is_alert() { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }))
            .unwrap();

        assert_eq!(report.samples, 2);
        assert_eq!(report.matched(), Some(alert(2)));
    }

    #[test]
    fn test_idle_wakes_and_short_reads_do_not_count() {
        let clock = StepClock::new(Duration::from_millis(1));
        let mut source = ScriptedSource::new(vec![
            Wake::Idle,
            Wake::Short(7),
            Wake::Idle,
            Wake::Record(quiet(1)),
            Wake::Short(0),
            Wake::Record(quiet(2)),
        ]);

        let mut seen = Vec::new();
        let report = PollLoop::new(&clock)
            .limits(PollLimits { max_samples: Some(2), ..Default::default() })
            .run(&mut source, |s, n| {
                seen.push((s.timestamp_ns, n));
                Ok(ControlFlow::Continue(()))
            })
            .unwrap();

        assert_eq!(report.stop, StopReason::CountReached);
        assert_eq!(report.samples, 2);
        assert_eq!(seen, vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn test_deadline_without_data() {
        let clock = StepClock::new(Duration::from_millis(300));
        let mut source = ScriptedSource::idle();

        let report = PollLoop::new(&clock)
            .limits(PollLimits { duration: Some(Duration::from_millis(500)), ..Default::default() })
            .run(&mut source, |_, _| Ok(ControlFlow::Continue(())))
            .unwrap();

        assert_eq!(report.stop, StopReason::DeadlineElapsed);
        assert_eq!(report.samples, 0);
        assert!(report.matched().is_none());
    }

    #[test]
    fn test_unrepresentable_duration_is_unbounded() {
        let clock = StepClock::new(Duration::from_millis(1));
        let mut source = ScriptedSource::new(vec![Wake::Idle, Wake::Record(quiet(1)), Wake::Record(quiet(2))]);

        let report = PollLoop::new(&clock)
            .limits(PollLimits { max_samples: Some(2), duration: Some(Duration::MAX) })
            .run(&mut source, |_, _| Ok(ControlFlow::Continue(())))
            .unwrap();

        assert_eq!(report.stop, StopReason::CountReached);
        assert_eq!(source.waits()[0], polling::WAKE_TIMEOUT);
    }

    #[test]
    fn test_wait_clamped_to_remaining_time() {
        let clock = StepClock::new(Duration::from_millis(100));
        let mut source = ScriptedSource::idle();

        PollLoop::new(&clock)
            .wake_timeout(Duration::from_secs(10))
            .limits(PollLimits { duration: Some(Duration::from_millis(1_000)), ..Default::default() })
            .run(&mut source, |_, _| Ok(ControlFlow::Continue(())))
            .unwrap();

        let waits = source.waits();
        assert!(!waits.is_empty());
        assert!(waits.iter().all(|w| *w <= Duration::from_millis(1_000) && *w >= polling::MIN_WAKE));
        // later waits shrink as the deadline approaches
        assert!(waits.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_cancel_flag_interrupts() {
        let clock = StepClock::new(Duration::from_millis(1));
        let cancel = AtomicBool::new(false);
        let mut source = ScriptedSource::new(vec![Wake::Record(quiet(1)), Wake::Record(quiet(2))]);

        let report = PollLoop::new(&clock)
            .cancel_on(&cancel)
            .run(&mut source, |_, n| {
                if n == 1 {
                    cancel.store(true, Ordering::SeqCst);
                }
                Ok(ControlFlow::Continue(()))
            })
            .unwrap();

        assert_eq!(report.stop, StopReason::Interrupted);
        assert_eq!(report.samples, 1);
    }

    #[test]
    fn test_callback_error_propagates() {
        let clock = StepClock::new(Duration::from_millis(1));
        let mut source = ScriptedSource::new(vec![Wake::Record(quiet(1))]);

        let err = PollLoop::new(&clock)
            .run(&mut source, |_, _| Err(crate::error::SimtempError::Report("stdout closed".into())))
            .unwrap_err();
        assert!(err.to_string().contains("stdout closed"));
    }
}
