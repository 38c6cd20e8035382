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

use std::io::{stderr, stdout, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info, warn};

use simtemp::constants::{env, exit, paths, selftest};
use simtemp::format::OutputFormat;
use simtemp::logger;
use simtemp::poll_loop::MonotonicClock;
use simtemp::selftest::{run_self_test, SelfTestOptions};
use simtemp::stream::{run_stream, StreamOptions};
use simtemp::sysfs::{ConfigOverrides, DeviceHandle, Mode, SamplingPeriod};
use simtemp::SimtempError;

#[derive(Parser, Debug)]
#[command(name = "simtemp")]
#[command(version)]
#[command(about = "Configure and monitor the simulated temperature sensor")]
#[command(long_about = "Configure and monitor the simulated temperature sensor

Configuration goes through sysfs attributes; samples are read from the
character device. Run as root so sysfs writes and device reads succeed.

EXAMPLES:
    simtemp                                 Stream samples until Ctrl-C
    simtemp stream --count 10 --sampling-ms 50
    simtemp stream --duration 5 --format json
    simtemp test --threshold-mc 25000 --max-periods 3

ENVIRONMENT VARIABLES:
    SIMTEMP_LOG=debug          Log filter (stderr)
    SIMTEMP_SYSFS_ROOT=<dir>   Default for --sysfs-root
    SIMTEMP_DEVICE=<path>      Default for --device")]
struct Cli {
    /// Root path of the simtemp sysfs class
    #[arg(long, global = true, env = env::SYSFS_ROOT, default_value = paths::SYSFS_ROOT)]
    sysfs_root: PathBuf,

    /// Character device to read samples from [default: /dev/nxp_simtemp]
    #[arg(long, global = true, env = env::DEVICE)]
    device: Option<PathBuf>,

    /// Device index under the sysfs root
    #[arg(long, global = true, default_value_t = 0)]
    index: usize,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream samples to stdout (default)
    Stream(StreamArgs),
    /// Run the threshold alert self-test
    Test(TestArgs),
}

impl Default for Command {
    fn default() -> Self {
        Command::Stream(StreamArgs::default())
    }
}

#[derive(Args, Debug, Clone, Default)]
struct ConfigArgs {
    /// Sampling period in milliseconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..), conflicts_with = "sampling_us")]
    sampling_ms: Option<u64>,

    /// Sampling period in microseconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    sampling_us: Option<u64>,

    /// Simulation mode
    #[arg(long, value_enum)]
    mode: Option<Mode>,
}

impl ConfigArgs {
    fn period(&self) -> Option<SamplingPeriod> {
        self.sampling_us
            .map(SamplingPeriod::Micros)
            .or(self.sampling_ms.map(SamplingPeriod::Millis))
    }
}

#[derive(Args, Debug, Clone, Default)]
struct StreamArgs {
    /// Stop after N samples
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    count: Option<u64>,

    /// Stop after D seconds (0 or absent: run until interrupted)
    #[arg(long, value_parser = parse_seconds)]
    duration: Option<Duration>,

    /// Update the alert threshold (milli-degrees C)
    #[arg(long = "threshold-mc", allow_hyphen_values = true)]
    threshold_mc: Option<i32>,

    #[command(flatten)]
    config: ConfigArgs,

    /// Output format for samples
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

impl StreamArgs {
    /// A zero duration places no time bound on the stream.
    fn duration_bound(&self) -> Option<Duration> {
        self.duration.filter(|d| !d.is_zero())
    }
}

#[derive(Args, Debug, Clone)]
struct TestArgs {
    /// Threshold used during the test (milli-degrees C)
    #[arg(long = "threshold-mc", allow_hyphen_values = true, default_value_t = selftest::DEFAULT_THRESHOLD_MC)]
    threshold_mc: i32,

    /// Fail if no alert arrives within this many sampling periods
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..), default_value_t = selftest::DEFAULT_MAX_PERIODS)]
    max_periods: u32,

    #[command(flatten)]
    config: ConfigArgs,
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|_| format!("invalid number of seconds: {}", s))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err("value must be a non-negative number of seconds".to_string());
    }
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}

fn install_interrupt_handler(flag: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        info!("SIGNAL: interrupt received, stopping");
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to set signal handler: {}. Ctrl-C will terminate without cleanup.", e);
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    // SAFETY: geteuid has no preconditions and only returns the effective UID.
    if unsafe { libc::geteuid() } != 0 {
        debug!("not running as root; sysfs writes or device reads may be refused");
    }

    let handle = DeviceHandle::resolve(&cli.sysfs_root, cli.index, cli.device.clone())?;
    let store = handle.attributes();
    info!(dir = %handle.sysfs_dir.display(), device = %handle.char_device.display(), "using simtemp instance");

    let cancel = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(Arc::clone(&cancel));

    match cli.command.unwrap_or_default() {
        Command::Stream(args) => {
            let opts = StreamOptions {
                count: args.count,
                duration: args.duration_bound(),
                overrides: ConfigOverrides {
                    sampling: args.config.period(),
                    threshold_mc: args.threshold_mc,
                    mode: args.config.mode,
                },
                format: args.format,
            };
            let mut out = stdout().lock();
            run_stream(&store, || handle.open_channel(), &opts, &MonotonicClock, &cancel, &mut out)
                .context("stream failed")?;
            Ok(exit::SUCCESS)
        }
        Command::Test(args) => {
            let opts = SelfTestOptions {
                sampling: args.config.period(),
                mode: args.config.mode,
                threshold_mc: Some(args.threshold_mc),
                max_periods: args.max_periods,
            };
            let report = run_self_test(&store, || handle.open_channel(), &opts, &MonotonicClock, Some(cancel.as_ref()))
                .context("self-test failed")?;
            println!("{}", report.summary());
            Ok(report.exit_code())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    logger::init_logging(cli.verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => report_failure(&err, &mut stderr()),
    };
    std::process::exit(code);
}

/// Print a runtime failure once and pick its exit code.
fn report_failure(err: &anyhow::Error, out: &mut impl Write) -> i32 {
    let _ = writeln!(out, "simtemp: error: {:#}", err);
    err.downcast_ref::<SimtempError>()
        .map_or(exit::FAILURE, SimtempError::exit_code)
}
