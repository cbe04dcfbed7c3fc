//! Flowgate CLI Application
//!
//! Command-line front end for the flowgate library:
//! - `gateway`: debounce station sensor payloads and forward the meaningful ones
//! - `bridge`: turn forwarded events into coil pulses
//! - `monitor`: replay stage signals through the pathway monitor
//!
//! Payloads are exchanged as JSON lines on files or stdin/stdout ("-").

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flowgate_core::{
    CoilMapper, JsonLinesSink, LogNotifier, MonitorRunner, PathwayMonitor, PulseBridge,
    StationGateTracker,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

mod bridge;
mod config;
mod gateway;
mod monitor;

/// Flowgate - station event gateway and patient pathway monitor
#[derive(Parser, Debug)]
#[command(name = "flowgate")]
#[command(about = "Station event gateway and patient pathway monitor", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (flowgate.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Gate sensor payloads and forward accepted transitions
    Gateway {
        /// Sensor payloads, one JSON object per line ("-" for stdin)
        #[arg(short, long, value_name = "FILE", default_value = "-")]
        input: PathBuf,

        /// Where forwarded events are written ("-" for stdout)
        #[arg(short, long, value_name = "FILE", default_value = "-")]
        output: PathBuf,
    },

    /// Pulse coils for forwarded events
    Bridge {
        /// Gateway payloads, one JSON object per line ("-" for stdin)
        #[arg(short, long, value_name = "FILE", default_value = "-")]
        input: PathBuf,

        /// Where coil writes are recorded ("-" for stdout)
        #[arg(long, value_name = "FILE", default_value = "-")]
        coil_log: PathBuf,
    },

    /// Replay a trace of stage samples through the pathway monitor
    Monitor {
        /// Stage samples, one JSON object per line ("-" for stdin)
        #[arg(short, long, value_name = "FILE", default_value = "-")]
        trace: PathBuf,

        /// Wait one polling interval between samples
        #[arg(long)]
        realtime: bool,

        /// Maximum number of samples to process
        #[arg(long, value_name = "COUNT")]
        max_samples: Option<u64>,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Flowgate CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using flowgate library v{}", flowgate_core::VERSION);

    let app_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => config::AppConfig::default(),
    };
    log::debug!("Configuration: {:?}", app_config);

    match args.command {
        Command::Gateway { input, output } => {
            let mut gate = StationGateTracker::new(app_config.gate)?;
            let mut sink = JsonLinesSink::new(open_output(&output)?);
            let report = gateway::run_gateway(open_input(&input)?, &mut gate, &mut sink)?;
            log::info!("Gateway finished: {:?}", report);
        }
        Command::Bridge { input, coil_log } => {
            let mut mapper = CoilMapper::new(app_config.gate)?;
            let writer = bridge::CoilLogWriter::new(open_output(&coil_log)?);
            let mut pulser = PulseBridge::new(writer, &app_config.bridge);
            let report = bridge::run_bridge(open_input(&input)?, &mut mapper, &mut pulser)?;
            log::info!("Bridge finished: {:?}", report);
        }
        Command::Monitor {
            trace,
            realtime,
            max_samples,
        } => {
            let monitor_config = app_config.monitor;
            let interval = if realtime {
                monitor_config.poll_interval()
            } else {
                std::time::Duration::ZERO
            };

            let threshold = monitor_config.compliance_threshold()?;

            let mut runner = MonitorRunner::new(
                PathwayMonitor::new(threshold),
                monitor::ReplaySource::new(open_input(&trace)?),
                LogNotifier,
                interval,
            );
            if let Some(max) = max_samples {
                runner = runner.with_max_samples(max);
            }

            let stop = runner.stop_handle();
            ctrlc::set_handler(move || {
                log::info!("Interrupt received, stopping monitor...");
                stop.stop();
            })
            .context("Failed to install interrupt handler")?;

            runner.run();
        }
    }

    Ok(())
}

fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    if path == Path::new("-") {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path).with_context(|| format!("Failed to open input: {:?}", path))?;
    Ok(Box::new(BufReader::new(file)))
}

fn open_output(path: &Path) -> Result<Box<dyn Write>> {
    if path == Path::new("-") {
        return Ok(Box::new(io::stdout()));
    }
    let file = File::create(path).with_context(|| format!("Failed to create output: {:?}", path))?;
    Ok(Box::new(file))
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
