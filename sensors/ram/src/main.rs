//! sketchysensor-rs-ram: memory pressure event provider for SketchyBar.
//!
//! Registers a custom event once, then triggers it at a fixed interval with
//! `used_percentage`, `used_gb` and `total_gb` variables.

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};
use sketchysensor_rs_core::{format, logging, BarClient, GlobalConfig, PrintBar, SensorError, SketchyBar};
use sketchysensor_rs_ram::{check_availability, parse_interval, MemorySampler, Reporter, SystemMemoryStats};
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tokio::signal;

/// Command-line arguments for the memory event provider.
#[derive(Parser)]
#[command(name = "sketchysensor-rs-ram")]
#[command(about = "Memory pressure event provider for SketchyBar")]
#[command(version)]
#[command(author)]
#[command(override_usage = "sketchysensor-rs-ram [OPTIONS] <EVENT_NAME> <INTERVAL_SECONDS>")]
struct Args {
    /// Name of the SketchyBar event to register and trigger
    #[arg(value_name = "EVENT_NAME", required_unless_present = "check")]
    event_name: Option<String>,

    /// Seconds between samples, fractions allowed (e.g. 0.5)
    #[arg(value_name = "INTERVAL_SECONDS", value_parser = parse_interval, required_unless_present = "check")]
    interval: Option<Duration>,

    /// One-shot mode (register, trigger once and exit)
    #[arg(short, long)]
    once: bool,

    /// Print commands to stdout instead of running sketchybar
    #[arg(short, long)]
    print: bool,

    /// Path to the sketchybar executable
    #[arg(long, value_name = "PATH")]
    bar: Option<String>,

    /// RON configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Check that memory statistics can be read and exit
    #[arg(long)]
    check: bool,
}

/// Parse arguments, printing usage to stdout and exiting with 1 on failure.
fn parse_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let mut message = e.render().to_string();
            // Value validation errors carry no usage line of their own.
            if !message.contains("Usage:") {
                message.push('\n');
                message.push_str(&usage_text());
            }
            usage_and_exit(&message)
        }
    }
}

fn usage_text() -> String {
    format!("{}\n", Args::command().render_usage())
}

fn usage_and_exit(message: &str) -> ! {
    print!("{}", message);
    process::exit(1);
}

/// Install Ctrl+C and SIGTERM listeners now and return a future that
/// resolves when either arrives.
#[cfg(unix)]
fn shutdown_signal() -> io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => tracing::info!("received Ctrl+C"),
            _ = terminate.recv() => tracing::info!("received terminate signal"),
        }
    })
}

/// Resolve on Ctrl+C.
#[cfg(not(unix))]
fn shutdown_signal() -> io::Result<impl Future<Output = ()>> {
    Ok(async {
        match signal::ctrl_c().await {
            Ok(()) => tracing::info!("received Ctrl+C"),
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    })
}

async fn report<B, F>(
    event: String,
    interval: Duration,
    sampler: MemorySampler<SystemMemoryStats>,
    bar: B,
    once: bool,
    shutdown: F,
) -> Result<(), SensorError>
where
    B: BarClient,
    F: Future<Output = ()>,
{
    let mut reporter = Reporter::new(event, interval, sampler, bar);
    if once {
        reporter.report_once().await
    } else {
        reporter.run(shutdown).await
    }
}

/// Main entry point for the memory event provider.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args();

    let config = match &args.config {
        Some(path) => GlobalConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => GlobalConfig::default(),
    }
    .with_bar_command(args.bar.clone());

    logging::init(args.verbose, config.log_level.as_deref());

    let provider = match SystemMemoryStats::new() {
        Ok(provider) => provider,
        Err(e) => {
            tracing::error!(error = %e, "failed to open memory statistics");
            eprintln!("Failed to create memory sensor: {}", e);
            process::exit(1);
        }
    };

    if args.check {
        match check_availability(&provider) {
            Ok(total) => {
                println!("Memory sensor is available ({} total)", format::bytes_to_human(total));
                return Ok(());
            }
            Err(e) => {
                eprintln!("Memory sensor is not available: {}", e);
                process::exit(1);
            }
        }
    }

    let (Some(event), Some(interval)) = (args.event_name, args.interval) else {
        usage_and_exit(&usage_text());
    };

    let sampler = match MemorySampler::initialize(provider) {
        Ok(sampler) => sampler,
        Err(e) => {
            tracing::error!(error = %e, "failed to query total memory");
            eprintln!("Failed to query total memory: {}", e);
            process::exit(1);
        }
    };

    let shutdown = shutdown_signal().context("Failed to install signal handlers")?;

    tracing::info!(event = %event, ?interval, "starting memory reporter");

    let result = if args.print {
        report(event, interval, sampler, PrintBar::stdout(), args.once, shutdown).await
    } else {
        let bar = SketchyBar::new(config.bar_command.clone()).with_timeout(config.delivery_timeout());
        tracing::debug!(bar = %bar.program().display(), "delivering through sketchybar");
        report(event, interval, sampler, bar, args.once, shutdown).await
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "memory reporter stopped");
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    Ok(())
}
