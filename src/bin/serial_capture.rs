//! Capture a serial console into timestamped, size-rotated log files
//!
//! ```bash
//! serial-capture
//! serial-capture --device /dev/ttyUSB0 --log-dir /var/log/device --max-size-mb 50
//! ```

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use bt_serial_tools::capture::run_capture;
use bt_serial_tools::config::ReaderPreference;
use bt_serial_tools::outcome::report_failure;
use bt_serial_tools::prompt::StdinPrompter;
use bt_serial_tools::{logging, Config, Outcome};

/// Serial log capture
#[derive(Parser)]
#[command(name = "serial-capture")]
#[command(version)]
#[command(about = "Log a serial device to timestamped files, rotating by size")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device path (e.g., /dev/ttyACM0)
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Directory for log files
    #[arg(short, long)]
    log_dir: Option<PathBuf>,

    /// Rotate when the active file reaches this many megabytes
    #[arg(long)]
    max_size_mb: Option<u64>,

    /// Baud rate for tio and the native reader
    #[arg(short, long)]
    baud: Option<u32>,

    /// Serial reader to use
    #[arg(short, long, value_enum)]
    reader: Option<ReaderPreference>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "[ERROR]".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref())?;
    let capture = &mut config.capture;
    if let Some(device) = cli.device {
        capture.device = device;
    }
    if let Some(dir) = cli.log_dir {
        capture.log_dir = dir;
    }
    if let Some(mb) = cli.max_size_mb {
        capture.max_file_size_mb = mb;
    }
    if let Some(baud) = cli.baud {
        capture.baud_rate = baud;
    }
    if let Some(reader) = cli.reader {
        capture.reader = reader;
    }

    let outcome = run_capture(&config.capture, &mut StdinPrompter)?;
    if let Outcome::ExitFail(ref failure) = outcome {
        report_failure(failure);
    }

    Ok(ExitCode::from(outcome.exit_code()))
}
