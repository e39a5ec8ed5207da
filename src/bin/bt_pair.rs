//! Pair, bond, trust and connect the configured Bluetooth peripheral
//!
//! ```bash
//! bt-pair
//! bt-pair --address 00:1A:7D:DA:71:13 --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use bt_serial_tools::bluetooth::{Bluetoothctl, Orchestrator};
use bt_serial_tools::outcome::report_failure;
use bt_serial_tools::prompt::StdinPrompter;
use bt_serial_tools::{logging, Config, Outcome};

/// Bluetooth pairing and connection helper
#[derive(Parser)]
#[command(name = "bt-pair")]
#[command(version)]
#[command(about = "Pair, trust and connect a Bluetooth peripheral through bluetoothctl")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device address (overrides the configuration)
    #[arg(short, long)]
    address: Option<String>,

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
    if let Some(address) = cli.address {
        config.bluetooth.address = address;
    }

    let ctl = Bluetoothctl::new(&config.bluetooth.ctl_program)
        .with_pair_timeout(config.bluetooth.pair_timeout());
    let mut orchestrator = Orchestrator::new(ctl, config.bluetooth);

    let outcome = orchestrator.run(&mut StdinPrompter)?;
    if let Outcome::ExitFail(ref failure) = outcome {
        report_failure(failure);
    }

    Ok(ExitCode::from(outcome.exit_code()))
}
