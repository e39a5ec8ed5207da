//! Bluetooth control seam
//!
//! [`BluetoothCtl`] is everything the orchestrator needs from the host's
//! Bluetooth stack. [`Bluetoothctl`] implements it by running the BlueZ
//! `bluetoothctl` utility in non-interactive mode and scraping its output.

use anyhow::{Context, Result};
use log::debug;
use std::process::Command;
use std::time::Duration;

use super::state::DeviceState;

/// Markers in `bluetoothctl pair` output
const PAIR_SUCCESS_MARKER: &str = "Pairing successful";
const PAIR_EXISTS_MARKER: &str = "AlreadyExists";

/// Classified result of a pair attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairResult {
    Success,
    /// Controller already holds a pairing for the device
    AlreadyExists,
    /// Anything else, with the tool's output for diagnostics
    Failed(String),
}

impl PairResult {
    /// Classify `bluetoothctl pair` output
    pub fn parse(output: &str) -> Self {
        if output.contains(PAIR_SUCCESS_MARKER) {
            PairResult::Success
        } else if output.contains(PAIR_EXISTS_MARKER) {
            PairResult::AlreadyExists
        } else {
            PairResult::Failed(output.trim().to_string())
        }
    }

    /// Success or already paired
    pub fn is_paired(&self) -> bool {
        matches!(self, PairResult::Success | PairResult::AlreadyExists)
    }
}

/// Operations the orchestrator drives against the Bluetooth stack
pub trait BluetoothCtl {
    /// Current state of `address`; never fails on unexpected output
    fn query_device_state(&mut self, address: &str) -> Result<DeviceState>;

    /// Whether the controller has seen `address` (e.g., during a scan)
    fn is_visible(&mut self, address: &str) -> Result<bool>;

    fn power_on(&mut self) -> Result<()>;

    /// Discover devices for at most `timeout`
    fn scan(&mut self, timeout: Duration) -> Result<()>;

    fn trust(&mut self, address: &str) -> Result<()>;

    fn pair(&mut self, address: &str) -> Result<PairResult>;

    fn connect(&mut self, address: &str) -> Result<()>;

    fn disconnect(&mut self, address: &str) -> Result<()>;

    /// Drop the controller's record (and pairing) for `address`
    fn remove(&mut self, address: &str) -> Result<()>;
}

/// [`BluetoothCtl`] backed by the `bluetoothctl` command-line utility
#[derive(Debug, Clone)]
pub struct Bluetoothctl {
    program: String,
    pair_timeout: Duration,
}

impl Bluetoothctl {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            pair_timeout: Duration::from_secs(10),
        }
    }

    /// Set the timeout passed to `bluetoothctl pair`
    pub fn with_pair_timeout(mut self, timeout: Duration) -> Self {
        self.pair_timeout = timeout;
        self
    }

    /// Run one command and return stdout and stderr combined.
    ///
    /// A non-zero exit status is not an error: callers read the text.
    fn run(&self, args: &[&str]) -> Result<String> {
        debug!("{} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .with_context(|| format!("Failed to run {}", self.program))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        debug!("{} exited with {}: {}", self.program, output.status, text.trim());
        Ok(text)
    }
}

impl Default for Bluetoothctl {
    fn default() -> Self {
        Self::new("bluetoothctl")
    }
}

impl BluetoothCtl for Bluetoothctl {
    fn query_device_state(&mut self, address: &str) -> Result<DeviceState> {
        let info = self.run(&["info", address])?;
        Ok(DeviceState::parse(&info))
    }

    fn is_visible(&mut self, address: &str) -> Result<bool> {
        let devices = self.run(&["devices"])?;
        Ok(devices_contain(&devices, address))
    }

    fn power_on(&mut self) -> Result<()> {
        self.run(&["power", "on"])?;
        Ok(())
    }

    fn scan(&mut self, timeout: Duration) -> Result<()> {
        let secs = timeout.as_secs().max(1).to_string();
        self.run(&["--timeout", &secs, "scan", "on"])?;
        Ok(())
    }

    fn trust(&mut self, address: &str) -> Result<()> {
        self.run(&["trust", address])?;
        Ok(())
    }

    fn pair(&mut self, address: &str) -> Result<PairResult> {
        let secs = self.pair_timeout.as_secs().max(1).to_string();
        let output = self.run(&["--timeout", &secs, "pair", address])?;
        Ok(PairResult::parse(&output))
    }

    fn connect(&mut self, address: &str) -> Result<()> {
        self.run(&["connect", address])?;
        Ok(())
    }

    fn disconnect(&mut self, address: &str) -> Result<()> {
        self.run(&["disconnect", address])?;
        Ok(())
    }

    fn remove(&mut self, address: &str) -> Result<()> {
        self.run(&["remove", address])?;
        Ok(())
    }
}

/// Check `bluetoothctl devices` output for `address`, ignoring case
fn devices_contain(devices: &str, address: &str) -> bool {
    let wanted = address.to_uppercase();
    devices
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .any(|addr| addr.to_uppercase() == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_result_markers() {
        assert_eq!(
            PairResult::parse("Attempting to pair with 00:1A:7D:DA:71:13\nPairing successful\n"),
            PairResult::Success
        );
        assert_eq!(
            PairResult::parse("Failed to pair: org.bluez.Error.AlreadyExists\n"),
            PairResult::AlreadyExists
        );

        let failed = PairResult::parse("Failed to pair: org.bluez.Error.AuthenticationFailed\n");
        assert!(!failed.is_paired());
        assert_eq!(
            failed,
            PairResult::Failed("Failed to pair: org.bluez.Error.AuthenticationFailed".to_string())
        );
    }

    #[test]
    fn test_devices_contain() {
        let devices = "Device 00:1A:7D:DA:71:13 Sensor\nDevice 11:22:33:44:55:66 Headset\n";
        assert!(devices_contain(devices, "00:1a:7d:da:71:13"));
        assert!(!devices_contain(devices, "AA:BB:CC:DD:EE:FF"));
        assert!(!devices_contain("", "00:1A:7D:DA:71:13"));
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let mut ctl = Bluetoothctl::new("definitely-not-a-bluetoothctl-binary");
        assert!(ctl.query_device_state("00:1A:7D:DA:71:13").is_err());
    }
}
