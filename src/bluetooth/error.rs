//! Terminal failures of the connection workflow

use thiserror::Error;

use super::state::DeviceState;
use crate::outcome::Remediation;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectFailure {
    #[error("Invalid menu choice: {0:?}")]
    InvalidChoice(String),

    #[error("No input available, refusing to guess a menu choice")]
    NoInput,

    #[error("Device {address} not found after {attempts} scan attempts")]
    DeviceNotFound { address: String, attempts: u32 },

    #[error("Pairing with {address} failed after {attempts} attempts")]
    PairingFailed { address: String, attempts: u32 },

    #[error("Connection to {address} failed after {attempts} attempts")]
    ConnectFailed { address: String, attempts: u32 },

    #[error("Device {address} is still connected after disconnect")]
    DisconnectFailed { address: String },

    #[error("Device {address} is still known to the controller after remove")]
    RemoveFailed { address: String },

    #[error("Device {address} connected in an inconsistent state ({state})")]
    InconsistentState { address: String, state: DeviceState },
}

impl Remediation for ConnectFailure {
    fn remediation(&self) -> Vec<String> {
        let steps: &[&str] = match self {
            ConnectFailure::InvalidChoice(_) | ConnectFailure::NoInput => {
                &["Run again and enter one of the listed option numbers"]
            }
            ConnectFailure::DeviceNotFound { .. } => &[
                "Make sure the device is powered on and in pairing mode",
                "Move the device closer to this computer",
                "Check the adapter is up: bluetoothctl show",
                "Unblock Bluetooth if needed: rfkill unblock bluetooth",
            ],
            ConnectFailure::PairingFailed { .. } => &[
                "Put the device back into pairing mode and run again",
                "Remove the pairing on the device side if it keeps one",
                "Restart the Bluetooth service: sudo systemctl restart bluetooth",
            ],
            ConnectFailure::ConnectFailed { .. } => &[
                "Check the device is awake and in range",
                "Remove the device from the menu and pair it again",
                "Restart the Bluetooth service: sudo systemctl restart bluetooth",
            ],
            ConnectFailure::DisconnectFailed { .. } | ConnectFailure::RemoveFailed { .. } => &[
                "Check bluetoothctl output: bluetoothctl info <address>",
                "Restart the Bluetooth service: sudo systemctl restart bluetooth",
                "Run again",
            ],
            ConnectFailure::InconsistentState { .. } => &[
                "The device holds a corrupted pairing that software cannot repair",
                "Reset the device firmware or remove its battery for a few seconds",
                "Run again and choose Remove, then Search and pair",
            ],
        };
        steps.iter().map(|s| s.to_string()).collect()
    }
}
