//! Terminal failures of the log capture daemon

use std::path::PathBuf;
use thiserror::Error;

use crate::outcome::Remediation;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureFailure {
    #[error("Serial device not found: {}", .path.display())]
    DeviceMissing { path: PathBuf },

    #[error("No read/write permission on {}", .path.display())]
    PermissionDenied { path: PathBuf },

    #[error("Added {user} to the {group} group; log out and back in before capturing {}", .path.display())]
    PermissionRequested {
        path: PathBuf,
        user: String,
        group: String,
    },

    #[error("Serial stream from {} ended (device disconnected?)", .path.display())]
    SourceClosed { path: PathBuf },
}

impl Remediation for CaptureFailure {
    fn remediation(&self) -> Vec<String> {
        match self {
            CaptureFailure::DeviceMissing { path } => vec![
                "Connect the device over USB".to_string(),
                "Check it is recognized: ls -la /dev/ttyACM* /dev/ttyUSB*".to_string(),
                "Check dmesg for connection events: dmesg | tail -20".to_string(),
                format!("Pass another path with --device if it is not {}", path.display()),
            ],
            CaptureFailure::PermissionDenied { .. } => vec![
                "Add your user to the 'dialout' group: sudo usermod -aG dialout $USER".to_string(),
                "Log out and back in for the group change to apply".to_string(),
            ],
            CaptureFailure::PermissionRequested { .. } => vec![
                "Log out and back in (or run: newgrp dialout)".to_string(),
                "Run serial-capture again".to_string(),
            ],
            CaptureFailure::SourceClosed { .. } => vec![
                "Check the USB cable and that the device is powered".to_string(),
                "Run serial-capture again to start a new log file".to_string(),
            ],
        }
    }
}
