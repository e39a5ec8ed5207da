//! Bluetooth Serial Tools
//!
//! Operator tooling for a single Bluetooth peripheral that also exposes a
//! USB serial console.
//!
//! # Tools
//!
//! - **bt-pair**: Drives `bluetoothctl` until the peripheral is paired, bonded,
//!   trusted and connected, with bounded retries and remediation hints
//! - **serial-capture**: Streams the peripheral's serial console into
//!   timestamped, size-rotated log files until interrupted
//!
//! # Usage
//!
//! ```bash
//! # Interactive pairing/connection menu for the configured device
//! bt-pair
//!
//! # Same, against another address
//! bt-pair --address 00:1A:7D:DA:71:13
//!
//! # Capture /dev/ttyACM0 into ./serial_logs, rotating at 10 MB
//! serial-capture
//!
//! # Capture another port with the minimal reader
//! serial-capture --device /dev/ttyUSB0 --reader cat
//! ```

pub mod bluetooth;
pub mod capture;
pub mod config;
pub mod logging;
pub mod outcome;
pub mod prompt;

pub use config::Config;
pub use outcome::Outcome;
