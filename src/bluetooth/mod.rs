//! Bluetooth connection orchestrator
//!
//! This module provides:
//! - Device state parsing from `bluetoothctl info` output
//! - A mockable control seam over `bluetoothctl`
//! - The state-dependent operator menu
//! - Bounded scan, pair/bond and connect loops

pub mod ctl;
pub mod error;
pub mod menu;
pub mod state;
pub mod workflow;

pub use ctl::{BluetoothCtl, Bluetoothctl, PairResult};
pub use error::ConnectFailure;
pub use menu::{Menu, MenuAction};
pub use state::{DeviceState, Presence};
pub use workflow::Orchestrator;
