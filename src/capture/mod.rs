//! Serial log capture daemon
//!
//! This module provides functionality for:
//! - Checking the serial device exists and is readable/writable
//! - Choosing a reader (tio, cat, or in-process) and spawning it
//! - Timestamping lines into size-rotated log files
//! - Stopping cleanly on SIGINT/SIGTERM

pub mod daemon;
pub mod error;
#[cfg(feature = "serial")]
pub mod port;
pub mod preflight;
pub mod reader;
pub mod session;
pub mod teardown;

pub use daemon::{capture_loop, run_capture, StopReason};
pub use error::CaptureFailure;
pub use reader::ReaderKind;
pub use session::LogSession;
pub use teardown::Teardown;
