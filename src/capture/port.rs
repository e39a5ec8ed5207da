//! In-process serial reader
//!
//! Opens the port with the `serialport` crate and reads lines on a blocking
//! thread, so capture works without tio or cat.

use anyhow::{Context, Result};
use log::{debug, error};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;

/// Configuration for serial port connection
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Serial port path (e.g., /dev/ttyACM0)
    pub port_path: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    /// Read timeout, bounds how long a stop request can go unnoticed
    pub timeout: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port_path: String::from("/dev/ttyACM0"),
            baud_rate: 115200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            timeout: Duration::from_millis(100),
        }
    }
}

impl PortConfig {
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..Default::default()
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Open serial port
pub struct SerialConnection {
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

impl SerialConnection {
    pub fn open(config: &PortConfig) -> Result<Self> {
        let port = serialport::new(&config.port_path, config.baud_rate)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .flow_control(config.flow_control)
            .timeout(config.timeout)
            .open()
            .with_context(|| format!("Failed to open serial port: {}", config.port_path))?;

        Ok(Self {
            port,
            pending: Vec::new(),
        })
    }

    /// Read one line. `Ok(None)` means the read timed out mid-line or idle;
    /// the partial line is kept for the next call.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let mut byte = [0u8; 1];

        loop {
            match self.port.read(&mut byte) {
                Ok(1) => {
                    if byte[0] == b'\n' {
                        let line = super::reader::frame_line(&self.pending);
                        self.pending.clear();
                        return Ok(Some(line));
                    }
                    self.pending.push(byte[0]);
                }
                Ok(_) => return Ok(None),
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => return Ok(None),
                Err(e) => return Err(e).context("Failed to read from serial port"),
            }
        }
    }
}

/// Read `config`'s port on a thread, sending lines to `tx`.
///
/// Returns the running flag; clearing it stops the thread within one read
/// timeout.
pub fn spawn_native_reader(config: PortConfig, tx: mpsc::Sender<String>) -> Result<Arc<AtomicBool>> {
    let mut conn = SerialConnection::open(&config)?;
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);

    thread::Builder::new()
        .name("serial-reader".to_string())
        .spawn(move || {
            debug!("Native reader started on {}", config.port_path);
            while flag.load(Ordering::SeqCst) {
                match conn.read_line() {
                    Ok(Some(line)) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!("{:#}", e);
                        break;
                    }
                }
            }
            debug!("Native reader stopped");
        })
        .context("Failed to start serial reader thread")?;

    Ok(running)
}
