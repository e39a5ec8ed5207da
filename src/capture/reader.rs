//! Serial line sources
//!
//! The capture loop consumes lines from a channel. A reader feeds it:
//! `tio` (preferred), plain `cat` (always available), or an in-process
//! port reader when built with the `serial` feature.

use anyhow::{Context, Result};
use colored::Colorize;
use log::{debug, warn};
use std::process::{Command as StdCommand, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use super::teardown::Teardown;
use crate::config::{CaptureConfig, ReaderPreference};
use crate::prompt::{confirm, Prompter};

/// Reader actually used for a capture run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderKind {
    Tio,
    Cat,
    #[cfg(feature = "serial")]
    Native,
}

impl std::fmt::Display for ReaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReaderKind::Tio => write!(f, "tio"),
            ReaderKind::Cat => write!(f, "cat"),
            #[cfg(feature = "serial")]
            ReaderKind::Native => write!(f, "native"),
        }
    }
}

/// Whether `program --version` runs successfully
pub fn tool_available(program: &str) -> bool {
    StdCommand::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Resolve the configured preference to a concrete reader
pub fn select_reader(config: &CaptureConfig, prompter: &mut dyn Prompter) -> Result<ReaderKind> {
    match config.reader {
        ReaderPreference::Tio => Ok(ReaderKind::Tio),
        ReaderPreference::Cat => Ok(ReaderKind::Cat),
        #[cfg(feature = "serial")]
        ReaderPreference::Native => Ok(ReaderKind::Native),
        #[cfg(not(feature = "serial"))]
        ReaderPreference::Native => {
            anyhow::bail!("The native reader requires building with --features serial")
        }
        ReaderPreference::Auto => {
            if tool_available(&config.tio_program) {
                return Ok(ReaderKind::Tio);
            }

            println!(
                "{} {} not found",
                "[WARN]".yellow().bold(),
                config.tio_program
            );
            let question = format!("Install {} now (sudo apt-get install -y tio)?", config.tio_program);
            if confirm(prompter, &question)? && install_tio() && tool_available(&config.tio_program) {
                println!("{} {} installed", "[OK]".green().bold(), config.tio_program);
                return Ok(ReaderKind::Tio);
            }

            warn!("Falling back to cat for {}", config.device.display());
            println!(
                "{} Using cat (no timestamps from the reader, no port setup)",
                "[WARN]".yellow().bold()
            );
            Ok(ReaderKind::Cat)
        }
    }
}

fn install_tio() -> bool {
    match StdCommand::new("sudo")
        .args(["apt-get", "install", "-y", "tio"])
        .status()
    {
        Ok(status) => status.success(),
        Err(e) => {
            warn!("Failed to run apt-get: {}", e);
            false
        }
    }
}

/// What a reader subprocess gets on stdin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdinMode {
    Null,
    /// A pipe that stays open and silent until teardown
    HeldPipe,
}

impl ReaderKind {
    /// tio forwards its stdin to the port and quits when stdin reaches EOF
    pub fn stdin_mode(self) -> StdinMode {
        match self {
            ReaderKind::Tio => StdinMode::HeldPipe,
            ReaderKind::Cat => StdinMode::Null,
            #[cfg(feature = "serial")]
            ReaderKind::Native => StdinMode::Null,
        }
    }
}

/// Subprocess command for a reader
pub fn reader_command(kind: ReaderKind, config: &CaptureConfig) -> Option<Command> {
    let device = config.device.as_os_str();
    match kind {
        ReaderKind::Tio => {
            let mut cmd = Command::new(&config.tio_program);
            cmd.arg("--mute")
                .arg("--baudrate")
                .arg(config.baud_rate.to_string())
                .arg(device);
            Some(cmd)
        }
        ReaderKind::Cat => {
            let mut cmd = Command::new("cat");
            cmd.arg(device);
            Some(cmd)
        }
        #[cfg(feature = "serial")]
        ReaderKind::Native => None,
    }
}

/// Start `kind` feeding `tx`; its handle goes into `teardown`
pub fn spawn_reader(
    kind: ReaderKind,
    config: &CaptureConfig,
    tx: mpsc::Sender<String>,
    teardown: &mut Teardown,
) -> Result<()> {
    #[cfg(feature = "serial")]
    if kind == ReaderKind::Native {
        let port = super::port::PortConfig::new(&config.device.to_string_lossy())
            .with_baud_rate(config.baud_rate);
        let stop = super::port::spawn_native_reader(port, tx)?;
        teardown.push_stop_flag(stop);
        return Ok(());
    }

    let Some(cmd) = reader_command(kind, config) else {
        anyhow::bail!("{} reader has no subprocess", kind);
    };
    spawn_subprocess(&kind.to_string(), cmd, kind.stdin_mode(), tx, teardown)
}

/// Spawn `cmd` with piped stdout and pump its lines into `tx`
///
/// The child gets its own process group, so a terminal Ctrl+C reaches only
/// the capture daemon and the reader keeps running until teardown.
pub fn spawn_subprocess(
    label: &str,
    mut cmd: Command,
    stdin: StdinMode,
    tx: mpsc::Sender<String>,
    teardown: &mut Teardown,
) -> Result<()> {
    let stdin = match stdin {
        StdinMode::Null => Stdio::null(),
        StdinMode::HeldPipe => Stdio::piped(),
    };
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to start {} reader", label))?;

    debug!("Started {} reader (pid {:?})", label, child.id());

    let stdout = child
        .stdout
        .take()
        .context("Reader stdout was not captured")?;
    // A piped stdin stays in the child handle, open until teardown
    teardown.push_child(child);

    tokio::spawn(async move {
        if let Err(e) = pump_lines(stdout, tx).await {
            warn!("Serial reader stopped: {:#}", e);
        }
    });

    Ok(())
}

/// Forward newline-framed lines from `reader` until EOF or the receiver closes
pub async fn pump_lines<R: AsyncRead + Unpin>(reader: R, tx: mpsc::Sender<String>) -> Result<()> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .context("Failed to read serial stream")?;
        if read == 0 {
            return Ok(());
        }
        if tx.send(frame_line(&buf)).await.is_err() {
            return Ok(());
        }
    }
}

/// Drop the line terminator (`\n` or `\r\n`) and decode lossily
pub fn frame_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
