//! Capture loop and run orchestration
//!
//! Lines arrive on a channel from whichever reader was selected. The loop
//! stops when the cancellation token fires (SIGINT/SIGTERM) or the reader's
//! stream ends, and every spawned reader is torn down on the way out.
//!
//! Preflight and reader selection may prompt and run `sudo`, so they finish
//! before the async runtime starts.

use anyhow::{Context, Result};
use colored::Colorize;
use log::info;
use std::io::{self, Write};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::error::CaptureFailure;
use super::preflight::preflight;
use super::reader::{select_reader, spawn_reader, ReaderKind};
use super::session::LogSession;
use super::teardown::Teardown;
use crate::config::CaptureConfig;
use crate::outcome::Outcome;
use crate::prompt::Prompter;

/// Buffered lines between reader and writer
const LINE_CHANNEL_CAPACITY: usize = 1024;

/// How long a closed stream waits for a signal that may have closed it
const SIGNAL_GRACE: Duration = Duration::from_millis(250);

/// Why the capture loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    SourceClosed,
}

/// Write every received line until cancelled or the source ends
pub async fn capture_loop<W: Write>(
    lines: &mut mpsc::Receiver<String>,
    session: &mut LogSession,
    console: &mut W,
    token: &CancellationToken,
) -> Result<StopReason> {
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(StopReason::Cancelled),
            line = lines.recv() => match line {
                Some(line) => session.write_line(&line, console)?,
                None => return Ok(StopReason::SourceClosed),
            },
        }
    }
}

/// Cancel `token` on SIGINT or SIGTERM
pub fn install_signal_handlers(token: CancellationToken) -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt =
            signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
        let mut terminate =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        tokio::spawn(async move {
            tokio::select! {
                _ = interrupt.recv() => {}
                _ = terminate.recv() => {}
            }
            println!("\n{}", "Stopping capture...".yellow());
            token.cancel();
        });
    }

    #[cfg(not(unix))]
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n{}", "Stopping capture...".yellow());
            token.cancel();
        }
    });

    Ok(())
}

/// A stream that ended around a signal counts as cancelled
pub async fn settle_source_closed(token: &CancellationToken, grace: Duration) -> StopReason {
    match tokio::time::timeout(grace, token.cancelled()).await {
        Ok(()) => StopReason::Cancelled,
        Err(_) => StopReason::SourceClosed,
    }
}

/// Preflight, pick a reader, then capture until interrupted
pub fn run_capture(
    config: &CaptureConfig,
    prompter: &mut dyn Prompter,
) -> Result<Outcome<CaptureFailure>> {
    match preflight(&config.device, prompter)? {
        Outcome::Continue => {}
        other => return Ok(other),
    }

    let kind = select_reader(config, prompter)?;
    let session = LogSession::open(&config.log_dir, &config.file_prefix, config.max_file_size_mb)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(capture(config, kind, session))
}

async fn capture(
    config: &CaptureConfig,
    kind: ReaderKind,
    mut session: LogSession,
) -> Result<Outcome<CaptureFailure>> {
    let token = CancellationToken::new();
    install_signal_handlers(token.clone())?;

    let (tx, mut rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
    let mut teardown = Teardown::new();
    spawn_reader(kind, config, tx, &mut teardown)?;

    print_header(config, &kind.to_string(), &session);

    let mut console = io::stdout();
    let result = match capture_loop(&mut rx, &mut session, &mut console, &token).await {
        Ok(StopReason::SourceClosed) => Ok(settle_source_closed(&token, SIGNAL_GRACE).await),
        other => other,
    };

    teardown.shutdown().await;
    print_summary(&session);

    match result? {
        StopReason::Cancelled => {
            info!("Capture stopped by signal");
            Ok(Outcome::ExitOk)
        }
        StopReason::SourceClosed => Ok(Outcome::ExitFail(CaptureFailure::SourceClosed {
            path: config.device.clone(),
        })),
    }
}

fn print_header(config: &CaptureConfig, reader: &str, session: &LogSession) {
    println!("{}", "=".repeat(70).dimmed());
    println!("{}: {}", "Device".cyan(), config.device.display().to_string().white());
    println!("{}: {}", "Reader".cyan(), reader.white());
    println!(
        "{}: {}",
        "Log".cyan(),
        session.current_path().display().to_string().white()
    );
    println!("{}: {} MB", "Rotate at".cyan(), config.max_file_size_mb);
    println!("{}", "=".repeat(70).dimmed());
    println!("{}", "Press Ctrl+C to stop\n".yellow());
}

fn print_summary(session: &LogSession) {
    println!("\n{}", "=".repeat(70).dimmed());
    println!("{}", "--- Capture Summary ---".cyan().bold());
    println!(
        "Started: {}",
        session.start_time().format("%Y-%m-%d %H:%M:%S")
    );
    println!("Total lines: {}", session.line_count());
    println!("Log files: {}", session.files().len());
    for file in session.files() {
        println!("  {}", file.display());
    }
    println!("{}", "=".repeat(70).dimmed());
}
