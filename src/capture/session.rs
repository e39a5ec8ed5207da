//! Size-rotated log files
//!
//! One file is active at a time. Before each line is written the active
//! file's size is checked in whole megabytes; at or above the threshold a
//! new, uniquely named file takes over and the old one is never touched
//! again. Rotation is per line, so a burst can overshoot the threshold by
//! at most one line.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::info;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Prefix a line with a millisecond local timestamp
pub fn stamp_line(now: &DateTime<Local>, line: &str) -> String {
    format!("[{}] {}", now.format("%Y-%m-%d %H:%M:%S%.3f"), line)
}

/// Active log file plus the files rotated away from
pub struct LogSession {
    dir: PathBuf,
    prefix: String,
    max_size_mb: u64,
    start_time: DateTime<Local>,
    current_path: PathBuf,
    writer: BufWriter<File>,
    byte_count: u64,
    line_count: u64,
    files: Vec<PathBuf>,
}

impl LogSession {
    /// Create `dir` if needed and open the first log file
    pub fn open(dir: &Path, prefix: &str, max_size_mb: u64) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

        let start_time = Local::now();
        let current_path = unique_log_path(dir, prefix, &start_time);
        let writer = open_log(&current_path)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            max_size_mb: max_size_mb.max(1),
            start_time,
            files: vec![current_path.clone()],
            current_path,
            writer,
            byte_count: 0,
            line_count: 0,
        })
    }

    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    pub fn start_time(&self) -> &DateTime<Local> {
        &self.start_time
    }

    /// Size of the active file as of the last check
    pub fn byte_count(&self) -> u64 {
        self.byte_count
    }

    pub fn line_count(&self) -> u64 {
        self.line_count
    }

    /// Every file written this session, oldest first
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Stamp `line`, echo it to `console` and append it to the active file
    pub fn write_line<W: Write>(&mut self, line: &str, console: &mut W) -> Result<()> {
        self.byte_count = self
            .writer
            .get_ref()
            .metadata()
            .with_context(|| format!("Failed to stat {}", self.current_path.display()))?
            .len();

        if self.byte_count / BYTES_PER_MB >= self.max_size_mb {
            self.rotate()?;
        }

        let stamped = stamp_line(&Local::now(), line);
        writeln!(console, "{}", stamped).context("Failed to write to console")?;

        writeln!(self.writer, "{}", stamped)
            .and_then(|_| self.writer.flush())
            .with_context(|| format!("Failed to write log file: {}", self.current_path.display()))?;

        self.byte_count += stamped.len() as u64 + 1;
        self.line_count += 1;
        Ok(())
    }

    /// Switch to a fresh log file
    pub fn rotate(&mut self) -> Result<()> {
        let next = unique_log_path(&self.dir, &self.prefix, &Local::now());
        let writer = open_log(&next)?;

        info!(
            "Rotating log {} ({} bytes) -> {}",
            self.current_path.display(),
            self.byte_count,
            next.display()
        );

        self.writer = writer;
        self.current_path = next.clone();
        self.files.push(next);
        self.byte_count = 0;
        Ok(())
    }
}

fn open_log(path: &Path) -> Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to create log file: {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// `<prefix>_<YYYYmmdd_HHMMSS>.log`, suffixed `_<n>` if that name is taken
fn unique_log_path(dir: &Path, prefix: &str, now: &DateTime<Local>) -> PathBuf {
    let stem = format!("{}_{}", prefix, now.format("%Y%m%d_%H%M%S"));
    let candidate = dir.join(format!("{}.log", stem));
    if !candidate.exists() {
        return candidate;
    }

    (1u32..)
        .map(|n| dir.join(format!("{}_{}.log", stem, n)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_stamp_format() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
            + chrono::Duration::milliseconds(42);
        assert_eq!(stamp_line(&now, "boot ok"), "[2024-03-09 14:05:07.042] boot ok");
    }

    #[test]
    fn test_write_to_console_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = LogSession::open(dir.path(), "serial", 10).unwrap();
        let mut console = Vec::new();

        session.write_line("hello", &mut console).unwrap();
        session.write_line("world", &mut console).unwrap();

        let logged = fs::read_to_string(session.current_path()).unwrap();
        assert_eq!(logged, String::from_utf8(console).unwrap());
        assert_eq!(logged.lines().count(), 2);
        assert!(logged.lines().next().unwrap().ends_with("] hello"));
        assert_eq!(session.line_count(), 2);
        assert_eq!(session.files().len(), 1);
    }

    #[test]
    fn test_log_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let session = LogSession::open(dir.path(), "serial", 10).unwrap();
        let name = session.current_path().file_name().unwrap().to_string_lossy().to_string();

        assert!(name.starts_with("serial_"));
        assert!(name.ends_with(".log"));
        assert_eq!(name.len(), "serial_20240309_140507.log".len());
    }

    #[test]
    fn test_rotation_at_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = LogSession::open(dir.path(), "serial", 1).unwrap();
        let mut console = std::io::sink();

        let big = "x".repeat(BYTES_PER_MB as usize);
        session.write_line(&big, &mut console).unwrap();
        let first = session.current_path().to_path_buf();
        let first_len = fs::metadata(&first).unwrap().len();
        assert!(first_len >= BYTES_PER_MB);

        session.write_line("after rotation", &mut console).unwrap();
        session.write_line("still new file", &mut console).unwrap();

        assert_ne!(session.current_path(), first.as_path());
        assert_eq!(session.files().len(), 2);
        assert_eq!(fs::metadata(&first).unwrap().len(), first_len);

        let second = fs::read_to_string(session.current_path()).unwrap();
        assert_eq!(second.lines().count(), 2);
    }

    #[test]
    fn test_below_threshold_stays_put() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = LogSession::open(dir.path(), "serial", 1).unwrap();
        let mut console = std::io::sink();

        let almost = "x".repeat(BYTES_PER_MB as usize - 100);
        session.write_line(&almost, &mut console).unwrap();
        session.write_line("small", &mut console).unwrap();

        assert_eq!(session.files().len(), 1);
    }

    #[test]
    fn test_name_collision_gets_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local::now();
        let first = unique_log_path(dir.path(), "serial", &now);
        File::create(&first).unwrap();

        let second = unique_log_path(dir.path(), "serial", &now);
        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with("_1.log"));
    }
}
