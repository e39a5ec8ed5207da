//! Serial device checks run before capture starts

use anyhow::{Context, Result};
use colored::Colorize;
use log::{debug, warn};
use std::path::Path;
use std::process::Command;

use super::error::CaptureFailure;
use crate::outcome::Outcome;
use crate::prompt::{confirm, Prompter};

/// Group that owns serial devices on Debian-like systems
pub const SERIAL_GROUP: &str = "dialout";

/// How the current user can reach the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAccess {
    ReadWrite,
    Missing,
    Denied,
}

/// Host facilities the preflight check depends on
pub trait DeviceHost {
    /// Check existence, then read/write permission, of `path`
    fn access(&self, path: &Path) -> DeviceAccess;

    /// Login name to offer the group change for
    fn user(&self) -> Option<String>;

    /// Add `user` to `group` (needs privileges)
    fn add_to_group(&mut self, user: &str, group: &str) -> Result<()>;
}

/// The local machine: `access(2)`, `$USER` and `sudo usermod`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl DeviceHost for SystemHost {
    fn access(&self, path: &Path) -> DeviceAccess {
        check_device(path)
    }

    fn user(&self) -> Option<String> {
        std::env::var("USER").ok().filter(|user| !user.is_empty())
    }

    fn add_to_group(&mut self, user: &str, group: &str) -> Result<()> {
        let status = Command::new("sudo")
            .args(["usermod", "-aG", group, user])
            .status()
            .context("Failed to run sudo usermod")?;

        if !status.success() {
            anyhow::bail!("usermod exited with {}", status);
        }
        Ok(())
    }
}

/// Check existence, then read/write permission, of `path`
pub fn check_device(path: &Path) -> DeviceAccess {
    if !path.exists() {
        return DeviceAccess::Missing;
    }
    if has_read_write_access(path) {
        DeviceAccess::ReadWrite
    } else {
        DeviceAccess::Denied
    }
}

#[cfg(unix)]
fn has_read_write_access(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call
    unsafe { libc::access(c_path.as_ptr(), libc::R_OK | libc::W_OK) == 0 }
}

#[cfg(not(unix))]
fn has_read_write_access(path: &Path) -> bool {
    std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .is_ok()
}

/// Verify the device is usable on this machine
pub fn preflight(path: &Path, prompter: &mut dyn Prompter) -> Result<Outcome<CaptureFailure>> {
    preflight_on(&mut SystemHost, path, prompter)
}

/// Verify the device is usable, offering to fix group membership if not
pub fn preflight_on(
    host: &mut dyn DeviceHost,
    path: &Path,
    prompter: &mut dyn Prompter,
) -> Result<Outcome<CaptureFailure>> {
    let access = host.access(path);
    debug!("Access check for {}: {:?}", path.display(), access);

    match access {
        DeviceAccess::ReadWrite => {
            println!(
                "{} Device {} is readable and writable",
                "[OK]".green().bold(),
                path.display().to_string().white()
            );
            Ok(Outcome::Continue)
        }
        DeviceAccess::Missing => Ok(Outcome::ExitFail(CaptureFailure::DeviceMissing {
            path: path.to_path_buf(),
        })),
        DeviceAccess::Denied => {
            eprintln!(
                "{} No read/write permission on {}",
                "[WARN]".yellow().bold(),
                path.display()
            );

            let Some(user) = host.user() else {
                warn!("USER is not set, cannot offer a group change");
                return Ok(Outcome::ExitFail(CaptureFailure::PermissionDenied {
                    path: path.to_path_buf(),
                }));
            };

            let question = format!(
                "Add {} to the '{}' group (sudo usermod -aG {} {})?",
                user, SERIAL_GROUP, SERIAL_GROUP, user
            );
            if !confirm(prompter, &question)? {
                return Ok(Outcome::ExitFail(CaptureFailure::PermissionDenied {
                    path: path.to_path_buf(),
                }));
            }

            host.add_to_group(&user, SERIAL_GROUP)?;
            Ok(Outcome::ExitFail(CaptureFailure::PermissionRequested {
                path: path.to_path_buf(),
                user,
                group: SERIAL_GROUP.to_string(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompter;

    #[test]
    fn test_missing_device_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ttyACM0");
        let mut prompter = ScriptedPrompter::new(&[]);

        let outcome = preflight(&path, &mut prompter).unwrap();
        assert_eq!(outcome.exit_code(), 1);

        match outcome {
            Outcome::ExitFail(failure) => {
                assert_eq!(failure, CaptureFailure::DeviceMissing { path: path.clone() });
                assert!(failure.to_string().contains(&path.display().to_string()));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(prompter.questions.is_empty());
    }

    #[test]
    fn test_accessible_device_continues() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(check_device(file.path()), DeviceAccess::ReadWrite);

        let outcome = preflight(file.path(), &mut ScriptedPrompter::new(&[])).unwrap();
        assert_eq!(outcome, Outcome::Continue);
    }

    /// Host where every device is locked
    struct LockedHost {
        user: Option<String>,
        group_changes: Vec<(String, String)>,
    }

    impl LockedHost {
        fn new(user: Option<&str>) -> Self {
            Self {
                user: user.map(str::to_string),
                group_changes: Vec::new(),
            }
        }
    }

    impl DeviceHost for LockedHost {
        fn access(&self, _path: &Path) -> DeviceAccess {
            DeviceAccess::Denied
        }

        fn user(&self) -> Option<String> {
            self.user.clone()
        }

        fn add_to_group(&mut self, user: &str, group: &str) -> Result<()> {
            self.group_changes.push((user.to_string(), group.to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_declined_group_change_is_permission_denied() {
        let path = Path::new("/dev/ttyACM0");
        let mut host = LockedHost::new(Some("operator"));
        let mut prompter = ScriptedPrompter::new(&["n"]);

        let outcome = preflight_on(&mut host, path, &mut prompter).unwrap();

        assert_eq!(
            outcome,
            Outcome::ExitFail(CaptureFailure::PermissionDenied {
                path: path.to_path_buf()
            })
        );
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(prompter.questions.len(), 1);
        assert!(prompter.questions[0].contains("'dialout' group"));
        assert!(prompter.questions[0].contains("operator"));
        assert!(host.group_changes.is_empty());
    }

    #[test]
    fn test_accepted_group_change_still_exits_one() {
        let path = Path::new("/dev/ttyACM0");
        let mut host = LockedHost::new(Some("operator"));
        let mut prompter = ScriptedPrompter::new(&["y"]);

        let outcome = preflight_on(&mut host, path, &mut prompter).unwrap();

        assert_eq!(
            outcome,
            Outcome::ExitFail(CaptureFailure::PermissionRequested {
                path: path.to_path_buf(),
                user: "operator".to_string(),
                group: SERIAL_GROUP.to_string(),
            })
        );
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(
            host.group_changes,
            vec![("operator".to_string(), "dialout".to_string())]
        );
    }

    #[test]
    fn test_denied_without_user_does_not_prompt() {
        let mut host = LockedHost::new(None);
        let mut prompter = ScriptedPrompter::new(&["y"]);

        let outcome = preflight_on(&mut host, Path::new("/dev/ttyACM0"), &mut prompter).unwrap();

        assert!(matches!(
            outcome,
            Outcome::ExitFail(CaptureFailure::PermissionDenied { .. })
        ));
        assert!(prompter.questions.is_empty());
        assert!(host.group_changes.is_empty());
    }
}
