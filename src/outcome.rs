//! Step results shared by both tools
//!
//! Workflow steps never exit the process themselves. They return an
//! [`Outcome`] and the binary decides the exit code.

use colored::Colorize;
use std::fmt;

/// Result of a workflow step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<F> {
    /// Step reached its goal, the caller moves on to the next step
    Continue,
    /// Workflow finished, exit 0
    ExitOk,
    /// Workflow failed, exit 1
    ExitFail(F),
}

impl<F> Outcome<F> {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Continue | Outcome::ExitOk => 0,
            Outcome::ExitFail(_) => 1,
        }
    }

    pub fn is_continue(&self) -> bool {
        matches!(self, Outcome::Continue)
    }
}

/// Failure reason that knows how the operator can fix it
pub trait Remediation: fmt::Display {
    /// Numbered steps printed after the error line
    fn remediation(&self) -> Vec<String>;
}

/// Print a failure with its remediation steps to stderr
pub fn report_failure<F: Remediation>(failure: &F) {
    eprintln!("{} {}", "[ERROR]".red().bold(), failure);

    let steps = failure.remediation();
    if steps.is_empty() {
        return;
    }

    eprintln!("\n{}", "Troubleshooting:".white().bold());
    for (i, step) in steps.iter().enumerate() {
        eprintln!("  {}. {}", i + 1, step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Outcome::<()>::Continue.exit_code(), 0);
        assert_eq!(Outcome::<()>::ExitOk.exit_code(), 0);
        assert_eq!(Outcome::ExitFail("boom").exit_code(), 1);
    }
}
