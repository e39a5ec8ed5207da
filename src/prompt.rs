//! Interactive operator input

use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

/// Source of operator answers
pub trait Prompter {
    /// Show `question` and read one line of input.
    ///
    /// Returns `None` when input is exhausted (EOF).
    fn ask(&mut self, question: &str) -> Result<Option<String>>;
}

/// Prompter backed by the process's standard input
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        print!("{} ", question);
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut line = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read from stdin")?;

        if read == 0 {
            // Keep the terminal tidy when stdin is closed
            println!();
            return Ok(None);
        }

        Ok(Some(line.trim().to_string()))
    }
}

/// Ask a yes/no question. EOF and anything but y/yes count as "no".
pub fn confirm(prompter: &mut dyn Prompter, question: &str) -> Result<bool> {
    let answer = prompter.ask(&format!("{} [y/N]", question))?;
    Ok(matches!(
        answer.as_deref().map(str::to_lowercase).as_deref(),
        Some("y") | Some("yes")
    ))
}

/// Prompter that replays canned answers, then reports EOF
#[cfg(test)]
pub(crate) struct ScriptedPrompter {
    answers: std::collections::VecDeque<String>,
    pub questions: Vec<String>,
}

#[cfg(test)]
impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|s| s.to_string()).collect(),
            questions: Vec::new(),
        }
    }
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        self.questions.push(question.to_string());
        Ok(self.answers.pop_front())
    }
}
