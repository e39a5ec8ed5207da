//! Context menu offered for the device's current state

use anyhow::Result;
use colored::Colorize;

use super::error::ConnectFailure;
use super::state::{DeviceState, Presence};
use crate::prompt::Prompter;

/// Action picked by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Disconnect,
    Remove,
    Connect,
    SearchAndPair,
    Exit,
}

const CONNECTED_OPTIONS: &[(MenuAction, &str)] = &[
    (MenuAction::Disconnect, "Disconnect"),
    (MenuAction::Remove, "Remove (unpair) device"),
    (MenuAction::Exit, "Exit"),
];

const DISCONNECTED_OPTIONS: &[(MenuAction, &str)] = &[
    (MenuAction::Connect, "Connect"),
    (MenuAction::Remove, "Remove (unpair) device"),
    (MenuAction::Exit, "Exit"),
];

const UNKNOWN_OPTIONS: &[(MenuAction, &str)] = &[
    (MenuAction::SearchAndPair, "Search and pair"),
    (MenuAction::Exit, "Exit"),
];

/// Numbered list of actions for one [`Presence`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Menu {
    pub presence: Presence,
}

impl Menu {
    pub fn for_state(state: &DeviceState) -> Self {
        Self {
            presence: Presence::from(state),
        }
    }

    pub fn options(&self) -> &'static [(MenuAction, &'static str)] {
        match self.presence {
            Presence::Connected => CONNECTED_OPTIONS,
            Presence::Disconnected => DISCONNECTED_OPTIONS,
            Presence::Unknown => UNKNOWN_OPTIONS,
        }
    }

    /// Map a 1-based option number to its action
    pub fn choose(&self, input: &str) -> Result<MenuAction, ConnectFailure> {
        let options = self.options();
        input
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| options.get(i))
            .map(|(action, _)| *action)
            .ok_or_else(|| ConnectFailure::InvalidChoice(input.trim().to_string()))
    }

    /// Print the menu header and options
    pub fn print(&self, address: &str, state: &DeviceState) {
        let status = match self.presence {
            Presence::Connected => "connected".green().bold(),
            Presence::Disconnected => "known, not connected".yellow().bold(),
            Presence::Unknown => "unknown".red().bold(),
        };

        println!("{}", "=".repeat(60));
        println!("{}: {}", "Device".cyan(), address.white().bold());
        println!("{}: {}", "Status".cyan(), status);
        if self.presence != Presence::Unknown {
            println!("{}: {}", "State".cyan(), state.to_string().dimmed());
        }
        println!("{}", "=".repeat(60));

        for (i, (_, label)) in self.options().iter().enumerate() {
            println!("  {}) {}", i + 1, label);
        }
    }

    /// Ask for a choice. EOF and invalid input are terminal failures.
    pub fn select(&self, prompter: &mut dyn Prompter) -> Result<Result<MenuAction, ConnectFailure>> {
        let prompt = format!("Choose [1-{}]:", self.options().len());
        Ok(match prompter.ask(&prompt)? {
            Some(answer) => self.choose(&answer),
            None => Err(ConnectFailure::NoInput),
        })
    }
}
