//! Pairing and connection workflow
//!
//! Drives the device towards paired + bonded + trusted + connected through
//! three bounded loops:
//!
//! - **scan**: discover until the device is visible
//! - **pair/bond**: a partial pairing (not paired or not bonded) is treated
//!   as corrupted, so the record is removed and the device re-scanned before
//!   trusting and pairing again
//! - **connect**: connect and re-check every flag; connected with a flag
//!   missing is fatal because only the device side can fix it

use anyhow::Result;
use colored::Colorize;
use log::{debug, warn};
use std::thread;
use std::time::Duration;

use super::ctl::BluetoothCtl;
use super::error::ConnectFailure;
use super::menu::{Menu, MenuAction};
use crate::config::BluetoothConfig;
use crate::outcome::Outcome;
use crate::prompt::Prompter;

pub type StepOutcome = Outcome<ConnectFailure>;

/// Bail out of the enclosing function unless the step said `Continue`
macro_rules! proceed {
    ($step:expr) => {
        match $step {
            Outcome::Continue => {}
            other => return Ok(other),
        }
    };
}

/// Connection orchestrator for one device
pub struct Orchestrator<C: BluetoothCtl> {
    ctl: C,
    config: BluetoothConfig,
}

impl<C: BluetoothCtl> Orchestrator<C> {
    pub fn new(ctl: C, config: BluetoothConfig) -> Self {
        Self { ctl, config }
    }

    pub fn ctl(&self) -> &C {
        &self.ctl
    }

    fn address(&self) -> &str {
        &self.config.address
    }

    /// Show the menu for the current state and carry out the chosen action
    pub fn run(&mut self, prompter: &mut dyn Prompter) -> Result<StepOutcome> {
        let address = self.config.address.clone();
        let state = self.ctl.query_device_state(&address)?;
        debug!("Initial state of {}: {}", address, state);

        let menu = Menu::for_state(&state);
        menu.print(&address, &state);

        match menu.select(prompter)? {
            Ok(action) => self.perform(action),
            Err(failure) => Ok(Outcome::ExitFail(failure)),
        }
    }

    /// Carry out one menu action to completion
    pub fn perform(&mut self, action: MenuAction) -> Result<StepOutcome> {
        let address = self.config.address.clone();

        match action {
            MenuAction::Disconnect => {
                println!("{} Disconnecting {}", "[*]".cyan().bold(), address.white());
                self.ctl.disconnect(&address)?;

                let state = self.ctl.query_device_state(&address)?;
                if state.connected {
                    return Ok(Outcome::ExitFail(ConnectFailure::DisconnectFailed { address }));
                }
                println!("{} Disconnected", "[OK]".green().bold());
                Ok(Outcome::ExitOk)
            }
            MenuAction::Remove => {
                println!("{} Removing {}", "[*]".cyan().bold(), address.white());
                self.ctl.remove(&address)?;

                let state = self.ctl.query_device_state(&address)?;
                if state.exists {
                    return Ok(Outcome::ExitFail(ConnectFailure::RemoveFailed { address }));
                }
                println!("{} Device removed", "[OK]".green().bold());
                Ok(Outcome::ExitOk)
            }
            MenuAction::Connect => self.pair_and_connect(false),
            MenuAction::SearchAndPair => {
                self.ctl.power_on()?;
                self.pair_and_connect(true)
            }
            MenuAction::Exit => Ok(Outcome::ExitOk),
        }
    }

    fn pair_and_connect(&mut self, scan_first: bool) -> Result<StepOutcome> {
        if scan_first {
            proceed!(self.scan_loop()?);
        }
        proceed!(self.pair_loop()?);
        proceed!(self.connect_loop()?);

        let state = self.ctl.query_device_state(&self.config.address)?;
        println!(
            "{} {} is paired, bonded, trusted and connected",
            "[OK]".green().bold(),
            self.address().white().bold()
        );
        debug!("Final state: {}", state);
        Ok(Outcome::ExitOk)
    }

    /// Scan until the device is visible, at most `scan_attempts` times
    pub fn scan_loop(&mut self) -> Result<StepOutcome> {
        let address = self.config.address.clone();
        let attempts = self.config.scan_attempts;

        for attempt in 1..=attempts {
            println!(
                "{} Scanning for {} (attempt {}/{})",
                "[*]".cyan().bold(),
                address.white(),
                attempt,
                attempts
            );
            self.ctl.scan(self.config.scan_timeout())?;

            if self.ctl.is_visible(&address)? {
                println!("{} Found {}", "[OK]".green().bold(), address.white().bold());
                return Ok(Outcome::Continue);
            }

            if attempt < attempts {
                pause(self.config.scan_pause());
            }
        }

        Ok(Outcome::ExitFail(ConnectFailure::DeviceNotFound { address, attempts }))
    }

    /// Pair and bond, at most `pair_attempts` times
    pub fn pair_loop(&mut self) -> Result<StepOutcome> {
        let address = self.config.address.clone();
        let attempts = self.config.pair_attempts;

        for attempt in 1..=attempts {
            println!(
                "{} Pairing with {} (attempt {}/{})",
                "[*]".cyan().bold(),
                address.white(),
                attempt,
                attempts
            );

            let state = self.ctl.query_device_state(&address)?;
            let mut trusted = state.trusted;

            if !state.is_bonded_pair() {
                warn!("Partial pairing for {} ({}), resetting", address, state);
                println!(
                    "{} Incomplete pairing ({}), removing device and scanning again",
                    "[WARN]".yellow().bold(),
                    state.to_string().dimmed()
                );
                self.ctl.remove(&address)?;
                trusted = false;
                proceed!(self.scan_loop()?);
            }

            if !trusted {
                self.ctl.trust(&address)?;
            }

            let result = self.ctl.pair(&address)?;
            if result.is_paired() {
                let after = self.ctl.query_device_state(&address)?;
                if after.is_bonded_pair() {
                    println!("{} Paired and bonded", "[OK]".green().bold());
                    return Ok(Outcome::Continue);
                }
                warn!("Pairing reported success but device is not bonded: {}", after);
            } else {
                warn!("Pair attempt {} failed: {:?}", attempt, result);
            }

            if attempt < attempts {
                pause(self.config.pair_retry());
            }
        }

        Ok(Outcome::ExitFail(ConnectFailure::PairingFailed { address, attempts }))
    }

    /// Connect, at most `connect_attempts` times
    pub fn connect_loop(&mut self) -> Result<StepOutcome> {
        let address = self.config.address.clone();
        let attempts = self.config.connect_attempts;

        for attempt in 1..=attempts {
            println!(
                "{} Connecting to {} (attempt {}/{})",
                "[*]".cyan().bold(),
                address.white(),
                attempt,
                attempts
            );
            self.ctl.connect(&address)?;

            let state = self.ctl.query_device_state(&address)?;
            if state.is_ready() {
                println!("{} Connected", "[OK]".green().bold());
                return Ok(Outcome::Continue);
            }

            // Retrying cannot repair a device-side pairing
            if state.connected {
                return Ok(Outcome::ExitFail(ConnectFailure::InconsistentState {
                    address,
                    state,
                }));
            }

            warn!("Connect attempt {} did not connect: {}", attempt, state);
            if attempt < attempts {
                pause(self.config.connect_retry());
            }
        }

        Ok(Outcome::ExitFail(ConnectFailure::ConnectFailed { address, attempts }))
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::ctl::PairResult;
    use crate::bluetooth::state::DeviceState;
    use crate::prompt::ScriptedPrompter;
    use std::collections::VecDeque;

    const ADDR: &str = "00:1A:7D:DA:71:13";

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Query,
        IsVisible,
        PowerOn,
        Scan,
        Trust,
        Pair,
        Connect,
        Disconnect,
        Remove,
    }

    /// Scripted Bluetooth stack. Queues repeat their last entry once drained.
    struct MockCtl {
        states: VecDeque<DeviceState>,
        visibility: VecDeque<bool>,
        pair_results: VecDeque<PairResult>,
        calls: Vec<Call>,
    }

    impl MockCtl {
        fn new(states: &[DeviceState]) -> Self {
            Self {
                states: states.iter().copied().collect(),
                visibility: VecDeque::from([true]),
                pair_results: VecDeque::from([PairResult::Success]),
                calls: Vec::new(),
            }
        }

        fn visibility(mut self, seq: &[bool]) -> Self {
            self.visibility = seq.iter().copied().collect();
            self
        }

        fn pair_results(mut self, seq: &[PairResult]) -> Self {
            self.pair_results = seq.iter().cloned().collect();
            self
        }

        fn count(&self, call: Call) -> usize {
            self.calls.iter().filter(|c| **c == call).count()
        }

        fn position(&self, call: Call) -> Option<usize> {
            self.calls.iter().position(|c| *c == call)
        }
    }

    fn next<T: Clone>(queue: &mut VecDeque<T>) -> T {
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }

    impl BluetoothCtl for MockCtl {
        fn query_device_state(&mut self, _address: &str) -> Result<DeviceState> {
            self.calls.push(Call::Query);
            Ok(next(&mut self.states))
        }

        fn is_visible(&mut self, _address: &str) -> Result<bool> {
            self.calls.push(Call::IsVisible);
            Ok(next(&mut self.visibility))
        }

        fn power_on(&mut self) -> Result<()> {
            self.calls.push(Call::PowerOn);
            Ok(())
        }

        fn scan(&mut self, _timeout: Duration) -> Result<()> {
            self.calls.push(Call::Scan);
            Ok(())
        }

        fn trust(&mut self, _address: &str) -> Result<()> {
            self.calls.push(Call::Trust);
            Ok(())
        }

        fn pair(&mut self, _address: &str) -> Result<PairResult> {
            self.calls.push(Call::Pair);
            Ok(next(&mut self.pair_results))
        }

        fn connect(&mut self, _address: &str) -> Result<()> {
            self.calls.push(Call::Connect);
            Ok(())
        }

        fn disconnect(&mut self, _address: &str) -> Result<()> {
            self.calls.push(Call::Disconnect);
            Ok(())
        }

        fn remove(&mut self, _address: &str) -> Result<()> {
            self.calls.push(Call::Remove);
            Ok(())
        }
    }

    fn fast_config() -> BluetoothConfig {
        BluetoothConfig {
            address: ADDR.to_string(),
            scan_pause_secs: 0,
            pair_retry_secs: 0,
            connect_retry_secs: 0,
            ..Default::default()
        }
    }

    fn known() -> DeviceState {
        DeviceState {
            exists: true,
            ..Default::default()
        }
    }

    fn bonded_trusted() -> DeviceState {
        DeviceState {
            exists: true,
            paired: true,
            bonded: true,
            trusted: true,
            connected: false,
        }
    }

    fn ready() -> DeviceState {
        DeviceState {
            connected: true,
            ..bonded_trusted()
        }
    }

    #[test]
    fn test_scan_loop_is_bounded() {
        let ctl = MockCtl::new(&[DeviceState::default()]).visibility(&[false]);
        let mut orch = Orchestrator::new(ctl, fast_config());

        let outcome = orch.scan_loop().unwrap();

        assert_eq!(
            outcome,
            Outcome::ExitFail(ConnectFailure::DeviceNotFound {
                address: ADDR.to_string(),
                attempts: 20
            })
        );
        assert_eq!(orch.ctl().count(Call::Scan), 20);
    }

    #[test]
    fn test_scan_loop_stops_on_first_sighting() {
        let ctl = MockCtl::new(&[DeviceState::default()]).visibility(&[false, false, true]);
        let mut orch = Orchestrator::new(ctl, fast_config());

        assert_eq!(orch.scan_loop().unwrap(), Outcome::Continue);
        assert_eq!(orch.ctl().count(Call::Scan), 3);
    }

    #[test]
    fn test_partial_pairing_is_removed_before_trust_and_pair() {
        let half_paired = DeviceState {
            exists: true,
            paired: true,
            bonded: false,
            trusted: true,
            connected: false,
        };
        let ctl = MockCtl::new(&[half_paired, bonded_trusted()]);
        let mut orch = Orchestrator::new(ctl, fast_config());

        assert_eq!(orch.pair_loop().unwrap(), Outcome::Continue);

        let ctl = orch.ctl();
        let remove = ctl.position(Call::Remove).unwrap();
        let scan = ctl.position(Call::Scan).unwrap();
        let trust = ctl.position(Call::Trust).unwrap();
        let pair = ctl.position(Call::Pair).unwrap();
        assert!(remove < scan && scan < trust && trust < pair);
    }

    #[test]
    fn test_every_unpaired_poll_is_followed_by_remove() {
        let ctl = MockCtl::new(&[known()]).pair_results(&[PairResult::Failed("nope".into())]);
        let mut orch = Orchestrator::new(ctl, fast_config());

        let outcome = orch.pair_loop().unwrap();
        assert_eq!(
            outcome,
            Outcome::ExitFail(ConnectFailure::PairingFailed {
                address: ADDR.to_string(),
                attempts: 10
            })
        );

        let calls = &orch.ctl().calls;
        assert_eq!(orch.ctl().count(Call::Pair), 10);
        for (i, call) in calls.iter().enumerate() {
            if *call == Call::Query {
                let next_action = calls[i + 1..]
                    .iter()
                    .find(|c| matches!(c, Call::Remove | Call::Trust | Call::Pair));
                assert_eq!(next_action, Some(&Call::Remove));
            }
        }
    }

    #[test]
    fn test_trusted_bonded_device_skips_remove_and_trust() {
        let ctl = MockCtl::new(&[bonded_trusted()])
            .pair_results(&[PairResult::AlreadyExists]);
        let mut orch = Orchestrator::new(ctl, fast_config());

        assert_eq!(orch.pair_loop().unwrap(), Outcome::Continue);
        assert_eq!(orch.ctl().count(Call::Remove), 0);
        assert_eq!(orch.ctl().count(Call::Trust), 0);
        assert_eq!(orch.ctl().count(Call::Pair), 1);
    }

    #[test]
    fn test_pair_success_requires_bonding() {
        let paired_only = DeviceState {
            bonded: false,
            ..bonded_trusted()
        };
        // Poll, pair says success, re-check shows no bond; next round bonds
        let ctl = MockCtl::new(&[bonded_trusted(), paired_only, bonded_trusted()]);
        let mut orch = Orchestrator::new(ctl, fast_config());

        assert_eq!(orch.pair_loop().unwrap(), Outcome::Continue);
        assert_eq!(orch.ctl().count(Call::Pair), 2);
    }

    #[test]
    fn test_connected_but_untrusted_is_fatal() {
        let untrusted = DeviceState {
            trusted: false,
            ..ready()
        };
        let ctl = MockCtl::new(&[untrusted]);
        let mut orch = Orchestrator::new(ctl, fast_config());

        let outcome = orch.connect_loop().unwrap();

        assert_eq!(
            outcome,
            Outcome::ExitFail(ConnectFailure::InconsistentState {
                address: ADDR.to_string(),
                state: untrusted
            })
        );
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(orch.ctl().count(Call::Connect), 1);
    }

    #[test]
    fn test_connect_loop_is_bounded() {
        let ctl = MockCtl::new(&[bonded_trusted()]);
        let mut orch = Orchestrator::new(ctl, fast_config());

        assert_eq!(
            orch.connect_loop().unwrap(),
            Outcome::ExitFail(ConnectFailure::ConnectFailed {
                address: ADDR.to_string(),
                attempts: 3
            })
        );
        assert_eq!(orch.ctl().count(Call::Connect), 3);
    }

    #[test]
    fn test_search_and_pair_from_unknown() {
        let ctl = MockCtl::new(&[
            DeviceState::default(),
            known(),
            bonded_trusted(),
            ready(),
        ]);
        let mut orch = Orchestrator::new(ctl, fast_config());
        let mut prompter = ScriptedPrompter::new(&["1"]);

        let outcome = orch.run(&mut prompter).unwrap();

        assert_eq!(outcome, Outcome::ExitOk);
        assert_eq!(prompter.questions, vec!["Choose [1-2]:".to_string()]);
        assert_eq!(orch.ctl().position(Call::PowerOn), Some(1));
        assert_eq!(orch.ctl().count(Call::Connect), 1);
    }

    #[test]
    fn test_connected_device_disconnect() {
        let ctl = MockCtl::new(&[ready(), bonded_trusted()]);
        let mut orch = Orchestrator::new(ctl, fast_config());
        let mut prompter = ScriptedPrompter::new(&["1"]);

        assert_eq!(orch.run(&mut prompter).unwrap(), Outcome::ExitOk);
        assert_eq!(
            orch.ctl().calls,
            vec![Call::Query, Call::Disconnect, Call::Query]
        );
    }

    #[test]
    fn test_disconnect_that_did_not_take_fails() {
        let ctl = MockCtl::new(&[ready()]);
        let mut orch = Orchestrator::new(ctl, fast_config());

        let outcome = orch.perform(MenuAction::Disconnect).unwrap();
        assert_eq!(
            outcome,
            Outcome::ExitFail(ConnectFailure::DisconnectFailed {
                address: ADDR.to_string()
            })
        );
        assert_eq!(outcome.exit_code(), 1);
    }

    #[test]
    fn test_remove_is_verified() {
        let ctl = MockCtl::new(&[known(), DeviceState::default()]);
        let mut orch = Orchestrator::new(ctl, fast_config());
        assert_eq!(orch.perform(MenuAction::Remove).unwrap(), Outcome::ExitOk);

        let ctl = MockCtl::new(&[known()]);
        let mut orch = Orchestrator::new(ctl, fast_config());
        assert_eq!(
            orch.perform(MenuAction::Remove).unwrap(),
            Outcome::ExitFail(ConnectFailure::RemoveFailed {
                address: ADDR.to_string()
            })
        );
    }

    #[test]
    fn test_invalid_choice_changes_nothing() {
        let ctl = MockCtl::new(&[known()]);
        let mut orch = Orchestrator::new(ctl, fast_config());
        let mut prompter = ScriptedPrompter::new(&["9"]);

        assert_eq!(
            orch.run(&mut prompter).unwrap(),
            Outcome::ExitFail(ConnectFailure::InvalidChoice("9".to_string()))
        );
        assert_eq!(orch.ctl().calls, vec![Call::Query]);
    }
}
