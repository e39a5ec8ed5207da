//! Device state as reported by `bluetoothctl info`
//!
//! The control utility's text output is not a stable interface, so parsing
//! is substring based and total: a missing or garbled field reads as `false`.

use std::fmt;

/// Markers looked for in `bluetoothctl info` output
const PAIRED_MARKER: &str = "Paired: yes";
const BONDED_MARKER: &str = "Bonded: yes";
const TRUSTED_MARKER: &str = "Trusted: yes";
const CONNECTED_MARKER: &str = "Connected: yes";

/// Printed in place of the field list for an address the controller does not know
const UNAVAILABLE_MARKER: &str = "not available";

/// Snapshot of a device's state, rebuilt on every poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceState {
    /// The controller has a record for the device
    pub exists: bool,
    pub paired: bool,
    pub bonded: bool,
    pub trusted: bool,
    pub connected: bool,
}

impl DeviceState {
    /// Parse `bluetoothctl info <address>` output
    pub fn parse(info: &str) -> Self {
        Self {
            exists: info.lines().any(is_device_header),
            paired: info.contains(PAIRED_MARKER),
            bonded: info.contains(BONDED_MARKER),
            trusted: info.contains(TRUSTED_MARKER),
            connected: info.contains(CONNECTED_MARKER),
        }
    }

    /// Paired, bonded, trusted and connected
    pub fn is_ready(&self) -> bool {
        self.paired && self.bonded && self.trusted && self.connected
    }

    /// Paired and bonded; anything less is a half-finished pairing
    pub fn is_bonded_pair(&self) -> bool {
        self.paired && self.bonded
    }
}

/// `Device <address> (public)` opens a known device's record
fn is_device_header(line: &str) -> bool {
    let line = line.trim();
    line.starts_with("Device ") && !line.ends_with(UNAVAILABLE_MARKER)
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |b: bool| if b { "yes" } else { "no" };
        write!(
            f,
            "paired={} bonded={} trusted={} connected={}",
            flag(self.paired),
            flag(self.bonded),
            flag(self.trusted),
            flag(self.connected)
        )
    }
}

/// Which menu the current state calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Connected,
    /// Known to the controller but not connected
    Disconnected,
    Unknown,
}

impl From<&DeviceState> for Presence {
    fn from(state: &DeviceState) -> Self {
        if state.connected {
            Presence::Connected
        } else if state.exists {
            Presence::Disconnected
        } else {
            Presence::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const READY_INFO: &str = "Device 00:1A:7D:DA:71:13 (public)
\tName: Sensor
\tAlias: Sensor
\tPaired: yes
\tBonded: yes
\tTrusted: yes
\tBlocked: no
\tConnected: yes
\tLegacyPairing: no
";

    #[test]
    fn test_parse_ready_device() {
        let state = DeviceState::parse(READY_INFO);
        assert!(state.exists);
        assert!(state.is_ready());
        assert_eq!(Presence::from(&state), Presence::Connected);
    }

    #[test]
    fn test_parse_disconnected_device() {
        let info = READY_INFO.replace("Connected: yes", "Connected: no");
        let state = DeviceState::parse(&info);
        assert!(state.paired && state.bonded && state.trusted);
        assert!(!state.connected);
        assert_eq!(Presence::from(&state), Presence::Disconnected);
    }

    #[test]
    fn test_unknown_device() {
        let state = DeviceState::parse("Device 00:1A:7D:DA:71:13 not available\n");
        assert!(!state.exists);
        assert_eq!(state, DeviceState::default());
        assert_eq!(Presence::from(&state), Presence::Unknown);
    }

    #[test]
    fn test_unavailable_with_ansi_prompt_is_unknown() {
        let info = "\u{1b}[0;94m[bluetooth]\u{1b}[0m# \nDevice 00:1A:7D:DA:71:13 not available\r\n";
        assert_eq!(Presence::from(&DeviceState::parse(info)), Presence::Unknown);
    }

    #[test]
    fn test_random_address_header_exists() {
        let state = DeviceState::parse("Device 00:1A:7D:DA:71:13 (random)\n\tPaired: no\n");
        assert!(state.exists);
        assert_eq!(Presence::from(&state), Presence::Disconnected);
    }

    #[test]
    fn test_missing_fields_read_false() {
        // Older BlueZ releases do not print a Bonded line
        let info = "Device 00:1A:7D:DA:71:13 (public)\n\tPaired: yes\n\tTrusted: no\n";
        let state = DeviceState::parse(info);
        assert!(state.paired);
        assert!(!state.bonded);
        assert!(!state.trusted);
        assert!(!state.is_bonded_pair());
    }

    #[test]
    fn test_parse_never_fails_on_garbage() {
        for input in ["", "\u{1b}[0;94m[bluetooth]\u{1b}[0m# ", "Connected: yesterday", "connected: yes"] {
            let state = DeviceState::parse(input);
            assert!(!state.exists);
            assert!(!state.paired);
        }
        // Exact marker is a substring match, casing matters
        assert!(DeviceState::parse("Connected: yesterday").connected);
        assert!(!DeviceState::parse("connected: yes").connected);
    }
}
