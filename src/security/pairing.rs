//! Pairing prompt adapter
//!
//! Answers the security manager's prompts for the tracked default
//! connection: numeric comparison is confirmed automatically and keyboard
//! entry types the fixed passkey. Prompts for any other connection are
//! left unanswered.
//!
//! The pairing state machine itself belongs to the host; [`PairingState`]
//! only mirrors what has been observed:
//!
//! ```text
//! Idle -> Requested -> NumericComparisonPending | PasskeyEntryPending
//!      -> Confirmed | Cancelled -> SecurityUpdated(level)
//! ```

use crate::config;
use crate::host::{ConnHandle, HostError, PairingHost};
use crate::security::SecurityLevel;

/// How this device answers pairing prompts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// LE Secure Connections numeric comparison, confirmed automatically
    #[default]
    NumericComparison,
    /// Keyboard input of a fixed passkey
    PasskeyEntry { passkey: u32 },
    /// Display the passkey only; the peer does the entry
    DisplayOnly,
}

impl AuthMode {
    /// Keyboard mode with the configured fixed passkey
    pub const fn fixed_passkey() -> Self {
        Self::PasskeyEntry {
            passkey: config::security::FIXED_PASSKEY,
        }
    }

    /// IO capabilities to advertise to the peer for this mode
    pub fn io_capabilities(&self) -> IoCapabilities {
        match self {
            Self::NumericComparison => IoCapabilities::DisplayYesNo,
            Self::PasskeyEntry { .. } => IoCapabilities::KeyboardDisplay,
            Self::DisplayOnly => IoCapabilities::DisplayOnly,
        }
    }
}

/// IO capabilities exchanged during pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoCapabilities {
    DisplayOnly,
    DisplayYesNo,
    KeyboardOnly,
    NoInputNoOutput,
    KeyboardDisplay,
}

/// Prompt raised by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingEvent {
    PasskeyDisplay(u32),
    PasskeyConfirm(u32),
    PasskeyEntry,
    PairingConfirm,
    Cancel,
}

/// Reply sent back to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingReply {
    ConfirmPairing,
    ConfirmPasskey,
    EnterPasskey(u32),
    Cancel,
}

/// Observed pairing progress for the default connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    Idle,
    Requested,
    NumericComparisonPending,
    PasskeyEntryPending,
    Confirmed,
    Cancelled,
    SecurityUpdated(SecurityLevel),
}

/// Adapts host pairing prompts to automatic replies
#[derive(Debug, Clone)]
pub struct PairingAdapter {
    mode: AuthMode,
    state: PairingState,
    echo_cancel: bool,
}

impl PairingAdapter {
    pub const fn new(mode: AuthMode) -> Self {
        Self {
            mode,
            state: PairingState::Idle,
            echo_cancel: false,
        }
    }

    /// Also send an explicit cancel back to the host when pairing is cancelled
    pub const fn with_cancel_echo(mut self) -> Self {
        self.echo_cancel = true;
        self
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn state(&self) -> PairingState {
        self.state
    }

    /// Decide the reply for `event` without touching the host
    pub fn decide(&self, event: PairingEvent, is_default: bool) -> Option<PairingReply> {
        match event {
            PairingEvent::PasskeyDisplay(_) => None,
            PairingEvent::Cancel => self.echo_cancel.then_some(PairingReply::Cancel),
            _ if !is_default => None,
            PairingEvent::PairingConfirm => Some(PairingReply::ConfirmPairing),
            PairingEvent::PasskeyConfirm(_) => match self.mode {
                AuthMode::DisplayOnly => None,
                _ => Some(PairingReply::ConfirmPasskey),
            },
            PairingEvent::PasskeyEntry => match self.mode {
                AuthMode::PasskeyEntry { passkey } => Some(PairingReply::EnterPasskey(passkey)),
                _ => None,
            },
        }
    }

    /// Track `event`, then send the reply (if any) through `host`
    pub fn respond<H: PairingHost>(
        &mut self,
        host: &mut H,
        conn: ConnHandle,
        event: PairingEvent,
        is_default: bool,
    ) -> Result<Option<PairingReply>, HostError> {
        // Only the default connection's prompts move the state
        if is_default {
            self.state = match event {
                PairingEvent::PasskeyDisplay(_) | PairingEvent::PairingConfirm => PairingState::Requested,
                PairingEvent::PasskeyConfirm(_) => PairingState::NumericComparisonPending,
                PairingEvent::PasskeyEntry => PairingState::PasskeyEntryPending,
                PairingEvent::Cancel => PairingState::Cancelled,
            };
        }

        let Some(reply) = self.decide(event, is_default) else {
            return Ok(None);
        };

        match reply {
            PairingReply::ConfirmPairing => host.pairing_confirm(conn)?,
            PairingReply::ConfirmPasskey => host.passkey_confirm(conn)?,
            PairingReply::EnterPasskey(passkey) => host.passkey_entry(conn, passkey)?,
            PairingReply::Cancel => host.auth_cancel(conn)?,
        }
        if is_default && reply != PairingReply::Cancel {
            self.state = PairingState::Confirmed;
        }
        Ok(Some(reply))
    }

    /// Security level raised by the host
    pub fn on_security_changed(&mut self, level: SecurityLevel) {
        self.state = PairingState::SecurityUpdated(level);
    }

    pub fn reset(&mut self) {
        self.state = PairingState::Idle;
    }
}

impl Default for PairingAdapter {
    fn default() -> Self {
        Self::new(AuthMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::traits::mock::{HostCall, HostOp, MockHost};

    const CONN: ConnHandle = ConnHandle(1);

    #[test]
    fn test_numeric_comparison_auto_confirms() {
        let mut adapter = PairingAdapter::new(AuthMode::NumericComparison);
        let mut host = MockHost::new();

        let reply = adapter
            .respond(&mut host, CONN, PairingEvent::PasskeyConfirm(123456), true)
            .unwrap();

        assert_eq!(reply, Some(PairingReply::ConfirmPasskey));
        assert_eq!(host.last_call(), Some(&HostCall::PasskeyConfirm(CONN)));
        assert_eq!(adapter.state(), PairingState::Confirmed);
    }

    #[test]
    fn test_keyboard_mode_enters_fixed_passkey() {
        let mut adapter = PairingAdapter::new(AuthMode::fixed_passkey());
        let mut host = MockHost::new();

        let reply = adapter
            .respond(&mut host, CONN, PairingEvent::PasskeyEntry, true)
            .unwrap();

        assert_eq!(reply, Some(PairingReply::EnterPasskey(0x12345)));
        assert_eq!(host.last_call(), Some(&HostCall::PasskeyEntry(CONN, 0x12345)));
    }

    #[test]
    fn test_other_connections_are_ignored() {
        let mut adapter = PairingAdapter::new(AuthMode::NumericComparison);
        let mut host = MockHost::new();

        for event in [
            PairingEvent::PairingConfirm,
            PairingEvent::PasskeyConfirm(1),
            PairingEvent::PasskeyEntry,
        ] {
            let reply = adapter.respond(&mut host, ConnHandle(9), event, false).unwrap();
            assert_eq!(reply, None);
        }
        assert!(host.calls().is_empty());
    }

    #[test]
    fn test_foreign_prompt_keeps_default_state() {
        let mut adapter = PairingAdapter::new(AuthMode::NumericComparison).with_cancel_echo();
        let mut host = MockHost::new();
        adapter
            .respond(&mut host, CONN, PairingEvent::PasskeyConfirm(7), true)
            .unwrap();
        assert_eq!(adapter.state(), PairingState::Confirmed);

        adapter
            .respond(&mut host, ConnHandle(9), PairingEvent::PasskeyEntry, false)
            .unwrap();
        assert_eq!(adapter.state(), PairingState::Confirmed);

        // Cancel is still echoed, but the default link's state is untouched
        let reply = adapter
            .respond(&mut host, ConnHandle(9), PairingEvent::Cancel, false)
            .unwrap();
        assert_eq!(reply, Some(PairingReply::Cancel));
        assert_eq!(host.last_call(), Some(&HostCall::AuthCancel(ConnHandle(9))));
        assert_eq!(adapter.state(), PairingState::Confirmed);
    }

    #[test]
    fn test_numeric_mode_does_not_enter_passkey() {
        let adapter = PairingAdapter::new(AuthMode::NumericComparison);
        assert_eq!(adapter.decide(PairingEvent::PasskeyEntry, true), None);
    }

    #[test]
    fn test_display_only_never_confirms_passkey() {
        let adapter = PairingAdapter::new(AuthMode::DisplayOnly);
        assert_eq!(adapter.decide(PairingEvent::PasskeyConfirm(1), true), None);
        assert_eq!(
            adapter.decide(PairingEvent::PairingConfirm, true),
            Some(PairingReply::ConfirmPairing)
        );
    }

    #[test]
    fn test_cancel_echo() {
        let mut host = MockHost::new();

        let mut quiet = PairingAdapter::new(AuthMode::NumericComparison);
        assert_eq!(quiet.respond(&mut host, CONN, PairingEvent::Cancel, true), Ok(None));
        assert_eq!(quiet.state(), PairingState::Cancelled);

        let mut echo = PairingAdapter::new(AuthMode::NumericComparison).with_cancel_echo();
        assert_eq!(
            echo.respond(&mut host, CONN, PairingEvent::Cancel, true),
            Ok(Some(PairingReply::Cancel))
        );
        assert_eq!(host.last_call(), Some(&HostCall::AuthCancel(CONN)));
        assert_eq!(echo.state(), PairingState::Cancelled);
    }

    #[test]
    fn test_host_failure_keeps_pending_state() {
        let mut adapter = PairingAdapter::new(AuthMode::NumericComparison);
        let mut host = MockHost::new();
        host.fail_next(HostOp::PasskeyConfirm, HostError::Rejected(-22));

        let result = adapter.respond(&mut host, CONN, PairingEvent::PasskeyConfirm(42), true);

        assert_eq!(result, Err(HostError::Rejected(-22)));
        assert_eq!(adapter.state(), PairingState::NumericComparisonPending);
    }

    #[test]
    fn test_io_capabilities_per_mode() {
        assert_eq!(AuthMode::default(), AuthMode::NumericComparison);
        assert_eq!(AuthMode::NumericComparison.io_capabilities(), IoCapabilities::DisplayYesNo);
        assert_eq!(AuthMode::fixed_passkey().io_capabilities(), IoCapabilities::KeyboardDisplay);
        assert_eq!(AuthMode::DisplayOnly.io_capabilities(), IoCapabilities::DisplayOnly);
    }
}
