//! Session state machine.
//!
//! This module tracks the session lifecycle
//! `Disconnected → Connected → Authenticated → MailboxSelected`, decides
//! which commands are legal, and keeps the selected mailbox's cache current.

use tracing::debug;

use crate::command::{Command, CommandKind, Scope};
use crate::parser::UntaggedResponse;
use crate::types::{Condition, ResponseCode, SelectedMailbox, Status};
use crate::{Error, Result};

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No usable connection: never opened, closed, or failed.
    #[default]
    Disconnected,
    /// Connected and greeted, not yet authenticated.
    Connected,
    /// Logged in, no mailbox selected.
    Authenticated,
    /// Logged in with a mailbox selected.
    MailboxSelected,
}

impl SessionState {
    /// Returns `true` if a command of the given scope may be issued.
    #[must_use]
    pub const fn allows(self, scope: Scope) -> bool {
        match (self, scope) {
            (Self::Disconnected, _) => false,
            (_, Scope::Any)
            | (Self::Connected, Scope::NotAuthenticated)
            | (Self::Authenticated | Self::MailboxSelected, Scope::Authenticated)
            | (Self::MailboxSelected, Scope::Selected) => true,
            _ => false,
        }
    }

    /// Returns `true` if we're authenticated (authenticated or selected).
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated | Self::MailboxSelected)
    }

    /// Returns the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connected => "Connected",
            Self::Authenticated => "Authenticated",
            Self::MailboxSelected => "MailboxSelected",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives [`SessionState`] from greetings and command completions.
///
/// A SELECT in flight fills a fresh staging cache; the cache replaces the
/// current mailbox only when the command completes with OK.
#[derive(Debug, Default)]
pub struct StateMachine {
    state: SessionState,
    mailbox: Option<SelectedMailbox>,
    staging: Option<SelectedMailbox>,
}

impl StateMachine {
    /// Creates a state machine in the `Disconnected` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the selected mailbox, if any.
    #[must_use]
    pub const fn mailbox(&self) -> Option<&SelectedMailbox> {
        self.mailbox.as_ref()
    }

    /// Checks that `command` may be issued now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] if it may not.
    pub fn check(&self, command: &Command) -> Result<()> {
        if self.state.allows(command.scope()) {
            Ok(())
        } else {
            Err(Error::IllegalState {
                command: command.name().to_string(),
                state: self.state,
            })
        }
    }

    /// Applies the server greeting. Returns `false` if it refused the session.
    pub fn on_greeting(&mut self, condition: Condition) -> bool {
        match condition {
            Condition::Ok => self.transition(SessionState::Connected),
            Condition::PreAuth => self.transition(SessionState::Authenticated),
            _ => return false,
        }
        true
    }

    /// Records that a command was sent.
    pub fn on_issue(&mut self, kind: &CommandKind) {
        if let CommandKind::Select { mailbox, read_only } = kind {
            self.staging = Some(SelectedMailbox::new(mailbox.as_str(), *read_only));
        }
    }

    /// Folds an untagged response into the mailbox cache.
    pub fn observe(&mut self, response: &UntaggedResponse) {
        if let Some(mailbox) = self.staging.as_mut().or(self.mailbox.as_mut()) {
            mailbox.apply(response);
        }
    }

    /// Applies a tagged completion.
    pub fn on_completion(&mut self, kind: &CommandKind, status: Status, code: Option<&ResponseCode>) {
        match (kind, status) {
            (CommandKind::Authenticate, Status::Ok) if self.state == SessionState::Connected => {
                self.transition(SessionState::Authenticated);
            }
            (CommandKind::Select { mailbox, read_only }, Status::Ok) => {
                let mut selected = self
                    .staging
                    .take()
                    .unwrap_or_else(|| SelectedMailbox::new(mailbox.as_str(), *read_only));
                if let Some(code) = code {
                    selected.apply_code(code);
                }
                debug!(mailbox = %selected.name(), read_only = selected.is_read_only(), "mailbox selected");
                self.mailbox = Some(selected);
                self.transition(SessionState::MailboxSelected);
            }
            (CommandKind::Select { .. }, Status::No) => {
                self.staging = None;
                self.mailbox = None;
                self.transition(SessionState::Authenticated);
            }
            (CommandKind::Select { .. }, Status::Bad) => {
                self.staging = None;
            }
            (CommandKind::Deselect, Status::Ok) => {
                self.mailbox = None;
                self.transition(SessionState::Authenticated);
            }
            (CommandKind::Logout, Status::Ok) => self.on_disconnect(),
            _ => {}
        }
    }

    /// Resets to `Disconnected`, dropping the mailbox cache.
    pub fn on_disconnect(&mut self) {
        self.mailbox = None;
        self.staging = None;
        self.transition(SessionState::Disconnected);
    }

    fn transition(&mut self, to: SessionState) {
        if self.state != to {
            debug!(from = %self.state, to = %to, "session state changed");
            self.state = to;
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn connected() -> StateMachine {
        let mut machine = StateMachine::new();
        assert!(machine.on_greeting(Condition::Ok));
        machine
    }

    fn selected(name: &str) -> StateMachine {
        let mut machine = connected();
        machine.on_completion(&CommandKind::Authenticate, Status::Ok, None);
        let kind = Command::select(name).kind();
        machine.on_issue(&kind);
        machine.on_completion(&kind, Status::Ok, None);
        machine
    }

    fn exists(n: u32) -> UntaggedResponse {
        UntaggedResponse::Data {
            number: Some(n),
            keyword: "EXISTS".to_string(),
            values: vec![],
        }
    }

    #[test]
    fn test_session_state_default() {
        assert_eq!(SessionState::default(), SessionState::Disconnected);
        assert_eq!(SessionState::MailboxSelected.to_string(), "MailboxSelected");
    }

    #[test]
    fn test_allows() {
        assert!(!SessionState::Disconnected.allows(Scope::Any));
        assert!(SessionState::Connected.allows(Scope::Any));
        assert!(SessionState::Connected.allows(Scope::NotAuthenticated));
        assert!(!SessionState::Connected.allows(Scope::Authenticated));
        assert!(!SessionState::Authenticated.allows(Scope::NotAuthenticated));
        assert!(SessionState::Authenticated.allows(Scope::Authenticated));
        assert!(!SessionState::Authenticated.allows(Scope::Selected));
        assert!(SessionState::MailboxSelected.allows(Scope::Authenticated));
        assert!(SessionState::MailboxSelected.allows(Scope::Selected));
    }

    #[test]
    fn test_greetings() {
        let mut machine = StateMachine::new();
        assert!(machine.on_greeting(Condition::PreAuth));
        assert_eq!(machine.state(), SessionState::Authenticated);

        let mut machine = StateMachine::new();
        assert!(!machine.on_greeting(Condition::Bye));
        assert_eq!(machine.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_check_rejects_illegal_commands() {
        let machine = connected();
        let err = machine.check(&Command::select("INBOX")).unwrap_err();
        assert!(matches!(
            err,
            Error::IllegalState {
                state: SessionState::Connected,
                ..
            }
        ));
        assert!(machine.check(&Command::login("u", "p")).is_ok());
        assert!(StateMachine::new().check(&Command::noop()).is_err());
    }

    #[test]
    fn test_login_failure_keeps_state() {
        let mut machine = connected();
        machine.on_completion(&CommandKind::Authenticate, Status::No, None);
        assert_eq!(machine.state(), SessionState::Connected);
    }

    #[test]
    fn test_select_fills_cache() {
        let mut machine = connected();
        machine.on_completion(&CommandKind::Authenticate, Status::Ok, None);

        let kind = Command::select("INBOX").kind();
        machine.on_issue(&kind);
        machine.observe(&exists(172));
        assert!(machine.mailbox().is_none());

        machine.on_completion(&kind, Status::Ok, Some(&ResponseCode::ReadWrite));
        assert_eq!(machine.state(), SessionState::MailboxSelected);
        let mailbox = machine.mailbox().unwrap();
        assert_eq!(mailbox.name(), "INBOX");
        assert_eq!(mailbox.exists(), 172);
        assert!(!mailbox.is_read_only());
    }

    #[test]
    fn test_reselect_discards_cache() {
        let mut machine = selected("INBOX");
        machine.observe(&exists(10));

        let kind = Command::examine("Archive").kind();
        machine.on_issue(&kind);
        machine.on_completion(&kind, Status::Ok, None);

        let mailbox = machine.mailbox().unwrap();
        assert_eq!(mailbox.name(), "Archive");
        assert_eq!(mailbox.exists(), 0);
        assert!(mailbox.is_read_only());
    }

    #[test]
    fn test_select_no_deselects() {
        let mut machine = selected("INBOX");
        let kind = Command::select("Missing").kind();
        machine.on_issue(&kind);
        machine.on_completion(&kind, Status::No, None);
        assert_eq!(machine.state(), SessionState::Authenticated);
        assert!(machine.mailbox().is_none());
    }

    #[test]
    fn test_select_bad_keeps_selection() {
        let mut machine = selected("INBOX");
        let kind = Command::select("Bad(name").kind();
        machine.on_issue(&kind);
        machine.on_completion(&kind, Status::Bad, None);
        assert_eq!(machine.state(), SessionState::MailboxSelected);
        assert_eq!(machine.mailbox().unwrap().name(), "INBOX");

        machine.observe(&exists(3));
        assert_eq!(machine.mailbox().unwrap().exists(), 3);
    }

    #[test]
    fn test_close_and_logout() {
        let mut machine = selected("INBOX");
        machine.on_completion(&CommandKind::Deselect, Status::Ok, None);
        assert_eq!(machine.state(), SessionState::Authenticated);
        assert!(machine.mailbox().is_none());

        machine.on_completion(&CommandKind::Logout, Status::Ok, None);
        assert_eq!(machine.state(), SessionState::Disconnected);
    }
}
