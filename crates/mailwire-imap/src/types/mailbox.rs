//! Mailbox types.

use std::sync::Arc;

use super::{ResponseCode, Value};
use crate::parser::UntaggedResponse;

/// Mailbox status information from SELECT/EXAMINE, kept current while selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages in the mailbox.
    pub exists: u32,
    /// Number of recent messages.
    pub recent: u32,
    /// First unseen message sequence number.
    pub unseen: Option<u32>,
    /// Next UID to be assigned.
    pub uid_next: Option<u32>,
    /// UIDVALIDITY value.
    pub uid_validity: Option<u32>,
    /// Flags defined for this mailbox.
    pub flags: Vec<String>,
    /// Flags that can be permanently stored.
    pub permanent_flags: Vec<String>,
    /// Highest mod-sequence (if CONDSTORE enabled).
    pub highest_mod_seq: Option<u64>,
}

impl MailboxStatus {
    /// Folds a response code into the status.
    ///
    /// Returns `Some(read_only)` for `READ-ONLY`/`READ-WRITE`.
    pub fn apply_code(&mut self, code: &ResponseCode) -> Option<bool> {
        match code {
            ResponseCode::UidNext(n) => self.uid_next = Some(*n),
            ResponseCode::UidValidity(n) => self.uid_validity = Some(*n),
            ResponseCode::Unseen(n) => self.unseen = Some(*n),
            ResponseCode::HighestModSeq(n) => self.highest_mod_seq = Some(*n),
            ResponseCode::NoModSeq => self.highest_mod_seq = None,
            ResponseCode::PermanentFlags(flags) => self.permanent_flags.clone_from(flags),
            ResponseCode::ReadOnly => return Some(true),
            ResponseCode::ReadWrite => return Some(false),
            _ => {}
        }
        None
    }

    /// Folds an untagged response into the status.
    ///
    /// Returns `Some(read_only)` when the response carried an access code.
    pub fn apply(&mut self, response: &UntaggedResponse) -> Option<bool> {
        match response {
            UntaggedResponse::Condition {
                code: Some(code), ..
            } => self.apply_code(code),
            UntaggedResponse::Data {
                number: Some(n),
                keyword,
                ..
            } => {
                if keyword.eq_ignore_ascii_case("EXISTS") {
                    self.exists = *n;
                } else if keyword.eq_ignore_ascii_case("RECENT") {
                    self.recent = *n;
                } else if keyword.eq_ignore_ascii_case("EXPUNGE") {
                    self.exists = self.exists.saturating_sub(1);
                }
                None
            }
            UntaggedResponse::Data {
                number: None,
                keyword,
                values,
            } if keyword.eq_ignore_ascii_case("FLAGS") => {
                if let [Value::List(flags)] = values.as_slice() {
                    self.flags = flags
                        .iter()
                        .filter_map(Value::as_str)
                        .map(ToString::to_string)
                        .collect();
                }
                None
            }
            _ => None,
        }
    }
}

/// The currently selected mailbox and its cached status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedMailbox {
    /// The selected mailbox name.
    pub(crate) name: Arc<str>,
    /// Whether the mailbox was opened read-only.
    pub(crate) read_only: bool,
    /// Cached status.
    pub(crate) status: MailboxStatus,
}

impl SelectedMailbox {
    /// Creates a new selection with an empty status.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, read_only: bool) -> Self {
        Self {
            name: name.into(),
            read_only,
            status: MailboxStatus::default(),
        }
    }

    /// Returns the name of the selected mailbox.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the mailbox is read-only.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns the cached status.
    #[must_use]
    pub const fn status(&self) -> &MailboxStatus {
        &self.status
    }

    /// Returns the number of messages in the mailbox.
    #[must_use]
    pub const fn exists(&self) -> u32 {
        self.status.exists
    }

    pub(crate) fn apply(&mut self, response: &UntaggedResponse) {
        if let Some(read_only) = self.status.apply(response) {
            self.read_only = read_only;
        }
    }

    pub(crate) fn apply_code(&mut self, code: &ResponseCode) {
        if let Some(read_only) = self.status.apply_code(code) {
            self.read_only = read_only;
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

    fn data(number: u32, keyword: &str) -> UntaggedResponse {
        UntaggedResponse::Data {
            number: Some(number),
            keyword: keyword.to_string(),
            values: vec![],
        }
    }

    #[test]
    fn test_counts() {
        let mut status = MailboxStatus::default();
        status.apply(&data(172, "EXISTS"));
        status.apply(&data(1, "RECENT"));
        assert_eq!(status.exists, 172);
        assert_eq!(status.recent, 1);

        status.apply(&data(4, "EXPUNGE"));
        assert_eq!(status.exists, 171);
    }

    #[test]
    fn test_expunge_on_empty_does_not_underflow() {
        let mut status = MailboxStatus::default();
        status.apply(&data(1, "EXPUNGE"));
        assert_eq!(status.exists, 0);
    }

    #[test]
    fn test_flags_and_codes() {
        let mut status = MailboxStatus::default();
        status.apply(&UntaggedResponse::Data {
            number: None,
            keyword: "FLAGS".to_string(),
            values: vec![Value::List(vec![
                Value::Atom("\\Seen".to_string()),
                Value::Atom("\\Deleted".to_string()),
            ])],
        });
        assert_eq!(status.flags, vec!["\\Seen", "\\Deleted"]);

        status.apply_code(&ResponseCode::UidValidity(3857529045));
        status.apply_code(&ResponseCode::UidNext(4392));
        assert_eq!(status.uid_validity, Some(3857529045));
        assert_eq!(status.uid_next, Some(4392));
    }

    #[test]
    fn test_selected_access_codes() {
        let mut selected = SelectedMailbox::new("INBOX", false);
        selected.apply_code(&ResponseCode::ReadOnly);
        assert!(selected.is_read_only());
        selected.apply_code(&ResponseCode::ReadWrite);
        assert!(!selected.is_read_only());
        assert_eq!(selected.name(), "INBOX");
    }
}
