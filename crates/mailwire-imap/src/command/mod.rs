//! IMAP command builder.
//!
//! A [`Command`] is a name plus a list of [`Argument`]s. Arguments say what
//! they are (atom, string, literal, ...) and the encoder in this module picks
//! the wire form, so callers never hand-quote or count literal bytes.

mod serialize;
mod tag_generator;

pub use serialize::{EncodeOptions, EncodedCommand, Segment, encode_command};
pub use tag_generator::TagGenerator;

use crate::parser::lexer::is_atom_char;
use crate::{Error, Result};

/// One command argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// Written verbatim; must be a valid atom.
    Atom(String),
    /// Atom when safe, quoted when it contains specials, literal when large
    /// or when it contains line breaks, NUL or 8-bit bytes.
    AString(String),
    /// Always a quoted string.
    Quoted(String),
    /// Always a literal.
    Literal(Vec<u8>),
    /// Parenthesized list.
    List(Vec<Argument>),
    /// Pre-formatted text passed through unchanged (no line breaks).
    Raw(String),
}

impl Argument {
    /// Returns the argument as text, if it has a textual form.
    #[must_use]
    pub fn as_text(&self) -> Option<std::borrow::Cow<'_, str>> {
        match self {
            Self::Atom(s) | Self::AString(s) | Self::Quoted(s) => Some(s.as_str().into()),
            Self::Literal(data) => Some(String::from_utf8_lossy(data)),
            Self::Raw(s) => s.split(' ').next().map(|s| s.trim_matches('"').into()),
            Self::List(_) => None,
        }
    }
}

/// Session states in which a command may be issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Any connected state.
    Any,
    /// Only before authentication.
    NotAuthenticated,
    /// Authenticated, with or without a selected mailbox.
    Authenticated,
    /// Only with a mailbox selected.
    Selected,
}

/// What a command does to the session when it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// LOGIN or AUTHENTICATE.
    Authenticate,
    /// SELECT or EXAMINE.
    Select {
        /// Mailbox being selected.
        mailbox: String,
        /// EXAMINE opens read-only.
        read_only: bool,
    },
    /// CLOSE or UNSELECT.
    Deselect,
    /// LOGOUT.
    Logout,
    /// IDLE.
    Idle,
    /// Anything without a session-level effect.
    Other,
}

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<Argument>,
}

impl Command {
    /// Creates a command with no arguments. The name is upper-cased.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let mut name = name.into();
        name.make_ascii_uppercase();
        Self {
            name,
            args: Vec::new(),
        }
    }

    /// Creates a command from a name and pre-formatted argument text.
    #[must_use]
    pub fn raw(name: impl Into<String>, args: impl Into<String>) -> Self {
        let args = args.into();
        let command = Self::new(name);
        if args.is_empty() {
            command
        } else {
            command.arg(Argument::Raw(args))
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: Argument) -> Self {
        self.args.push(arg);
        self
    }

    /// Appends an atom argument.
    #[must_use]
    pub fn atom(self, atom: impl Into<String>) -> Self {
        self.arg(Argument::Atom(atom.into()))
    }

    /// Appends a string argument; the encoder picks its form.
    #[must_use]
    pub fn astring(self, s: impl Into<String>) -> Self {
        self.arg(Argument::AString(s.into()))
    }

    /// Appends a literal argument.
    #[must_use]
    pub fn literal(self, data: impl Into<Vec<u8>>) -> Self {
        self.arg(Argument::Literal(data.into()))
    }

    /// Appends a parenthesized list of atoms.
    #[must_use]
    pub fn atom_list<I, S>(self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arg(Argument::List(
            items.into_iter().map(|s| Argument::Atom(s.into())).collect(),
        ))
    }

    /// CAPABILITY.
    #[must_use]
    pub fn capability() -> Self {
        Self::new("CAPABILITY")
    }

    /// NOOP.
    #[must_use]
    pub fn noop() -> Self {
        Self::new("NOOP")
    }

    /// LOGOUT.
    #[must_use]
    pub fn logout() -> Self {
        Self::new("LOGOUT")
    }

    /// LOGIN with a user name and password.
    #[must_use]
    pub fn login(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new("LOGIN").astring(username).astring(password)
    }

    /// AUTHENTICATE with an optional base64 initial response.
    #[must_use]
    pub fn authenticate(mechanism: impl Into<String>, initial_response: Option<&str>) -> Self {
        let command = Self::new("AUTHENTICATE").atom(mechanism);
        match initial_response {
            Some(ir) => command.atom(ir),
            None => command,
        }
    }

    /// SELECT.
    #[must_use]
    pub fn select(mailbox: impl Into<String>) -> Self {
        Self::new("SELECT").astring(mailbox)
    }

    /// EXAMINE (read-only SELECT).
    #[must_use]
    pub fn examine(mailbox: impl Into<String>) -> Self {
        Self::new("EXAMINE").astring(mailbox)
    }

    /// CREATE.
    #[must_use]
    pub fn create(mailbox: impl Into<String>) -> Self {
        Self::new("CREATE").astring(mailbox)
    }

    /// DELETE.
    #[must_use]
    pub fn delete(mailbox: impl Into<String>) -> Self {
        Self::new("DELETE").astring(mailbox)
    }

    /// LIST with a reference and a pattern.
    #[must_use]
    pub fn list(reference: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new("LIST").astring(reference).astring(pattern)
    }

    /// STATUS with the given item names.
    #[must_use]
    pub fn status<I, S>(mailbox: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new("STATUS").astring(mailbox).atom_list(items)
    }

    /// APPEND a message, with optional flags.
    #[must_use]
    pub fn append(mailbox: impl Into<String>, flags: &[&str], message: impl Into<Vec<u8>>) -> Self {
        let command = Self::new("APPEND").astring(mailbox);
        let command = if flags.is_empty() {
            command
        } else {
            command.atom_list(flags.iter().copied())
        };
        command.literal(message)
    }

    /// FETCH; `items` is passed through as written (`(UID FLAGS)`, `BODY[]`).
    #[must_use]
    pub fn fetch(set: impl Into<String>, items: impl Into<String>) -> Self {
        Self::new("FETCH").atom(set).arg(Argument::Raw(items.into()))
    }

    /// CLOSE.
    #[must_use]
    pub fn close() -> Self {
        Self::new("CLOSE")
    }

    /// UNSELECT.
    #[must_use]
    pub fn unselect() -> Self {
        Self::new("UNSELECT")
    }

    /// EXPUNGE.
    #[must_use]
    pub fn expunge() -> Self {
        Self::new("EXPUNGE")
    }

    /// IDLE.
    #[must_use]
    pub fn idle() -> Self {
        Self::new("IDLE")
    }

    /// Returns the upper-cased command name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the arguments.
    #[must_use]
    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    /// Returns the states in which this command is legal.
    #[must_use]
    pub fn scope(&self) -> Scope {
        match self.name.as_str() {
            "LOGIN" | "AUTHENTICATE" | "STARTTLS" => Scope::NotAuthenticated,
            "SELECT" | "EXAMINE" | "CREATE" | "DELETE" | "RENAME" | "SUBSCRIBE"
            | "UNSUBSCRIBE" | "LIST" | "LSUB" | "STATUS" | "APPEND" | "NAMESPACE" | "ENABLE"
            | "IDLE" | "GETQUOTA" | "GETQUOTAROOT" | "GETACL" | "MYRIGHTS" => Scope::Authenticated,
            "CHECK" | "CLOSE" | "UNSELECT" | "EXPUNGE" | "SEARCH" | "FETCH" | "STORE" | "COPY"
            | "MOVE" | "UID" | "SORT" | "THREAD" => Scope::Selected,
            _ => Scope::Any,
        }
    }

    /// Returns the session-level effect of this command.
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        match self.name.as_str() {
            "LOGIN" | "AUTHENTICATE" => CommandKind::Authenticate,
            "SELECT" | "EXAMINE" => CommandKind::Select {
                mailbox: self
                    .args
                    .first()
                    .and_then(Argument::as_text)
                    .map(std::borrow::Cow::into_owned)
                    .unwrap_or_default(),
                read_only: self.name == "EXAMINE",
            },
            "CLOSE" | "UNSELECT" => CommandKind::Deselect,
            "LOGOUT" => CommandKind::Logout,
            "IDLE" => CommandKind::Idle,
            _ => CommandKind::Other,
        }
    }

    /// Returns true if the arguments carry credentials.
    #[must_use]
    pub fn is_sensitive(&self) -> bool {
        matches!(self.name.as_str(), "LOGIN" | "AUTHENTICATE")
    }

    /// Checks that the command can be framed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCommand`] for an empty or malformed name, an
    /// atom that is not a valid atom, or line breaks in raw or quoted text.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || !self.name.bytes().all(is_command_char) {
            return Err(Error::InvalidCommand(format!(
                "invalid command name {:?}",
                self.name
            )));
        }
        self.args.iter().try_for_each(|arg| validate_argument(&self.name, arg))
    }
}

const fn is_command_char(b: u8) -> bool {
    is_atom_char(b) && b.is_ascii() && !matches!(b, b'%' | b'*' | b'\\')
}

fn validate_argument(command: &str, arg: &Argument) -> Result<()> {
    let invalid = |what: &str| -> Result<()> {
        Err(Error::InvalidCommand(format!("{command}: {what}")))
    };
    match arg {
        Argument::Atom(s) if s.is_empty() => invalid("empty atom"),
        Argument::Atom(s) if !s.bytes().all(is_atom_char) => invalid("atom contains specials"),
        Argument::Quoted(s) | Argument::Raw(s) if s.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0)) => {
            invalid("line break in argument")
        }
        Argument::List(items) => items.iter().try_for_each(|a| validate_argument(command, a)),
        _ => Ok(()),
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

    #[test]
    fn test_name_is_uppercased() {
        assert_eq!(Command::new("noop").name(), "NOOP");
        assert_eq!(Command::raw("select", "INBOX").name(), "SELECT");
    }

    #[test]
    fn test_raw_without_args() {
        assert!(Command::raw("NOOP", "").args().is_empty());
    }

    #[test]
    fn test_scopes() {
        assert_eq!(Command::noop().scope(), Scope::Any);
        assert_eq!(Command::login("u", "p").scope(), Scope::NotAuthenticated);
        assert_eq!(Command::select("INBOX").scope(), Scope::Authenticated);
        assert_eq!(Command::fetch("1:*", "FLAGS").scope(), Scope::Selected);
        assert_eq!(Command::new("XAPPLEPUSHSERVICE").scope(), Scope::Any);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            Command::select("Sent Items").kind(),
            CommandKind::Select {
                mailbox: "Sent Items".to_string(),
                read_only: false
            }
        );
        assert_eq!(
            Command::raw("EXAMINE", "\"Drafts\" (CONDSTORE)").kind(),
            CommandKind::Select {
                mailbox: "Drafts".to_string(),
                read_only: true
            }
        );
        assert_eq!(Command::close().kind(), CommandKind::Deselect);
        assert_eq!(Command::unselect().kind(), CommandKind::Deselect);
        assert_eq!(Command::logout().kind(), CommandKind::Logout);
        assert_eq!(Command::new("login").kind(), CommandKind::Authenticate);
        assert_eq!(Command::noop().kind(), CommandKind::Other);
    }

    #[test]
    fn test_sensitive() {
        assert!(Command::login("u", "p").is_sensitive());
        assert!(Command::authenticate("PLAIN", Some("AGZvbwBiYXI=")).is_sensitive());
        assert!(!Command::select("INBOX").is_sensitive());
    }

    #[test]
    fn test_validate() {
        assert!(Command::noop().validate().is_ok());
        assert!(Command::login("user", "pa ss\r\nword").validate().is_ok());
        assert!(Command::new("").validate().is_err());
        assert!(Command::new("NO OP").validate().is_err());
        assert!(Command::raw("NOOP", "x\r\nA2 LOGOUT").validate().is_err());
        assert!(Command::new("STORE").atom("").validate().is_err());
        assert!(Command::new("STORE").atom("a b").validate().is_err());
        assert!(
            Command::new("X")
                .arg(Argument::List(vec![Argument::Quoted("a\nb".to_string())]))
                .validate()
                .is_err()
        );
    }
}
