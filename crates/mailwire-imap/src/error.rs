//! Error types for the IMAP library.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::SessionState;
use crate::types::Tag;

/// Errors that can occur during IMAP operations.
///
/// `Connect`, `Write`, `ReadTimeout` and `Disconnected` are fatal: the
/// connection is closed before they are returned. `Parse` leaves the
/// connection usable unless the stream could not be resynchronized.
/// `Config`, `IllegalState`, `Concurrency` and `InvalidCommand` are raised
/// before any byte is written.
#[derive(Debug, Error)]
pub enum Error {
    /// Establishing the connection failed (refused, DNS, timeout, TLS, greeting).
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// `host:port` that was being connected to.
        address: String,
        /// Underlying cause.
        #[source]
        source: io::Error,
    },

    /// Writing to the stream failed, or the connection was already closed.
    #[error("write error: {0}")]
    Write(#[source] io::Error),

    /// No data arrived within the read timeout.
    #[error("read timed out after {0:?}")]
    ReadTimeout(Duration),

    /// The peer closed the stream, or the connection was closed locally.
    #[error("disconnected: {0}")]
    Disconnected(String),

    /// Malformed server response.
    #[error("protocol error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// The command is not legal in the current session state.
    #[error("{command} is not allowed in state {state}")]
    IllegalState {
        /// Command name.
        command: String,
        /// State the session was in.
        state: SessionState,
    },

    /// Another command is still awaiting its tagged completion.
    #[error("command {pending} is still in flight")]
    Concurrency {
        /// Tag of the outstanding command.
        pending: Tag,
    },

    /// The command cannot be framed (empty name, line breaks in raw text, ...).
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The configuration cannot be used for a session.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The server asked for continuation data the pending command does not
    /// supply. The command stays pending: answer with
    /// [`Client::continue_with`](crate::Client::continue_with) and call
    /// [`Client::complete`](crate::Client::complete) again.
    #[error("server requested continuation for {tag}: {text}")]
    Continuation {
        /// Tag of the pending command.
        tag: Tag,
        /// Text of the continuation request (base64 for SASL challenges).
        text: String,
    },

    /// Server returned NO.
    #[error("server returned NO: {0}")]
    No(String),

    /// Server returned BAD.
    #[error("server returned BAD: {0}")]
    Bad(String),
}

impl Error {
    /// Returns `true` if this error closed the connection.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Write(_) | Self::ReadTimeout(_) | Self::Disconnected(_)
        )
    }

    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

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
    fn test_fatal_classification() {
        assert!(Error::ReadTimeout(Duration::from_secs(1)).is_fatal());
        assert!(Error::Disconnected("eof".to_string()).is_fatal());
        assert!(Error::Write(io::Error::from(io::ErrorKind::BrokenPipe)).is_fatal());
        assert!(!Error::parse(3, "bad").is_fatal());
        assert!(
            !Error::Concurrency {
                pending: Tag::new("A1")
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_display() {
        let err = Error::IllegalState {
            command: "SELECT".to_string(),
            state: SessionState::Connected,
        };
        assert_eq!(err.to_string(), "SELECT is not allowed in state Connected");
    }
}
