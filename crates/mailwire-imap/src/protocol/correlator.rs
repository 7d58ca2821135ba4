//! Command/response correlation.
//!
//! At most one command is in flight per connection. The correlator owns its
//! tag, collects the untagged data that arrives while it is pending, and
//! resolves it when the completion with the matching tag is seen.

use tracing::warn;

use crate::command::{CommandKind, TagGenerator};
use crate::parser::{Frame, ResponseLine, UntaggedResponse};
use crate::types::{ResponseCode, Status, Tag};
use crate::{Error, Result};

/// Result of a completed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Tag the command was sent with.
    pub tag: Tag,
    /// Completion status.
    pub status: Status,
    /// Optional response code.
    pub code: Option<ResponseCode>,
    /// Human-readable text.
    pub text: String,
    /// Untagged responses received while the command was pending, in order.
    pub untagged: Vec<UntaggedResponse>,
}

impl CommandResult {
    /// Returns true if the command succeeded (OK status).
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Converts to a Result, returning an error if the command failed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::No`] or [`Error::Bad`] carrying the completion text.
    pub fn into_result(self) -> Result<Vec<UntaggedResponse>> {
        match self.status {
            Status::Ok => Ok(self.untagged),
            Status::No => Err(Error::No(self.text)),
            Status::Bad => Err(Error::Bad(self.text)),
        }
    }
}

/// The command awaiting its tagged completion.
#[derive(Debug)]
pub struct PendingCommand {
    /// Tag of the command.
    pub tag: Tag,
    /// Session-level effect of the command.
    pub kind: CommandKind,
    /// Untagged responses received so far.
    pub untagged: Vec<UntaggedResponse>,
    /// First response that failed to decode while pending.
    pub parse_error: Option<Error>,
}

/// What a decoded response means for the pending command.
#[derive(Debug)]
pub enum Disposition {
    /// Untagged data; deliver it, then [`Correlator::record`] it.
    Untagged(UntaggedResponse),
    /// Continuation request.
    Continuation(String),
    /// The pending command completed.
    Completed {
        /// Effect of the completed command.
        kind: CommandKind,
        /// The completion and the data collected for it.
        result: CommandResult,
        /// Decode failure seen while the command was pending.
        parse_error: Option<Error>,
    },
    /// Completion for a tag that is not pending.
    Ignored,
}

/// Allocates tags and tracks the single pending command.
#[derive(Debug)]
pub struct Correlator {
    tags: TagGenerator,
    pending: Option<PendingCommand>,
}

impl Correlator {
    /// Creates a correlator whose tags use `prefix`.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self {
            tags: TagGenerator::new(prefix),
            pending: None,
        }
    }

    /// Returns the tag of the pending command.
    #[must_use]
    pub fn pending_tag(&self) -> Option<&Tag> {
        self.pending.as_ref().map(|p| &p.tag)
    }

    /// Returns the kind of the pending command.
    #[must_use]
    pub fn pending_kind(&self) -> Option<&CommandKind> {
        self.pending.as_ref().map(|p| &p.kind)
    }

    /// Fails with [`Error::Concurrency`] if a command is pending.
    ///
    /// # Errors
    ///
    /// See above.
    pub fn ensure_idle(&self) -> Result<()> {
        match &self.pending {
            Some(pending) => Err(Error::Concurrency {
                pending: pending.tag.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Allocates a tag and registers a pending command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Concurrency`] if a command is already pending, or
    /// [`Error::InvalidCommand`] once the tag counter is exhausted.
    pub fn begin(&mut self, kind: CommandKind) -> Result<Tag> {
        self.ensure_idle()?;
        let tag = self
            .tags
            .next()
            .ok_or_else(|| Error::InvalidCommand("tag counter exhausted".to_string()))?;
        self.pending = Some(PendingCommand {
            tag: tag.clone(),
            kind,
            untagged: Vec::new(),
            parse_error: None,
        });
        Ok(tag)
    }

    /// Classifies a decoded response.
    pub fn accept(&mut self, line: ResponseLine) -> Disposition {
        match line {
            ResponseLine::Untagged(response) => Disposition::Untagged(response),
            ResponseLine::Continuation { text } => Disposition::Continuation(text),
            ResponseLine::Tagged(completion) => {
                if self.pending_tag() != Some(&completion.tag) {
                    warn!(tag = %completion.tag, status = %completion.status, "ignoring completion for a tag that is not pending");
                    return Disposition::Ignored;
                }
                let Some(pending) = self.pending.take() else {
                    return Disposition::Ignored;
                };
                Disposition::Completed {
                    kind: pending.kind,
                    result: CommandResult {
                        tag: completion.tag,
                        status: completion.status,
                        code: completion.code,
                        text: completion.text,
                        untagged: pending.untagged,
                    },
                    parse_error: pending.parse_error,
                }
            }
        }
    }

    /// Stores an untagged response on the pending command.
    pub fn record(&mut self, response: UntaggedResponse) {
        if let Some(pending) = &mut self.pending {
            pending.untagged.push(response);
        }
    }

    /// Handles a frame that failed to decode.
    ///
    /// If the frame still starts with the pending tag, the pending command is
    /// resolved with `error` and returned. Otherwise the error is kept until
    /// the completion arrives.
    pub fn reject(&mut self, frame: &Frame, error: Error) -> Option<(PendingCommand, Error)> {
        warn!(%error, "failed to decode server response");

        let tagged = self
            .pending
            .as_ref()
            .is_some_and(|p| p.tag.prefixes(frame.first_line()));
        if tagged {
            return self.pending.take().map(|pending| (pending, error));
        }

        if let Some(pending) = &mut self.pending {
            pending.parse_error.get_or_insert(error);
        }
        None
    }

    /// Removes the pending command, if any.
    pub fn fail(&mut self) -> Option<PendingCommand> {
        self.pending.take()
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
    use crate::parser::ResponseParser;

    fn line(s: &str) -> ResponseLine {
        ResponseParser::parse_line(s.as_bytes()).unwrap()
    }

    #[test]
    fn test_single_pending_slot() {
        let mut correlator = Correlator::new('A');
        let tag = correlator.begin(CommandKind::Other).unwrap();
        assert_eq!(tag, "A1");

        let err = correlator.begin(CommandKind::Other).unwrap_err();
        assert!(matches!(err, Error::Concurrency { pending } if pending == "A1"));
    }

    #[test]
    fn test_completion_resolves_pending() {
        let mut correlator = Correlator::new('A');
        correlator.begin(CommandKind::Other).unwrap();

        let Disposition::Untagged(response) = correlator.accept(line("* 3 EXISTS")) else {
            panic!("Expected untagged");
        };
        correlator.record(response);

        let Disposition::Completed { result, parse_error, .. } =
            correlator.accept(line("A1 OK done"))
        else {
            panic!("Expected completion");
        };
        assert!(result.is_ok());
        assert_eq!(result.untagged.len(), 1);
        assert!(parse_error.is_none());
        assert!(correlator.pending_tag().is_none());

        assert_eq!(correlator.begin(CommandKind::Other).unwrap(), "A2");
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let mut correlator = Correlator::new('A');
        correlator.begin(CommandKind::Other).unwrap();
        assert!(matches!(
            correlator.accept(line("A0 OK old")),
            Disposition::Ignored
        ));
        assert_eq!(correlator.pending_tag().unwrap(), "A1");
    }

    #[test]
    fn test_reject_defers_error_until_completion() {
        let mut correlator = Correlator::new('A');
        correlator.begin(CommandKind::Other).unwrap();

        let frame = Frame::from_line(b"* 1 FETCH (UID".to_vec());
        assert!(
            correlator
                .reject(&frame, Error::parse(0, "unterminated list"))
                .is_none()
        );

        let Disposition::Completed { parse_error, .. } = correlator.accept(line("A1 OK done"))
        else {
            panic!("Expected completion");
        };
        assert!(matches!(parse_error, Some(Error::Parse { .. })));
    }

    #[test]
    fn test_reject_tagged_line_resolves_immediately() {
        let mut correlator = Correlator::new('A');
        correlator.begin(CommandKind::Other).unwrap();

        let frame = Frame::from_line(b"A1 MAYBE".to_vec());
        let (pending, err) = correlator
            .reject(&frame, Error::parse(3, "unknown status"))
            .unwrap();
        assert_eq!(pending.tag, "A1");
        assert!(matches!(err, Error::Parse { .. }));
        assert!(correlator.pending_tag().is_none());
    }

    #[test]
    fn test_into_result() {
        let result = CommandResult {
            tag: Tag::new("A1"),
            status: Status::No,
            code: None,
            text: "nope".to_string(),
            untagged: vec![],
        };
        assert!(matches!(result.into_result(), Err(Error::No(text)) if text == "nope"));
    }
}
