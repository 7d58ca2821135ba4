//! Listeners for untagged server responses.
//!
//! IMAP servers send untagged data at any time: EXISTS and EXPUNGE when the
//! mailbox changes, FETCH when another client changes flags, BYE before
//! hanging up. The [`Client`](crate::Client) hands every untagged response
//! to each registered [`ResponseHandler`] in wire order, before the command
//! it arrived with completes.
//!
//! # Example
//!
//! ```
//! use mailwire_imap::handler::ResponseHandler;
//!
//! #[derive(Default)]
//! struct Counter {
//!     exists: u32,
//! }
//!
//! impl ResponseHandler for Counter {
//!     fn on_exists(&mut self, count: u32) {
//!         self.exists = count;
//!     }
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::UnboundedSender;

use crate::parser::UntaggedResponse;
use crate::types::{Condition, ResponseCode, Value};

/// Handler for untagged server responses.
///
/// [`on_untagged`](Self::on_untagged) sees every response. Its default
/// implementation routes well-known responses to the typed callbacks below
/// and everything else to [`on_data`](Self::on_data); all callbacks default
/// to doing nothing.
pub trait ResponseHandler: Send {
    /// Called for every untagged response, in the order received.
    fn on_untagged(&mut self, response: &UntaggedResponse) {
        route(self, response);
    }

    /// `* n EXISTS`: the mailbox now holds `count` messages.
    fn on_exists(&mut self, count: u32) {
        let _ = count;
    }

    /// `* n RECENT`.
    fn on_recent(&mut self, count: u32) {
        let _ = count;
    }

    /// `* n EXPUNGE`: message `seq` was removed; later sequence numbers
    /// shift down by one.
    fn on_expunge(&mut self, seq: u32) {
        let _ = seq;
    }

    /// `* n FETCH (...)`, with the items inside the parentheses.
    fn on_fetch(&mut self, seq: u32, items: &[Value]) {
        let _ = (seq, items);
    }

    /// `* FLAGS (...)`: the flags defined for the mailbox.
    fn on_flags(&mut self, flags: &[String]) {
        let _ = flags;
    }

    /// `* BYE`: the server is closing the connection.
    fn on_bye(&mut self, text: &str) {
        let _ = text;
    }

    /// A status response carrying `[ALERT]`. The text must be shown to the
    /// user.
    fn on_alert(&mut self, text: &str) {
        let _ = text;
    }

    /// `* OK`, `* NO`, `* BAD` and `* PREAUTH` outside the greeting.
    fn on_condition(&mut self, condition: Condition, code: Option<&ResponseCode>, text: &str) {
        let _ = (condition, code, text);
    }

    /// Any other untagged data (`CAPABILITY`, `LIST`, `SEARCH`, ...).
    fn on_data(&mut self, response: &UntaggedResponse) {
        let _ = response;
    }
}

fn route<H: ResponseHandler + ?Sized>(handler: &mut H, response: &UntaggedResponse) {
    match response {
        UntaggedResponse::Condition {
            condition,
            code,
            text,
        } => {
            if matches!(code, Some(ResponseCode::Alert)) {
                handler.on_alert(text);
            }
            if *condition == Condition::Bye {
                handler.on_bye(text);
            } else {
                handler.on_condition(*condition, code.as_ref(), text);
            }
        }
        UntaggedResponse::Data {
            number: Some(n),
            keyword,
            values,
        } => {
            if keyword.eq_ignore_ascii_case("EXISTS") {
                handler.on_exists(*n);
            } else if keyword.eq_ignore_ascii_case("RECENT") {
                handler.on_recent(*n);
            } else if keyword.eq_ignore_ascii_case("EXPUNGE") {
                handler.on_expunge(*n);
            } else if keyword.eq_ignore_ascii_case("FETCH") {
                let items = values.first().and_then(Value::as_list).unwrap_or_default();
                handler.on_fetch(*n, items);
            } else {
                handler.on_data(response);
            }
        }
        UntaggedResponse::Data {
            number: None,
            keyword,
            values,
        } if keyword.eq_ignore_ascii_case("FLAGS") => {
            let flags: Vec<String> = values
                .first()
                .and_then(Value::as_list)
                .unwrap_or_default()
                .iter()
                .filter_map(Value::as_str)
                .map(ToString::to_string)
                .collect();
            handler.on_flags(&flags);
        }
        UntaggedResponse::Data { .. } => handler.on_data(response),
    }
}

/// A no-op handler that ignores all unsolicited responses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl ResponseHandler for NoopHandler {}

/// A handler that logs untagged responses using tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ResponseHandler for LoggingHandler {
    fn on_exists(&mut self, count: u32) {
        tracing::debug!(count, "EXISTS");
    }

    fn on_recent(&mut self, count: u32) {
        tracing::debug!(count, "RECENT");
    }

    fn on_expunge(&mut self, seq: u32) {
        tracing::debug!(seq, "EXPUNGE");
    }

    fn on_fetch(&mut self, seq: u32, items: &[Value]) {
        tracing::debug!(seq, ?items, "FETCH");
    }

    fn on_flags(&mut self, flags: &[String]) {
        tracing::debug!(?flags, "FLAGS");
    }

    fn on_bye(&mut self, text: &str) {
        tracing::info!(text, "BYE");
    }

    fn on_alert(&mut self, text: &str) {
        tracing::warn!(text, "ALERT");
    }

    fn on_condition(&mut self, condition: Condition, code: Option<&ResponseCode>, text: &str) {
        match condition {
            Condition::No => tracing::warn!(?code, text, "NO"),
            Condition::Bad => tracing::error!(?code, text, "BAD"),
            _ => tracing::trace!(condition = condition.as_str(), ?code, text),
        }
    }

    fn on_data(&mut self, response: &UntaggedResponse) {
        tracing::trace!(keyword = response.keyword(), "untagged data");
    }
}

/// A handler that collects events for later processing.
///
/// Useful for testing or batch processing of events. Share it with the
/// client through `Arc<Mutex<CollectingHandler>>` to read the events back.
#[derive(Debug, Default, Clone)]
pub struct CollectingHandler {
    /// Collected events.
    pub events: Vec<UnsolicitedEvent>,
}

impl CollectingHandler {
    /// Creates a new collecting handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all collected events.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Takes all collected events, leaving the handler empty.
    pub fn take(&mut self) -> Vec<UnsolicitedEvent> {
        std::mem::take(&mut self.events)
    }
}

impl ResponseHandler for CollectingHandler {
    fn on_exists(&mut self, count: u32) {
        self.events.push(UnsolicitedEvent::Exists(count));
    }

    fn on_recent(&mut self, count: u32) {
        self.events.push(UnsolicitedEvent::Recent(count));
    }

    fn on_expunge(&mut self, seq: u32) {
        self.events.push(UnsolicitedEvent::Expunge(seq));
    }

    fn on_fetch(&mut self, seq: u32, items: &[Value]) {
        self.events.push(UnsolicitedEvent::Fetch(seq, items.to_vec()));
    }

    fn on_flags(&mut self, flags: &[String]) {
        self.events.push(UnsolicitedEvent::Flags(flags.to_vec()));
    }

    fn on_bye(&mut self, text: &str) {
        self.events.push(UnsolicitedEvent::Bye(text.to_string()));
    }

    fn on_alert(&mut self, text: &str) {
        self.events.push(UnsolicitedEvent::Alert(text.to_string()));
    }

    fn on_condition(&mut self, condition: Condition, _code: Option<&ResponseCode>, text: &str) {
        self.events
            .push(UnsolicitedEvent::Condition(condition, text.to_string()));
    }

    fn on_data(&mut self, response: &UntaggedResponse) {
        self.events
            .push(UnsolicitedEvent::Data(response.keyword().to_ascii_uppercase()));
    }
}

/// An event collected by [`CollectingHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsolicitedEvent {
    /// EXISTS response.
    Exists(u32),
    /// RECENT response.
    Recent(u32),
    /// EXPUNGE response.
    Expunge(u32),
    /// FETCH response with its items.
    Fetch(u32, Vec<Value>),
    /// FLAGS response.
    Flags(Vec<String>),
    /// BYE response.
    Bye(String),
    /// ALERT response code.
    Alert(String),
    /// Other status response.
    Condition(Condition, String),
    /// Other data, by upper-cased keyword.
    Data(String),
}

impl<H: ResponseHandler> ResponseHandler for Arc<Mutex<H>> {
    fn on_untagged(&mut self, response: &UntaggedResponse) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_untagged(response);
    }
}

/// Forwards every untagged response to a channel. A closed receiver is
/// ignored.
impl ResponseHandler for UnboundedSender<UntaggedResponse> {
    fn on_untagged(&mut self, response: &UntaggedResponse) {
        let _ = self.send(response.clone());
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
    use crate::parser::{ResponseLine, ResponseParser};

    fn untagged(s: &str) -> UntaggedResponse {
        match ResponseParser::parse_line(s.as_bytes()).unwrap() {
            ResponseLine::Untagged(response) => response,
            other => panic!("Expected untagged, got {other:?}"),
        }
    }

    #[test]
    fn test_noop_handler() {
        let mut handler = NoopHandler;
        handler.on_untagged(&untagged("* 100 EXISTS"));
        handler.on_untagged(&untagged("* BYE goodbye"));
    }

    #[test]
    fn test_routing() {
        let mut handler = CollectingHandler::new();

        handler.on_untagged(&untagged("* 50 EXISTS"));
        handler.on_untagged(&untagged("* 5 recent"));
        handler.on_untagged(&untagged("* 3 EXPUNGE"));
        handler.on_untagged(&untagged("* 2 FETCH (FLAGS (\\Seen))"));
        handler.on_untagged(&untagged("* FLAGS (\\Answered \\Seen)"));
        handler.on_untagged(&untagged("* OK [ALERT] disk almost full"));
        handler.on_untagged(&untagged("* CAPABILITY IMAP4rev1"));
        handler.on_untagged(&untagged("* BYE shutting down"));

        assert_eq!(
            handler.events,
            vec![
                UnsolicitedEvent::Exists(50),
                UnsolicitedEvent::Recent(5),
                UnsolicitedEvent::Expunge(3),
                UnsolicitedEvent::Fetch(
                    2,
                    vec![
                        Value::Atom("FLAGS".to_string()),
                        Value::List(vec![Value::Atom("\\Seen".to_string())]),
                    ]
                ),
                UnsolicitedEvent::Flags(vec!["\\Answered".to_string(), "\\Seen".to_string()]),
                UnsolicitedEvent::Alert("disk almost full".to_string()),
                UnsolicitedEvent::Condition(Condition::Ok, "disk almost full".to_string()),
                UnsolicitedEvent::Data("CAPABILITY".to_string()),
                UnsolicitedEvent::Bye("shutting down".to_string()),
            ]
        );
    }

    #[test]
    fn test_collecting_handler_take_and_clear() {
        let mut handler = CollectingHandler::new();
        handler.on_exists(10);
        handler.on_exists(20);

        let taken = handler.take();
        assert_eq!(taken.len(), 2);
        assert!(handler.events.is_empty());

        handler.on_recent(1);
        handler.clear();
        assert!(handler.events.is_empty());
    }

    #[test]
    fn test_shared_handler() {
        let shared = Arc::new(Mutex::new(CollectingHandler::new()));
        let mut boxed: Box<dyn ResponseHandler> = Box::new(Arc::clone(&shared));

        boxed.on_untagged(&untagged("* 7 EXISTS"));
        assert_eq!(
            shared.lock().unwrap().events,
            vec![UnsolicitedEvent::Exists(7)]
        );
    }

    #[tokio::test]
    async fn test_channel_handler() {
        let (mut tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.on_untagged(&untagged("* 1 EXPUNGE"));
        drop(tx);

        let response = rx.recv().await.unwrap();
        assert!(response.is("EXPUNGE"));
        assert!(rx.recv().await.is_none());
    }
}
