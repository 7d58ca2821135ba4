//! IMAP client session.
//!
//! [`Client`] ties a [`Connection`] to a [`Correlator`] and a
//! [`StateMachine`]. A command is checked against the session state, sent
//! under a fresh tag and resolved by reading frames until its tagged
//! completion arrives. Untagged responses reach every registered
//! [`ResponseHandler`] as they are read, before the command resolves.
//!
//! One command is in flight at a time. The client takes `&mut self` for
//! everything that touches the wire, so a second caller has to wait its turn.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use super::config::{Config, Credentials};
use super::framed::Connection;
use super::stream::ImapStream;
use crate::command::{Command, CommandKind, EncodeOptions, encode_command};
use crate::handler::ResponseHandler;
use crate::parser::{ResponseLine, ResponseParser, UntaggedResponse};
use crate::protocol::{CommandResult, Correlator, Disposition, SessionState, StateMachine};
use crate::types::{Condition, ResponseCode, SelectedMailbox, Tag, Value};
use crate::{Error, Result};

/// Outcome of reading one frame.
enum Step {
    Progress,
    Continuation(String),
    Completed(Result<CommandResult>),
}

/// IMAP client connection.
pub struct Client<S> {
    connection: Connection<S>,
    correlator: Correlator,
    session: StateMachine,
    handlers: Vec<Box<dyn ResponseHandler>>,
    capabilities: Vec<String>,
    literal_threshold: usize,
    /// Completion that arrived while a command was still being sent.
    resolved: Option<Result<CommandResult>>,
    bye_received: bool,
}

impl<S> std::fmt::Debug for Client<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.session)
            .field("correlator", &self.correlator)
            .field("capabilities", &self.capabilities)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

impl Client<ImapStream> {
    /// Connects to the server and reads its greeting.
    pub async fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        let connection = Connection::open(config).await?;
        Self::from_connection(connection, config).await
    }

    /// Connects, reads the greeting and logs in unless the server
    /// pre-authenticated the connection.
    pub async fn open_and_login(config: &Config, credentials: &Credentials) -> Result<Self> {
        let mut client = Self::open(config).await?;
        if client.state() == SessionState::Connected {
            client.login(credentials).await?;
        }
        Ok(client)
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an established stream and reads the greeting.
    pub async fn from_stream(stream: S, config: &Config) -> Result<Self> {
        Self::from_connection(Connection::new(stream, config), config).await
    }

    /// Reads the greeting on an open connection.
    ///
    /// An `OK` greeting leaves the session `Connected`, `PREAUTH` leaves it
    /// `Authenticated`. A `BYE`, anything else, or no greeting within the
    /// connect timeout closes the connection and fails with
    /// [`Error::Connect`]. An unusable `config` closes the connection and
    /// fails with [`Error::Config`] before anything is read.
    pub async fn from_connection(
        mut connection: Connection<S>,
        config: &Config,
    ) -> Result<Self> {
        if let Err(e) = config.validate() {
            connection.close().await;
            return Err(e);
        }

        let mut client = Self {
            connection,
            correlator: Correlator::new(config.tag_prefix),
            session: StateMachine::new(),
            handlers: Vec::new(),
            capabilities: Vec::new(),
            literal_threshold: config.literal_threshold,
            resolved: None,
            bye_received: false,
        };

        let greeting = tokio::time::timeout(config.connect_timeout, client.read_greeting())
            .await
            .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::TimedOut, "no greeting")));

        match greeting {
            Ok(()) => Ok(client),
            Err(source) => {
                client.connection.close().await;
                client.session.on_disconnect();
                Err(Error::Connect {
                    address: config.address(),
                    source,
                })
            }
        }
    }

    async fn read_greeting(&mut self) -> io::Result<()> {
        let frame = self.connection.read_frame().await.map_err(greeting_error)?;
        let line = ResponseParser::parse_frame(&frame).map_err(greeting_error)?;

        let ResponseLine::Untagged(UntaggedResponse::Condition {
            condition,
            code,
            text,
        }) = line
        else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "greeting is not a status response",
            ));
        };

        if condition == Condition::Bye {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("server refused connection: {text}"),
            ));
        }
        if !self.session.on_greeting(condition) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected greeting: {} {text}", condition.as_str()),
            ));
        }

        if let Some(ResponseCode::Capability(capabilities)) = code {
            self.capabilities = capabilities;
        }
        debug!(state = %self.session.state(), "greeting received");
        Ok(())
    }

    /// Returns the session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Returns the selected mailbox, if any.
    #[must_use]
    pub const fn mailbox(&self) -> Option<&SelectedMailbox> {
        self.session.mailbox()
    }

    /// Returns the last advertised capabilities, upper-cased.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Returns true if the server advertised `capability`.
    #[must_use]
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities
            .iter()
            .any(|c| c.eq_ignore_ascii_case(capability))
    }

    /// Returns the tag of the command awaiting completion.
    #[must_use]
    pub fn pending_tag(&self) -> Option<&Tag> {
        self.correlator.pending_tag()
    }

    /// Returns true once the connection has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }

    /// Registers a listener for untagged responses. Listeners are called in
    /// registration order.
    pub fn add_handler(&mut self, handler: impl ResponseHandler + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Sends `command` and waits for its completion.
    ///
    /// NO and BAD completions are returned as data; use
    /// [`CommandResult::into_result`] to turn them into errors. A
    /// continuation request the command did not expect is returned as
    /// [`Error::Continuation`] with the command still pending.
    pub async fn send(&mut self, command: &Command) -> Result<CommandResult> {
        self.issue(command).await?;
        self.complete().await
    }

    /// Like [`send`](Self::send), giving up after `timeout`.
    ///
    /// When the timeout elapses the connection is closed and the command
    /// fails with [`Error::ReadTimeout`].
    pub async fn send_with_timeout(
        &mut self,
        command: &Command,
        timeout: Duration,
    ) -> Result<CommandResult> {
        if let Ok(result) = tokio::time::timeout(timeout, self.send(command)).await {
            return result;
        }

        warn!(?timeout, command = command.name(), "command timed out");
        self.connection.abort("command timed out");
        self.teardown();
        Err(Error::ReadTimeout(timeout))
    }

    /// Sends `command` without waiting for its completion.
    ///
    /// Nothing is written if the command is malformed, not allowed in the
    /// current state, or another command is pending. Synchronizing literals
    /// are uploaded as the server asks for them; if the server refuses one,
    /// the command is already resolved and [`complete`](Self::complete)
    /// returns that result.
    pub async fn issue(&mut self, command: &Command) -> Result<Tag> {
        self.correlator.ensure_idle()?;
        command.validate()?;
        self.session.check(command)?;

        let kind = command.kind();
        let tag = self.correlator.begin(kind.clone())?;
        self.session.on_issue(&kind);
        self.resolved = None;

        let options = EncodeOptions {
            literal_threshold: self.literal_threshold,
            non_synchronizing: self.has_capability("LITERAL+"),
        };
        let encoded = encode_command(&tag, command, &options);
        debug!(%tag, command = command.name(), "sending command");

        let redacted = command
            .is_sensitive()
            .then(|| format!("{tag} {} <redacted>", command.name()));

        for (index, segment) in encoded.segments.iter().enumerate() {
            let trace = redacted.as_deref().map(|first| {
                if index == 0 {
                    first.as_bytes()
                } else {
                    b"<redacted>".as_slice()
                }
            });

            if let Err(e) = self.connection.write_line_traced(&segment.data, trace).await {
                return Err(self.fail(e));
            }

            if segment.awaits_continuation {
                if let Some(result) = self.await_continuation().await? {
                    debug!(%tag, "literal refused by server");
                    self.resolved = Some(result);
                    break;
                }
            }
        }

        Ok(tag)
    }

    /// Waits for the pending command to complete.
    ///
    /// If the server sends a continuation request instead, this returns
    /// [`Error::Continuation`] and the command stays pending. Answer it with
    /// [`continue_with`](Self::continue_with), then call `complete` again.
    pub async fn complete(&mut self) -> Result<CommandResult> {
        if let Some(result) = self.resolved.take() {
            return result;
        }
        if self.correlator.pending_tag().is_none() {
            return Err(Error::InvalidCommand("no command is pending".to_string()));
        }

        loop {
            match self.step().await? {
                Step::Completed(result) => return result,
                Step::Continuation(text) => {
                    if let Some(tag) = self.correlator.pending_tag().cloned() {
                        return Err(Error::Continuation { tag, text });
                    }
                }
                Step::Progress => {}
            }
        }
    }

    /// Sends one line of continuation data for the pending command, such as
    /// a SASL response or `*` to cancel an exchange.
    ///
    /// Data sent during LOGIN or AUTHENTICATE is redacted in the debug trace.
    pub async fn continue_with(&mut self, data: &[u8]) -> Result<()> {
        let Some(kind) = self.correlator.pending_kind() else {
            return Err(Error::InvalidCommand("no command is pending".to_string()));
        };
        if data.iter().any(|&b| b == b'\r' || b == b'\n') {
            return Err(Error::InvalidCommand(
                "continuation data contains a line break".to_string(),
            ));
        }

        let trace = (*kind == CommandKind::Authenticate).then_some(b"<redacted>".as_slice());
        if let Err(e) = self.connection.write_line_traced(data, trace).await {
            return Err(self.fail(e));
        }
        Ok(())
    }

    /// Runs AUTHENTICATE with `mechanism`, answering each server challenge
    /// with `respond`.
    ///
    /// `respond` receives the challenge text (base64 as sent by the server)
    /// and returns the base64 response line.
    pub async fn authenticate<F>(
        &mut self,
        mechanism: &str,
        initial_response: Option<&str>,
        mut respond: F,
    ) -> Result<()>
    where
        F: FnMut(&str) -> Vec<u8>,
    {
        self.issue(&Command::authenticate(mechanism, initial_response))
            .await?;

        loop {
            match self.complete().await {
                Ok(result) => {
                    result.into_result()?;
                    return Ok(());
                }
                Err(Error::Continuation { text, .. }) => {
                    let response = respond(&text);
                    self.continue_with(&response).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Logs in with `credentials`.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<()> {
        let command = Command::login(credentials.username.as_str(), credentials.secret.as_str());
        self.send(&command).await?.into_result()?;
        Ok(())
    }

    /// Selects `mailbox` read-write and returns its status.
    pub async fn select(&mut self, mailbox: &str) -> Result<SelectedMailbox> {
        self.open_mailbox(&Command::select(mailbox)).await
    }

    /// Selects `mailbox` read-only and returns its status.
    pub async fn examine(&mut self, mailbox: &str) -> Result<SelectedMailbox> {
        self.open_mailbox(&Command::examine(mailbox)).await
    }

    async fn open_mailbox(&mut self, command: &Command) -> Result<SelectedMailbox> {
        self.send(command).await?.into_result()?;
        self.session
            .mailbox()
            .cloned()
            .ok_or_else(|| Error::IllegalState {
                command: command.name().to_string(),
                state: self.session.state(),
            })
    }

    /// Closes the selected mailbox (CLOSE).
    pub async fn close_mailbox(&mut self) -> Result<()> {
        self.send(&Command::close()).await?.into_result()?;
        Ok(())
    }

    /// Sends NOOP and returns the untagged responses it collected.
    pub async fn noop(&mut self) -> Result<Vec<UntaggedResponse>> {
        self.send(&Command::noop()).await?.into_result()
    }

    /// Asks the server for its capabilities.
    pub async fn capability(&mut self) -> Result<Vec<String>> {
        self.send(&Command::capability()).await?.into_result()?;
        Ok(self.capabilities.clone())
    }

    /// Logs out and closes the connection.
    ///
    /// A server that hangs up after `BYE` without completing LOGOUT is
    /// treated as a clean logout.
    pub async fn logout(&mut self) -> Result<()> {
        let outcome = self.send(&Command::logout()).await;
        self.close().await;

        match outcome {
            Ok(result) => result.into_result().map(|_| ()),
            Err(Error::Disconnected(_)) if self.bye_received => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Idles for `wait`, then ends IDLE with `DONE`.
    ///
    /// Untagged responses received while idling are delivered to the
    /// handlers as they arrive and returned at the end. If the server ends
    /// IDLE on its own, that completion is returned early.
    pub async fn idle(&mut self, wait: Duration) -> Result<Vec<UntaggedResponse>> {
        self.issue(&Command::idle()).await?;

        loop {
            match self.step().await? {
                Step::Continuation(_) => break,
                Step::Completed(result) => return result?.into_result(),
                Step::Progress => {}
            }
        }
        debug!(?wait, "idling");

        let deadline = tokio::time::Instant::now() + wait;
        loop {
            match self.connection.wait_readable(deadline).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return Err(self.fail(e)),
            }
            if let Step::Completed(result) = self.step().await? {
                return result?.into_result();
            }
        }

        if let Err(e) = self.connection.write_line(b"DONE").await {
            return Err(self.fail(e));
        }
        self.complete().await?.into_result()
    }

    /// Closes the connection. Calling it again does nothing.
    ///
    /// A pending command is dropped.
    pub async fn close(&mut self) {
        self.connection.close().await;
        self.teardown();
    }

    async fn await_continuation(&mut self) -> Result<Option<Result<CommandResult>>> {
        loop {
            match self.step().await? {
                Step::Continuation(_) => return Ok(None),
                Step::Completed(result) => return Ok(Some(result)),
                Step::Progress => {}
            }
        }
    }

    /// Reads and dispatches one frame.
    async fn step(&mut self) -> Result<Step> {
        let frame = match self.connection.read_frame().await {
            Ok(frame) => frame,
            Err(e) => return Err(self.fail(e)),
        };

        let line = match ResponseParser::parse_frame(&frame) {
            Ok(line) => line,
            Err(e) => {
                return Ok(match self.correlator.reject(&frame, e) {
                    Some((_, e)) => Step::Completed(Err(e)),
                    None => Step::Progress,
                });
            }
        };

        let step = match self.correlator.accept(line) {
            Disposition::Untagged(response) => {
                self.deliver(&response);
                self.correlator.record(response);
                Step::Progress
            }
            Disposition::Continuation(text) => {
                debug!(text, "continuation request");
                Step::Continuation(text)
            }
            Disposition::Completed {
                kind,
                result,
                parse_error,
            } => {
                debug!(tag = %result.tag, status = %result.status, "command completed");
                self.session
                    .on_completion(&kind, result.status, result.code.as_ref());
                if let Some(ResponseCode::Capability(capabilities)) = &result.code {
                    self.capabilities.clone_from(capabilities);
                }
                if kind == CommandKind::Logout && result.is_ok() {
                    self.connection.close().await;
                }
                Step::Completed(parse_error.map_or(Ok(result), Err))
            }
            Disposition::Ignored => Step::Progress,
        };
        Ok(step)
    }

    fn deliver(&mut self, response: &UntaggedResponse) {
        self.session.observe(response);

        match response {
            UntaggedResponse::Data {
                keyword, values, ..
            } if keyword.eq_ignore_ascii_case("CAPABILITY") => {
                self.capabilities = values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_ascii_uppercase)
                    .collect();
            }
            UntaggedResponse::Condition {
                code: Some(ResponseCode::Capability(capabilities)),
                ..
            } => self.capabilities.clone_from(capabilities),
            _ => {}
        }

        if response.is_bye() {
            self.bye_received = true;
        }

        for handler in &mut self.handlers {
            handler.on_untagged(response);
        }
    }

    /// Tears the session down if `error` left the connection unusable.
    fn fail(&mut self, error: Error) -> Error {
        if error.is_fatal() || self.connection.is_closed() {
            self.connection.abort(&error.to_string());
            self.teardown();
        }
        error
    }

    fn teardown(&mut self) {
        if let Some(pending) = self.correlator.fail() {
            warn!(tag = %pending.tag, "pending command abandoned");
        }
        self.resolved = None;
        self.session.on_disconnect();
    }
}

fn greeting_error(error: Error) -> io::Error {
    let kind = match &error {
        Error::ReadTimeout(_) => io::ErrorKind::TimedOut,
        Error::Disconnected(_) => io::ErrorKind::ConnectionAborted,
        _ => io::ErrorKind::InvalidData,
    };
    io::Error::new(kind, error.to_string())
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
    use tokio_test::io::Builder;

    fn config() -> Config {
        Config::builder("localhost")
            .read_timeout(Some(Duration::from_secs(5)))
            .connect_timeout(Duration::from_secs(5))
            .build()
    }

    #[tokio::test]
    async fn test_ok_greeting_connects() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 LITERAL+] ready\r\n")
            .build();
        let client = Client::from_stream(mock, &config()).await.unwrap();

        assert_eq!(client.state(), SessionState::Connected);
        assert!(client.has_capability("literal+"));
        assert!(client.pending_tag().is_none());
    }

    #[tokio::test]
    async fn test_preauth_greeting_authenticates() {
        let mock = Builder::new().read(b"* PREAUTH welcome back\r\n").build();
        let client = Client::from_stream(mock, &config()).await.unwrap();
        assert_eq!(client.state(), SessionState::Authenticated);
    }

    #[tokio::test]
    async fn test_bye_greeting_is_connect_error() {
        let mock = Builder::new().read(b"* BYE too many connections\r\n").build();
        let err = Client::from_stream(mock, &config()).await.unwrap_err();

        let Error::Connect { address, source } = err else {
            panic!("Expected Connect error");
        };
        assert_eq!(address, "localhost:993");
        assert_eq!(source.kind(), io::ErrorKind::ConnectionRefused);
        assert!(source.to_string().contains("too many connections"));
    }

    #[tokio::test]
    async fn test_tagged_greeting_is_connect_error() {
        let mock = Builder::new().read(b"A1 OK hello\r\n").build();
        let err = Client::from_stream(mock, &config()).await.unwrap_err();
        assert!(matches!(err, Error::Connect { .. }));
    }

    #[tokio::test]
    async fn test_missing_greeting_is_connect_error() {
        let mock = Builder::new().read(b"* OK").build();
        let err = Client::from_stream(mock, &config()).await.unwrap_err();

        let Error::Connect { source, .. } = err else {
            panic!("Expected Connect error");
        };
        assert_eq!(source.kind(), io::ErrorKind::ConnectionAborted);
    }

    #[tokio::test]
    async fn test_noop_collects_untagged() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A1 NOOP\r\n")
            .read(b"* 3 EXISTS\r\n* 1 RECENT\r\nA1 OK NOOP completed\r\n")
            .build();
        let mut client = Client::from_stream(mock, &config()).await.unwrap();

        let untagged = client.noop().await.unwrap();
        assert_eq!(untagged.len(), 2);
        assert!(untagged[0].is("EXISTS"));
        assert!(untagged[1].is("RECENT"));
        assert!(client.pending_tag().is_none());
    }

    #[tokio::test]
    async fn test_capability_refresh() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A1 CAPABILITY\r\n")
            .read(b"* CAPABILITY IMAP4rev1 idle\r\nA1 OK done\r\n")
            .build();
        let mut client = Client::from_stream(mock, &config()).await.unwrap();

        let capabilities = client.capability().await.unwrap();
        assert_eq!(capabilities, vec!["IMAP4REV1".to_string(), "IDLE".to_string()]);
        assert!(client.has_capability("IDLE"));
    }

    #[tokio::test]
    async fn test_complete_without_pending_command() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut client = Client::from_stream(mock, &config()).await.unwrap();
        assert!(matches!(
            client.complete().await.unwrap_err(),
            Error::InvalidCommand(_)
        ));
    }

    #[tokio::test]
    async fn test_invalid_command_writes_nothing() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut client = Client::from_stream(mock, &config()).await.unwrap();

        let command = Command::new("NOOP").arg(crate::command::Argument::Quoted("a\r\nb".into()));
        assert!(matches!(
            client.send(&command).await.unwrap_err(),
            Error::InvalidCommand(_)
        ));
        assert!(client.pending_tag().is_none());
        assert_eq!(client.state(), SessionState::Connected);
    }
}
