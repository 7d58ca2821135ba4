//! Integration tests for the IMAP client.
//!
//! Most tests use a mock stream that replays a scripted server transcript
//! and records everything the client writes. Tests that depend on the
//! order of client and server turns run a small server on a
//! `tokio::io::duplex` pipe instead.

#![allow(clippy::unwrap_used, clippy::too_many_lines)]

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use proptest::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};

use mailwire_imap::handler::{CollectingHandler, UnsolicitedEvent};
use mailwire_imap::{
    Client, Command, Config, Connection, Credentials, DebugSink, Error, Security, SessionState,
    Status, UntaggedResponse, Value,
};

/// Bytes written by the client, shared with the test.
#[derive(Clone, Default)]
struct Written(Arc<Mutex<Vec<u8>>>);

impl Written {
    fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }
}

/// Mock stream that returns predefined responses.
struct MockStream {
    /// Responses to return (in order).
    responses: Cursor<Vec<u8>>,
    /// Captured commands sent by the client.
    sent: Written,
    fail_writes: bool,
}

impl MockStream {
    fn new(responses: &[u8]) -> (Self, Written) {
        let sent = Written::default();
        let stream = Self {
            responses: Cursor::new(responses.to_vec()),
            sent: sent.clone(),
            fail_writes: false,
        };
        (stream, sent)
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let data = self.responses.get_ref();
        let pos = usize::try_from(self.responses.position()).unwrap();

        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let to_read = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.responses.set_position((pos + to_read) as u64);

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.fail_writes {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }
        self.sent.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn config() -> Config {
    Config::builder("mock")
        .security(Security::None)
        .read_timeout(Some(Duration::from_secs(60)))
        .build()
}

async fn connect(script: &[u8]) -> (Client<MockStream>, Written) {
    let (stream, sent) = MockStream::new(script);
    let client = Client::from_stream(stream, &config()).await.unwrap();
    (client, sent)
}

fn find_literal(values: &[Value]) -> Option<&[u8]> {
    values.iter().find_map(|value| match value {
        Value::Literal(data) => Some(data.as_slice()),
        Value::List(items) | Value::Section(items) => find_literal(items),
        _ => None,
    })
}

fn fetch_literal(response: &UntaggedResponse) -> Option<&[u8]> {
    match response {
        UntaggedResponse::Data { values, .. } => find_literal(values),
        UntaggedResponse::Condition { .. } => None,
    }
}

#[tokio::test]
async fn test_login_select_and_single_pending_command() {
    let (mut client, sent) = connect(
        b"* OK [CAPABILITY IMAP4rev1] ready\r\n\
          A1 OK LOGIN completed\r\n\
          * 172 EXISTS\r\n\
          * 1 RECENT\r\n\
          * OK [UNSEEN 12] Message 12 is first unseen\r\n\
          * OK [UIDVALIDITY 3857529045] UIDs valid\r\n\
          * OK [UIDNEXT 4392] Predicted next UID\r\n\
          * FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n\
          * OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)] Limited\r\n\
          A2 OK [READ-WRITE] SELECT completed\r\n\
          A3 OK NOOP completed\r\n",
    )
    .await;
    assert_eq!(client.state(), SessionState::Connected);

    client
        .login(&Credentials::new("alice", "hunter2"))
        .await
        .unwrap();
    assert_eq!(client.state(), SessionState::Authenticated);
    assert_eq!(sent.text(), "A1 LOGIN alice hunter2\r\n");

    let inbox = client.select("INBOX").await.unwrap();
    assert_eq!(client.state(), SessionState::MailboxSelected);
    assert_eq!(inbox.name(), "INBOX");
    assert!(!inbox.is_read_only());
    assert_eq!(inbox.exists(), 172);
    assert_eq!(inbox.status().recent, 1);
    assert_eq!(inbox.status().unseen, Some(12));
    assert_eq!(inbox.status().uid_validity, Some(3_857_529_045));
    assert_eq!(inbox.status().uid_next, Some(4392));
    assert_eq!(inbox.status().flags.len(), 5);
    assert!(inbox.status().permanent_flags.contains(&"\\*".to_string()));
    assert!(sent.text().ends_with("A2 SELECT INBOX\r\n"));

    let tag = client.issue(&Command::noop()).await.unwrap();
    assert_eq!(tag, "A3");
    let err = client.issue(&Command::select("INBOX")).await.unwrap_err();
    assert!(matches!(err, Error::Concurrency { ref pending } if pending == "A3"));
    assert_eq!(sent.text().matches("NOOP").count(), 1);

    let result = client.complete().await.unwrap();
    assert_eq!(result.tag, "A3");
    assert!(result.is_ok());
    assert!(client.pending_tag().is_none());
}

#[tokio::test]
async fn test_illegal_state_writes_nothing() {
    let (mut client, sent) = connect(b"* OK ready\r\n").await;

    let err = client.send(&Command::select("INBOX")).await.unwrap_err();
    assert!(matches!(
        err,
        Error::IllegalState {
            ref command,
            state: SessionState::Connected
        } if command == "SELECT"
    ));

    let err = client.send(&Command::fetch("1:*", "FLAGS")).await.unwrap_err();
    assert!(matches!(err, Error::IllegalState { .. }));

    assert!(sent.bytes().is_empty());
    assert!(client.pending_tag().is_none());
    assert_eq!(client.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_literal_with_crlf_is_spliced_intact() {
    let body: &[u8] = b"Subject: hi\r\n\r\n* 99 EXISTS\r\nA9 OK not a completion\r\n";
    let mut script = Vec::new();
    script.extend_from_slice(b"* PREAUTH ready\r\n");
    script.extend_from_slice(b"* 1 EXISTS\r\nA1 OK [READ-ONLY] EXAMINE completed\r\n");
    script.extend_from_slice(format!("* 1 FETCH (UID 7 BODY[] {{{}}}\r\n", body.len()).as_bytes());
    script.extend_from_slice(body);
    script.extend_from_slice(b")\r\nA2 OK FETCH completed\r\n");

    let (mut client, sent) = connect(&script).await;
    let mailbox = client.examine("Archive").await.unwrap();
    assert!(mailbox.is_read_only());

    let result = client
        .send(&Command::fetch("1", "(UID BODY[])"))
        .await
        .unwrap();
    assert_eq!(result.status, Status::Ok);
    assert_eq!(result.untagged.len(), 1);
    assert!(result.untagged[0].is("FETCH"));
    assert_eq!(fetch_literal(&result.untagged[0]), Some(body));

    // The literal's fake EXISTS was not applied to the mailbox.
    assert_eq!(client.mailbox().unwrap().exists(), 1);
    assert!(sent.text().ends_with("A2 FETCH 1 (UID BODY[])\r\n"));
}

#[tokio::test]
async fn test_tags_strictly_increase_across_failures() {
    let (mut client, sent) = connect(
        b"* OK ready\r\n\
          A1 NO [AUTHENTICATIONFAILED] bad password\r\n\
          A2 BAD unknown command\r\n\
          A3 OK NOOP completed\r\n",
    )
    .await;

    let result = client
        .send(&Command::login("alice", "wrong"))
        .await
        .unwrap();
    assert_eq!(result.status, Status::No);
    assert_eq!(client.state(), SessionState::Connected);

    let result = client.send(&Command::new("XFROB")).await.unwrap();
    assert_eq!(result.status, Status::Bad);
    assert!(matches!(result.into_result(), Err(Error::Bad(_))));

    assert!(client.send(&Command::select("INBOX")).await.is_err());

    let result = client.send(&Command::noop()).await.unwrap();
    assert_eq!(result.tag, "A3");

    let tags: Vec<String> = sent
        .text()
        .lines()
        .map(|line| line.split(' ').next().unwrap().to_string())
        .collect();
    assert_eq!(tags, vec!["A1", "A2", "A3"]);
}

#[tokio::test]
async fn test_eof_mid_response_disconnects() {
    let (mut client, _sent) = connect(b"* OK ready\r\n* 3 EXISTS\r\n* 1 FETCH (FLAGS").await;

    let err = client.send(&Command::noop()).await.unwrap_err();
    assert!(matches!(err, Error::Disconnected(_)));
    assert!(err.is_fatal());
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(client.is_closed());
    assert!(client.pending_tag().is_none());

    let err = client.send(&Command::noop()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::IllegalState {
            state: SessionState::Disconnected,
            ..
        }
    ));
}

#[tokio::test]
async fn test_write_failure_fails_pending_command() {
    let (mut stream, _sent) = MockStream::new(b"* OK ready\r\n");
    stream.fail_writes = true;
    let mut client = Client::from_stream(stream, &config()).await.unwrap();

    let err = client.send(&Command::noop()).await.unwrap_err();
    assert!(matches!(err, Error::Write(_)));
    assert!(client.pending_tag().is_none());
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(client.is_closed());
}

#[tokio::test]
async fn test_untagged_reach_handlers_in_wire_order() {
    let (mut client, _sent) = connect(
        b"* PREAUTH ready\r\n\
          * 3 EXISTS\r\n\
          * 2 RECENT\r\n\
          * 1 EXPUNGE\r\n\
          * OK [ALERT] maintenance at noon\r\n\
          A1 OK NOOP completed\r\n",
    )
    .await;

    let collected = Arc::new(Mutex::new(CollectingHandler::new()));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<UntaggedResponse>();
    client.add_handler(Arc::clone(&collected));
    client.add_handler(tx);

    let untagged = client.noop().await.unwrap();
    assert_eq!(untagged.len(), 4);

    assert_eq!(
        collected.lock().unwrap().take(),
        vec![
            UnsolicitedEvent::Exists(3),
            UnsolicitedEvent::Recent(2),
            UnsolicitedEvent::Expunge(1),
            UnsolicitedEvent::Alert("maintenance at noon".to_string()),
            UnsolicitedEvent::Condition(
                mailwire_imap::Condition::Ok,
                "maintenance at noon".to_string()
            ),
        ]
    );

    let mut forwarded = Vec::new();
    while let Ok(response) = rx.try_recv() {
        forwarded.push(response);
    }
    assert_eq!(forwarded, untagged);
}

#[tokio::test]
async fn test_mailbox_cache_tracks_exists_and_expunge() {
    let (mut client, _sent) = connect(
        b"* PREAUTH ready\r\n\
          * 3 EXISTS\r\n\
          A1 OK [READ-WRITE] SELECT completed\r\n\
          * 2 EXPUNGE\r\n\
          A2 OK NOOP completed\r\n\
          * 9 EXISTS\r\n\
          A3 OK NOOP completed\r\n",
    )
    .await;

    client.select("INBOX").await.unwrap();
    assert_eq!(client.mailbox().unwrap().exists(), 3);

    client.noop().await.unwrap();
    assert_eq!(client.mailbox().unwrap().exists(), 2);

    client.noop().await.unwrap();
    assert_eq!(client.mailbox().unwrap().exists(), 9);
}

#[tokio::test]
async fn test_bad_keeps_state_and_no_deselects() {
    let (mut client, _sent) = connect(
        b"* PREAUTH ready\r\n\
          * 4 EXISTS\r\n\
          A1 OK [READ-WRITE] SELECT completed\r\n\
          A2 BAD invalid mailbox name\r\n\
          A3 NO [NONEXISTENT] no such mailbox\r\n",
    )
    .await;

    client.select("INBOX").await.unwrap();

    let err = client.select("Bad\\Name").await.unwrap_err();
    assert!(matches!(err, Error::Bad(_)));
    assert_eq!(client.state(), SessionState::MailboxSelected);
    assert_eq!(client.mailbox().unwrap().name(), "INBOX");
    assert_eq!(client.mailbox().unwrap().exists(), 4);

    let err = client.select("Missing").await.unwrap_err();
    assert!(matches!(err, Error::No(_)));
    assert_eq!(client.state(), SessionState::Authenticated);
    assert!(client.mailbox().is_none());
}

#[tokio::test]
async fn test_close_mailbox_and_close_twice() {
    let (mut client, _sent) = connect(
        b"* PREAUTH ready\r\n\
          A1 OK SELECT completed\r\n\
          A2 OK CLOSE completed\r\n",
    )
    .await;

    client.select("INBOX").await.unwrap();
    client.close_mailbox().await.unwrap();
    assert_eq!(client.state(), SessionState::Authenticated);
    assert!(client.mailbox().is_none());

    client.close().await;
    client.close().await;
    assert!(client.is_closed());
    assert_eq!(client.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_parse_error_reported_after_resync() {
    let (mut client, _sent) = connect(
        b"* OK ready\r\n\
          * 1 FETCH (UID 5\r\n\
          * 2 EXISTS\r\n\
          A1 OK NOOP completed\r\n\
          A2 OK NOOP completed\r\n\
          A3 MAYBE later\r\n\
          A4 OK NOOP completed\r\n",
    )
    .await;

    let err = client.send(&Command::noop()).await.unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));
    assert!(!err.is_fatal());
    assert!(!client.is_closed());
    assert!(client.pending_tag().is_none());

    let result = client.send(&Command::noop()).await.unwrap();
    assert_eq!(result.tag, "A2");

    // A malformed completion that still carries the tag resolves at once.
    let err = client.send(&Command::noop()).await.unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));

    let result = client.send(&Command::noop()).await.unwrap();
    assert_eq!(result.tag, "A4");
    assert_eq!(client.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_stale_completion_is_ignored() {
    let (mut client, _sent) = connect(
        b"* OK ready\r\n\
          A0 OK from an earlier life\r\n\
          A1 OK NOOP completed\r\n",
    )
    .await;

    let result = client.send(&Command::noop()).await.unwrap();
    assert_eq!(result.tag, "A1");
    assert_eq!(result.text, "NOOP completed");
}

#[tokio::test]
async fn test_refused_literal_resolves_with_no() {
    let (mut client, sent) = connect(
        b"* PREAUTH ready\r\n\
          A1 NO [TRYCREATE] no such mailbox\r\n",
    )
    .await;

    let result = client
        .send(&Command::append("Nowhere", &[], b"hello world".to_vec()))
        .await
        .unwrap();
    assert_eq!(result.status, Status::No);
    assert_eq!(result.code, Some(mailwire_imap::ResponseCode::TryCreate));
    assert_eq!(sent.text(), "A1 APPEND Nowhere {11}\r\n");
    assert!(client.pending_tag().is_none());
    assert_eq!(client.state(), SessionState::Authenticated);
}

#[tokio::test]
async fn test_literal_plus_is_sent_in_one_write() {
    let (mut client, sent) = connect(
        b"* PREAUTH [CAPABILITY IMAP4rev1 LITERAL+] ready\r\n\
          A1 OK APPEND completed\r\n",
    )
    .await;

    let result = client
        .send(&Command::append("INBOX", &["\\Seen"], b"hello world".to_vec()))
        .await
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(
        sent.text(),
        "A1 APPEND INBOX (\\Seen) {11+}\r\nhello world\r\n"
    );
}

#[tokio::test]
async fn test_literal_upload_waits_for_continuation() {
    let message: &[u8] = b"From: a@example.com\r\n\r\nline\r\n";
    let (client_io, server_io) = tokio::io::duplex(4096);

    let server = tokio::spawn(async move {
        let mut server = BufReader::new(server_io);
        server.get_mut().write_all(b"* PREAUTH ready\r\n").await.unwrap();

        let mut line = Vec::new();
        server.read_until(b'\n', &mut line).await.unwrap();
        assert_eq!(line, format!("A1 APPEND INBOX {{{}}}\r\n", message.len()).as_bytes());

        // Nothing more until the continuation is sent.
        assert!(server.buffer().is_empty());
        let early = tokio::time::timeout(Duration::from_millis(50), server.fill_buf()).await;
        assert!(early.is_err());

        server.get_mut().write_all(b"+ Ready for literal data\r\n").await.unwrap();

        let mut data = vec![0; message.len() + 2];
        server.read_exact(&mut data).await.unwrap();
        assert_eq!(&data[..message.len()], message);
        assert_eq!(&data[message.len()..], b"\r\n");

        server
            .get_mut()
            .write_all(b"A1 OK [APPENDUID 38505 3955] APPEND completed\r\n")
            .await
            .unwrap();
        server
    });

    let mut client = Client::from_stream(client_io, &config()).await.unwrap();
    let result = client
        .send(&Command::append("INBOX", &[], message.to_vec()))
        .await
        .unwrap();
    assert!(result.is_ok());
    assert!(matches!(
        result.code,
        Some(mailwire_imap::ResponseCode::Other { ref name, .. }) if name == "APPENDUID"
    ));

    let _server = server.await.unwrap();
}

#[tokio::test]
async fn test_idle_delivers_updates_and_ends_with_done() {
    let (client_io, server_io) = tokio::io::duplex(4096);

    let server = tokio::spawn(async move {
        let mut server = BufReader::new(server_io);
        server
            .get_mut()
            .write_all(b"* PREAUTH [CAPABILITY IMAP4rev1 IDLE] ready\r\n")
            .await
            .unwrap();

        let mut line = Vec::new();
        server.read_until(b'\n', &mut line).await.unwrap();
        assert_eq!(line, b"A1 IDLE\r\n");
        server
            .get_mut()
            .write_all(b"+ idling\r\n* 4 EXISTS\r\n")
            .await
            .unwrap();

        line.clear();
        server.read_until(b'\n', &mut line).await.unwrap();
        assert_eq!(line, b"DONE\r\n");
        server
            .get_mut()
            .write_all(b"* 1 EXPUNGE\r\nA1 OK IDLE terminated\r\n")
            .await
            .unwrap();
        server
    });

    let mut client = Client::from_stream(client_io, &config()).await.unwrap();
    assert!(client.has_capability("IDLE"));

    let collected = Arc::new(Mutex::new(CollectingHandler::new()));
    client.add_handler(Arc::clone(&collected));

    let untagged = client.idle(Duration::from_millis(100)).await.unwrap();
    assert_eq!(untagged.len(), 2);
    assert!(untagged[0].is("EXISTS"));
    assert!(untagged[1].is("EXPUNGE"));
    assert_eq!(
        collected.lock().unwrap().take(),
        vec![UnsolicitedEvent::Exists(4), UnsolicitedEvent::Expunge(1)]
    );
    assert_eq!(client.state(), SessionState::Authenticated);
    assert!(client.pending_tag().is_none());

    let _server = server.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_caller_timeout_closes_connection() {
    let (client_io, mut server_io) = tokio::io::duplex(4096);
    server_io.write_all(b"* OK ready\r\n").await.unwrap();

    let mut client = Client::from_stream(client_io, &config()).await.unwrap();
    let err = client
        .send_with_timeout(&Command::noop(), Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ReadTimeout(d) if d == Duration::from_secs(5)));
    assert!(client.is_closed());
    assert!(client.pending_tag().is_none());
    assert_eq!(client.state(), SessionState::Disconnected);

    let mut line = vec![0; 9];
    server_io.read_exact(&mut line).await.unwrap();
    assert_eq!(line, b"A1 NOOP\r\n");
}

#[tokio::test(start_paused = true)]
async fn test_read_timeout_fails_pending_command() {
    let (client_io, mut server_io) = tokio::io::duplex(4096);
    server_io.write_all(b"* OK ready\r\n").await.unwrap();

    let config = Config::builder("mock")
        .security(Security::None)
        .read_timeout(Some(Duration::from_secs(2)))
        .build();
    let mut client = Client::from_stream(client_io, &config).await.unwrap();

    let err = client.send(&Command::noop()).await.unwrap_err();
    assert!(matches!(err, Error::ReadTimeout(d) if d == Duration::from_secs(2)));
    assert!(client.is_closed());
    assert_eq!(client.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_logout() {
    let (mut client, sent) = connect(
        b"* OK ready\r\n\
          * BYE logging out\r\n\
          A1 OK LOGOUT completed\r\n",
    )
    .await;

    client.logout().await.unwrap();
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(client.is_closed());
    assert_eq!(sent.text(), "A1 LOGOUT\r\n");
}

#[tokio::test]
async fn test_logout_without_completion_after_bye() {
    let (mut client, _sent) = connect(b"* OK ready\r\n* BYE see you\r\n").await;
    client.logout().await.unwrap();
    assert!(client.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_authenticate_challenge_is_returned_to_caller() {
    let (mut client, sent) = connect(
        b"* OK ready\r\n\
          + \r\n\
          A1 OK AUTHENTICATE completed\r\n",
    )
    .await;

    let start = tokio::time::Instant::now();
    let err = client
        .send(&Command::authenticate("PLAIN", None))
        .await
        .unwrap_err();

    let (tag, text) = match err {
        Error::Continuation { tag, text } => (tag, text),
        other => panic!("expected a continuation request, got {other:?}"),
    };
    assert_eq!(tag, "A1");
    assert_eq!(text, "");
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert!(!client.is_closed());
    assert_eq!(client.state(), SessionState::Connected);
    assert_eq!(client.pending_tag().unwrap(), "A1");

    client.continue_with(b"AGFsaWNlAGh1bnRlcjI=").await.unwrap();
    let result = client.complete().await.unwrap();
    assert_eq!(result.status, Status::Ok);
    assert_eq!(client.state(), SessionState::Authenticated);
    assert!(client.pending_tag().is_none());
    assert_eq!(
        sent.text(),
        "A1 AUTHENTICATE PLAIN\r\nAGFsaWNlAGh1bnRlcjI=\r\n"
    );
}

#[tokio::test]
async fn test_authenticate_answers_each_challenge() {
    let (mut client, sent) = connect(
        b"* OK ready\r\n\
          + VXNlcm5hbWU6\r\n\
          + UGFzc3dvcmQ6\r\n\
          A1 OK [CAPABILITY IMAP4rev1 IDLE] logged in\r\n",
    )
    .await;

    let mut challenges = Vec::new();
    client
        .authenticate("LOGIN", None, |challenge| {
            challenges.push(challenge.to_string());
            match challenge {
                "VXNlcm5hbWU6" => b"YWxpY2U=".to_vec(),
                _ => b"aHVudGVyMg==".to_vec(),
            }
        })
        .await
        .unwrap();

    assert_eq!(challenges, vec!["VXNlcm5hbWU6", "UGFzc3dvcmQ6"]);
    assert_eq!(client.state(), SessionState::Authenticated);
    assert!(client.has_capability("IDLE"));
    assert_eq!(
        sent.text(),
        "A1 AUTHENTICATE LOGIN\r\nYWxpY2U=\r\naHVudGVyMg==\r\n"
    );
}

#[tokio::test]
async fn test_authenticate_cancelled_by_client() {
    let (mut client, sent) = connect(
        b"* OK ready\r\n\
          + \r\n\
          A1 BAD AUTHENTICATE cancelled\r\n",
    )
    .await;

    let err = client
        .authenticate("PLAIN", None, |_| b"*".to_vec())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Bad(_)));
    assert_eq!(client.state(), SessionState::Connected);
    assert!(!client.is_closed());
    assert_eq!(sent.text(), "A1 AUTHENTICATE PLAIN\r\n*\r\n");
}

#[tokio::test]
async fn test_continue_with_requires_pending_command() {
    let (mut client, sent) = connect(b"* OK ready\r\n+ \r\n").await;

    assert!(matches!(
        client.continue_with(b"AAAA").await.unwrap_err(),
        Error::InvalidCommand(_)
    ));

    let err = client
        .send(&Command::authenticate("PLAIN", None))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Continuation { .. }));
    assert!(matches!(
        client.continue_with(b"AA\r\nA2 LOGOUT").await.unwrap_err(),
        Error::InvalidCommand(_)
    ));
    assert_eq!(sent.text(), "A1 AUTHENTICATE PLAIN\r\n");
}

#[tokio::test]
async fn test_unusable_tag_prefix_is_rejected() {
    for prefix in ['*', '+', ' '] {
        let (stream, sent) = MockStream::new(b"* OK ready\r\n");
        let config = Config::builder("mock")
            .security(Security::None)
            .tag_prefix(prefix)
            .build();

        let err = Client::from_stream(stream, &config).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)), "prefix {prefix:?}: {err:?}");
        assert!(sent.bytes().is_empty());
    }
}

#[tokio::test]
async fn test_login_is_redacted_in_debug_trace() {
    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl DebugSink for Recorder {
        fn client(&mut self, data: &[u8]) {
            self.0
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(data).into_owned());
        }
        fn server(&mut self, _data: &[u8]) {}
        fn info(&mut self, _message: &str) {}
    }

    let (stream, sent) = MockStream::new(b"* OK ready\r\nA1 OK LOGIN completed\r\n");
    let recorder = Recorder::default();
    let connection = Connection::new(stream, &config()).with_debug(recorder.clone());
    let mut client = Client::from_connection(connection, &config()).await.unwrap();

    client
        .login(&Credentials::new("alice", "hunter2"))
        .await
        .unwrap();

    let traced = recorder.0.lock().unwrap().clone();
    assert_eq!(traced, vec!["A1 LOGIN <redacted>".to_string()]);
    assert_eq!(sent.text(), "A1 LOGIN alice hunter2\r\n");
}

proptest! {
    #[test]
    fn prop_literal_bytes_survive_framing(body in proptest::collection::vec(any::<u8>(), 0..512)) {
        let mut script = Vec::new();
        script.extend_from_slice(b"* PREAUTH ready\r\nA1 OK SELECT completed\r\n");
        script.extend_from_slice(format!("* 1 FETCH (BODY[] {{{}}}\r\n", body.len()).as_bytes());
        script.extend_from_slice(&body);
        script.extend_from_slice(b")\r\nA2 OK FETCH completed\r\n");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let literal = runtime.block_on(async {
            let (mut client, _sent) = connect(&script).await;
            client.select("INBOX").await.unwrap();
            let result = client.send(&Command::fetch("1", "BODY[]")).await.unwrap();
            fetch_literal(&result.untagged[0]).map(<[u8]>::to_vec)
        });

        prop_assert_eq!(literal, Some(body));
    }

    #[test]
    fn prop_tags_increase_with_each_command(count in 1usize..20) {
        let mut script = b"* OK ready\r\n".to_vec();
        for n in 1..=count {
            script.extend_from_slice(format!("A{n} OK done\r\n").as_bytes());
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let tags = runtime.block_on(async {
            let (mut client, _sent) = connect(&script).await;
            let mut tags = Vec::new();
            for _ in 0..count {
                tags.push(client.send(&Command::noop()).await.unwrap().tag.as_str().to_string());
            }
            tags
        });

        let expected: Vec<String> = (1..=count).map(|n| format!("A{n}")).collect();
        prop_assert_eq!(tags, expected);
    }
}
