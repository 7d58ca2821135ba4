//! Framed I/O for IMAP protocol.
//!
//! IMAP uses CRLF-terminated lines with support for literals.
//! [`Connection`] owns the stream and provides line, exact-length and frame
//! reads plus CRLF-terminated writes. Any I/O failure or timeout closes it;
//! once closed, reads fail with [`Error::Disconnected`] and writes with
//! [`Error::Write`].

use std::future::Future;
use std::io;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tracing::debug;

use super::config::Config;
use super::debug::{DebugSink, TracingDebug};
use super::stream::ImapStream;
use crate::parser::{Frame, literal_marker};
use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Upper bound on a graceful shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Transport connection.
pub struct Connection<S> {
    reader: Option<BufReader<S>>,
    write_buffer: BytesMut,
    read_timeout: Option<Duration>,
    max_line_length: usize,
    max_literal_size: usize,
    debug: Box<dyn DebugSink>,
}

impl Connection<ImapStream> {
    /// Connects to the server described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] if the connection cannot be established.
    pub async fn open(config: &Config) -> Result<Self> {
        let stream = ImapStream::connect(config).await?;
        Ok(Self::new(stream, config))
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an established stream.
    pub fn new(stream: S, config: &Config) -> Self {
        Self {
            reader: Some(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream)),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            read_timeout: config.read_timeout,
            max_line_length: config.max_line_length,
            max_literal_size: config.max_literal_size,
            debug: Box::new(TracingDebug),
        }
    }

    /// Replaces the debug sink.
    #[must_use]
    pub fn with_debug(mut self, sink: impl DebugSink + 'static) -> Self {
        self.debug = Box::new(sink);
        self
    }

    /// Returns true once the connection has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    /// Returns the read timeout.
    #[must_use]
    pub const fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Sets the read timeout; `None` waits forever.
    pub const fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    /// Writes `data` followed by CRLF in a single write.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] if the connection is closed or the write
    /// fails; a failed write closes the connection.
    pub async fn write_line(&mut self, data: &[u8]) -> Result<()> {
        self.write_line_traced(data, None).await
    }

    /// Like [`write_line`](Self::write_line), reporting `trace` to the debug
    /// sink instead of the actual bytes.
    ///
    /// # Errors
    ///
    /// See [`write_line`](Self::write_line).
    pub async fn write_line_traced(&mut self, data: &[u8], trace: Option<&[u8]>) -> Result<()> {
        if self.reader.is_none() {
            return Err(Error::Write(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection is closed",
            )));
        }

        self.debug.client(trace.unwrap_or(data));

        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(data);
        self.write_buffer.extend_from_slice(b"\r\n");

        let timeout = self.read_timeout;
        let result = match self.reader.as_mut() {
            Some(reader) => {
                let stream = reader.get_mut();
                let buffer = &self.write_buffer;
                with_deadline(timeout, async move {
                    stream.write_all(buffer).await?;
                    stream.flush().await?;
                    Ok::<_, io::Error>(())
                })
                .await
            }
            None => Err(io::ErrorKind::NotConnected.into()),
        };

        result.map_err(|e| {
            self.abort(&format!("write failed: {e}"));
            Error::Write(e)
        })
    }

    /// Reads one line, without its CRLF.
    ///
    /// # Errors
    ///
    /// [`Error::ReadTimeout`] or [`Error::Disconnected`] (both close the
    /// connection), or [`Error::Parse`] if the line exceeds the configured
    /// maximum length (also closing it, as the stream cannot be resynchronized).
    pub async fn read_line(&mut self) -> Result<Vec<u8>> {
        let timeout = self.read_timeout;
        let max = self.max_line_length;
        let result = match self.reader.as_mut() {
            Some(reader) => with_deadline(timeout, read_line_from(reader, max)).await,
            None => return Err(Error::Disconnected("connection is closed".to_string())),
        };

        match result {
            Ok(line) => {
                self.debug.server(&line);
                Ok(line)
            }
            Err(e) => Err(self.fail_read(&e)),
        }
    }

    /// Reads exactly `n` bytes, without scanning for line terminators.
    ///
    /// # Errors
    ///
    /// Same as [`read_line`](Self::read_line), minus the length check.
    pub async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let timeout = self.read_timeout;
        let result = match self.reader.as_mut() {
            Some(reader) => {
                with_deadline(timeout, async move {
                    let mut data = vec![0u8; n];
                    reader.read_exact(&mut data).await?;
                    Ok::<_, io::Error>(data)
                })
                .await
            }
            None => return Err(Error::Disconnected("connection is closed".to_string())),
        };

        match result {
            Ok(data) => {
                self.debug.server(&data);
                Ok(data)
            }
            Err(e) => Err(self.fail_read(&e)),
        }
    }

    /// Reads one complete response: a line and, while it ends in a literal
    /// marker, the literal and the line after it.
    ///
    /// # Errors
    ///
    /// Any [`read_line`](Self::read_line) error, or [`Error::Parse`] if a
    /// literal exceeds the configured maximum (the connection is closed).
    pub async fn read_frame(&mut self) -> Result<Frame> {
        let mut frame = Frame::new();
        loop {
            let line = self.read_line().await?;
            let marker = literal_marker(&line);
            frame.push_line(line);

            let Some(marker) = marker else {
                return Ok(frame);
            };

            if marker.size > self.max_literal_size {
                self.abort("literal too large");
                return Err(Error::parse(
                    0,
                    format!(
                        "literal too large: {} bytes (max {})",
                        marker.size, self.max_literal_size
                    ),
                ));
            }

            let literal = self.read_exact(marker.size).await?;
            frame.push_literal(literal);
        }
    }

    /// Waits until the server has sent something (or closed the stream),
    /// giving up at `deadline`. Nothing is consumed, so an elapsed wait
    /// leaves the stream intact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disconnected`] if the connection is closed or the
    /// read fails.
    pub async fn wait_readable(&mut self, deadline: tokio::time::Instant) -> Result<bool> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(Error::Disconnected("connection is closed".to_string()));
        };

        let outcome = match tokio::time::timeout_at(deadline, reader.fill_buf()).await {
            Err(_) => None,
            Ok(Ok(_)) => Some(Ok(())),
            Ok(Err(e)) => Some(Err(e)),
        };

        match outcome {
            None => Ok(false),
            Some(Ok(())) => Ok(true),
            Some(Err(e)) => Err(self.fail_read(&e)),
        }
    }

    /// Shuts the stream down and drops it. Calling it again does nothing.
    pub async fn close(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            let _ = tokio::time::timeout(CLOSE_TIMEOUT, reader.get_mut().shutdown()).await;
            self.debug.info("connection closed");
            debug!("connection closed");
        }
    }

    /// Drops the stream without a shutdown handshake.
    pub(crate) fn abort(&mut self, reason: &str) {
        if self.reader.take().is_some() {
            self.debug.info(reason);
            debug!(reason, "connection aborted");
        }
    }

    fn fail_read(&mut self, e: &io::Error) -> Error {
        let error = match e.kind() {
            io::ErrorKind::TimedOut => {
                Error::ReadTimeout(self.read_timeout.unwrap_or_default())
            }
            io::ErrorKind::InvalidData => Error::parse(0, e.to_string()),
            io::ErrorKind::UnexpectedEof => {
                Error::Disconnected("connection closed by server".to_string())
            }
            _ => Error::Disconnected(e.to_string()),
        };
        self.abort(&error.to_string());
        error
    }
}

/// Runs `fut`, failing with `TimedOut` once `timeout` elapses.
async fn with_deadline<T, F>(timeout: Option<Duration>, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, fut)
            .await
            .unwrap_or_else(|_| Err(io::ErrorKind::TimedOut.into())),
        None => fut.await,
    }
}

/// Reads up to and including CRLF; returns the line without it.
async fn read_line_from<R>(reader: &mut R, max: usize) -> io::Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();

    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }

        let (taken, done) = match buf.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                line.extend_from_slice(&buf[..=pos]);
                (pos + 1, line.ends_with(b"\r\n"))
            }
            None => {
                line.extend_from_slice(buf);
                (buf.len(), false)
            }
        };
        reader.consume(taken);

        if done {
            line.truncate(line.len() - 2);
        }
        if line.len() > max {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line too long (max {max} bytes)"),
            ));
        }
        if done {
            return Ok(line);
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
    use std::sync::{Arc, Mutex};
    use tokio_test::io::Builder;

    fn config() -> Config {
        Config::builder("localhost")
            .read_timeout(Some(Duration::from_secs(1)))
            .max_literal_size(1024)
            .max_line_length(64)
            .build()
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl DebugSink for Recorder {
        fn client(&mut self, data: &[u8]) {
            self.0.lock().unwrap().push(format!("C: {}", String::from_utf8_lossy(data)));
        }
        fn server(&mut self, data: &[u8]) {
            self.0.lock().unwrap().push(format!("S: {}", String::from_utf8_lossy(data)));
        }
        fn info(&mut self, message: &str) {
            self.0.lock().unwrap().push(format!("I: {message}"));
        }
    }

    #[tokio::test]
    async fn test_read_simple_line() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut connection = Connection::new(mock, &config());

        assert_eq!(connection.read_line().await.unwrap(), b"* OK ready");
    }

    #[tokio::test]
    async fn test_read_line_split_across_reads() {
        let mock = Builder::new()
            .read(b"* OK rea")
            .read(b"dy\r")
            .read(b"\n* 1 EXISTS\r\n")
            .build();
        let mut connection = Connection::new(mock, &config());

        assert_eq!(connection.read_line().await.unwrap(), b"* OK ready");
        assert_eq!(connection.read_line().await.unwrap(), b"* 1 EXISTS");
    }

    #[tokio::test]
    async fn test_bare_lf_does_not_end_line() {
        let mock = Builder::new().read(b"* OK a\nb\r\n").build();
        let mut connection = Connection::new(mock, &config());

        assert_eq!(connection.read_line().await.unwrap(), b"* OK a\nb");
    }

    #[tokio::test]
    async fn test_read_frame_with_literal() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {7}\r\n")
            .read(b"ab\r\ncd\r")
            .read(b")\r\n")
            .build();
        let mut connection = Connection::new(mock, &config());

        let frame = connection.read_frame().await.unwrap();
        assert_eq!(frame.lines().len(), 2);
        assert_eq!(frame.literals(), &[b"ab\r\ncd\r".to_vec()]);
        assert_eq!(frame.lines()[1], b")".to_vec());
    }

    #[tokio::test]
    async fn test_literal_size_validation() {
        let mock = Builder::new().read(b"* 1 FETCH (BODY {4096}\r\n").build();
        let mut connection = Connection::new(mock, &config());

        let err = connection.read_frame().await.unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().contains("literal too large"));
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut connection = Connection::new(mock, &config());

        let err = connection.read_line().await.unwrap_err();
        assert!(err.to_string().contains("line too long"));
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn test_terminated_line_over_limit() {
        let long_line = format!("* OK {}\r\n", "x".repeat(200));
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut connection = Connection::new(mock, &config());

        let err = connection.read_line().await.unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().contains("line too long"));
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn test_line_at_limit_is_accepted() {
        let line = format!("{}\r\n", "y".repeat(64));
        let mock = Builder::new().read(line.as_bytes()).build();
        let mut connection = Connection::new(mock, &config());

        assert_eq!(connection.read_line().await.unwrap(), "y".repeat(64).as_bytes());
        assert!(!connection.is_closed());
    }

    #[tokio::test]
    async fn test_eof_disconnects() {
        let mock = Builder::new().read(b"* OK partial").build();
        let mut connection = Connection::new(mock, &config());

        let err = connection.read_line().await.unwrap_err();
        assert!(matches!(err, Error::Disconnected(_)));
        assert!(connection.is_closed());

        assert!(matches!(
            connection.read_line().await.unwrap_err(),
            Error::Disconnected(_)
        ));
        assert!(matches!(
            connection.write_line(b"A1 NOOP").await.unwrap_err(),
            Error::Write(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout_closes() {
        let mock = Builder::new().wait(Duration::from_secs(30)).build();
        let mut connection = Connection::new(mock, &config());

        let err = connection.read_line().await.unwrap_err();
        assert!(matches!(err, Error::ReadTimeout(d) if d == Duration::from_secs(1)));
        assert!(err.is_fatal());
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn test_write_line_appends_crlf() {
        let recorder = Recorder::default();
        let mock = Builder::new().write(b"A1 LOGIN bob secret\r\n").build();
        let mut connection = Connection::new(mock, &config()).with_debug(recorder.clone());

        connection
            .write_line_traced(b"A1 LOGIN bob secret", Some(b"A1 LOGIN <redacted>"))
            .await
            .unwrap();

        let log = recorder.0.lock().unwrap().clone();
        assert_eq!(log, vec!["C: A1 LOGIN <redacted>".to_string()]);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mock = Builder::new().build();
        let mut connection = Connection::new(mock, &config());

        connection.close().await;
        connection.close().await;
        assert!(connection.is_closed());
    }
}
