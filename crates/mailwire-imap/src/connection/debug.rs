//! Wire tracing.

use tracing::trace;

/// Receives a copy of everything written and read on a connection.
///
/// Nothing in the protocol engine depends on what a sink does with the data.
pub trait DebugSink: Send {
    /// Bytes written by the client, without the trailing CRLF.
    fn client(&mut self, data: &[u8]);

    /// A line (without CRLF) or literal read from the server.
    fn server(&mut self, data: &[u8]);

    /// Connection events such as timeouts and disconnects.
    fn info(&mut self, message: &str);
}

/// Forwards wire traffic to `tracing` at TRACE level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDebug;

impl DebugSink for TracingDebug {
    fn client(&mut self, data: &[u8]) {
        trace!(direction = "C", "{}", String::from_utf8_lossy(data));
    }

    fn server(&mut self, data: &[u8]) {
        trace!(direction = "S", "{}", String::from_utf8_lossy(data));
    }

    fn info(&mut self, message: &str) {
        trace!(message);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDebug;

impl DebugSink for NoopDebug {
    fn client(&mut self, _data: &[u8]) {}
    fn server(&mut self, _data: &[u8]) {}
    fn info(&mut self, _message: &str) {}
}
