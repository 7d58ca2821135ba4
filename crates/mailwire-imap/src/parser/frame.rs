//! Response framing.
//!
//! A server response is one CRLF-terminated line, unless that line ends in a
//! literal marker `{n}`: then exactly `n` raw bytes follow, and the response
//! continues with another line. A [`Frame`] keeps the text lines and the
//! literal payloads apart so that no line scanning is ever applied to
//! literal bytes.

use crate::{Error, Result};

/// One complete server response as read off the wire.
///
/// `lines` never include their CRLF. When a frame is complete,
/// `lines.len() == literals.len() + 1` and `literals[i]` is the payload
/// announced at the end of `lines[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    lines: Vec<Vec<u8>>,
    literals: Vec<Vec<u8>>,
}

impl Frame {
    /// Creates an empty frame.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            literals: Vec::new(),
        }
    }

    /// Creates a frame holding a single line (without CRLF).
    #[must_use]
    pub fn from_line(line: impl Into<Vec<u8>>) -> Self {
        Self {
            lines: vec![line.into()],
            literals: Vec::new(),
        }
    }

    /// Appends a text line (without CRLF).
    pub fn push_line(&mut self, line: Vec<u8>) {
        self.lines.push(line);
    }

    /// Appends the literal payload for the most recent line.
    pub fn push_literal(&mut self, literal: Vec<u8>) {
        self.literals.push(literal);
    }

    /// Returns the text lines.
    #[must_use]
    pub fn lines(&self) -> &[Vec<u8>] {
        &self.lines
    }

    /// Returns the literal payloads.
    #[must_use]
    pub fn literals(&self) -> &[Vec<u8>] {
        &self.literals
    }

    /// Returns the first line, or an empty slice.
    #[must_use]
    pub fn first_line(&self) -> &[u8] {
        self.lines.first().map_or(&[], Vec::as_slice)
    }

    /// Returns true if no line has been read yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Reassembles the wire representation, CRLFs included.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, line) in self.lines.iter().enumerate() {
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
            if let Some(literal) = self.literals.get(i) {
                out.extend_from_slice(literal);
            }
        }
        out
    }

    /// Frames one response from the start of an in-memory buffer.
    ///
    /// Returns the frame and the number of bytes it occupied, or `None` if
    /// the buffer does not yet hold a complete response.
    ///
    /// # Errors
    ///
    /// Returns a parse error if a literal is larger than `max_literal_size`.
    pub fn split(input: &[u8], max_literal_size: usize) -> Result<Option<(Self, usize)>> {
        let mut frame = Self::new();
        let mut pos = 0;

        loop {
            let Some(end) = find_crlf(&input[pos..]) else {
                return Ok(None);
            };
            let line = input[pos..pos + end].to_vec();
            pos += end + 2;

            let Some(marker) = literal_marker(&line) else {
                frame.push_line(line);
                return Ok(Some((frame, pos)));
            };

            if marker.size > max_literal_size {
                return Err(Error::parse(
                    pos,
                    format!(
                        "literal too large: {} bytes (max {max_literal_size})",
                        marker.size
                    ),
                ));
            }
            if input.len() - pos < marker.size {
                return Ok(None);
            }

            frame.push_line(line);
            frame.push_literal(input[pos..pos + marker.size].to_vec());
            pos += marker.size;
        }
    }
}

/// A literal length marker found at the end of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralMarker {
    /// Announced payload size in bytes.
    pub size: usize,
    /// `{n+}`: the sender does not wait for a continuation.
    pub non_synchronizing: bool,
}

/// Finds the position of CRLF in a buffer.
pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parses a literal marker from the end of a line (CRLF already stripped).
///
/// Matches `{123}` and `{123+}`. Sizes that do not fit in `usize` saturate,
/// so they are rejected by any size limit.
#[must_use]
pub fn literal_marker(line: &[u8]) -> Option<LiteralMarker> {
    let inner = line.strip_suffix(b"}")?;
    let open = inner.iter().rposition(|&b| b == b'{')?;
    let digits = &inner[open + 1..];

    let (digits, non_synchronizing) = match digits.strip_suffix(b"+") {
        Some(d) => (d, true),
        None => (digits, false),
    };

    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }

    let size = digits.iter().fold(0usize, |acc, &d| {
        acc.saturating_mul(10).saturating_add(usize::from(d - b'0'))
    });

    Some(LiteralMarker {
        size,
        non_synchronizing,
    })
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
    fn test_find_crlf() {
        assert_eq!(find_crlf(b"hello\r\n"), Some(5));
        assert_eq!(find_crlf(b"\r\n"), Some(0));
        assert_eq!(find_crlf(b"no newline"), None);
        assert_eq!(find_crlf(b"just\n"), None);
        assert_eq!(find_crlf(b"just\r"), None);
    }

    #[test]
    fn test_literal_marker() {
        let marker = |line: &[u8]| literal_marker(line).map(|m| (m.size, m.non_synchronizing));
        assert_eq!(marker(b"BODY {123}"), Some((123, false)));
        assert_eq!(marker(b"BODY {123+}"), Some((123, true)));
        assert_eq!(marker(b"{0}"), Some((0, false)));
        assert_eq!(marker(b"no literal"), None);
        assert_eq!(marker(b"incomplete {123"), None);
        assert_eq!(marker(b"wrong {abc}"), None);
        assert_eq!(marker(b"empty {}"), None);
        assert_eq!(marker(b"{99999999999999999999999999}"), Some((usize::MAX, false)));
    }

    #[test]
    fn test_split_single_line() {
        let (frame, used) = Frame::split(b"* OK ready\r\nA1 OK", 1024).unwrap().unwrap();
        assert_eq!(frame.lines(), &[b"* OK ready".to_vec()]);
        assert!(frame.literals().is_empty());
        assert_eq!(used, 12);
    }

    #[test]
    fn test_split_literal_with_embedded_crlf() {
        let input = b"* 1 FETCH (BODY[] {7}\r\nab\r\ncd\r\n)\r\n";
        let (frame, used) = Frame::split(input, 1024).unwrap().unwrap();
        assert_eq!(used, input.len());
        assert_eq!(frame.lines().len(), 2);
        assert_eq!(frame.literals(), &[b"ab\r\ncd\r".to_vec()]);
        assert_eq!(frame.lines()[1], b"\n)".to_vec());
        assert_eq!(frame.to_bytes(), input.to_vec());
    }

    #[test]
    fn test_split_incomplete() {
        assert!(Frame::split(b"* OK rea", 1024).unwrap().is_none());
        assert!(Frame::split(b"* 1 FETCH (BODY {10}\r\nshort", 1024).unwrap().is_none());
        assert!(Frame::split(b"* 1 FETCH (BODY {2}\r\nok", 1024).unwrap().is_none());
    }

    #[test]
    fn test_split_rejects_oversized_literal() {
        let err = Frame::split(b"* 1 FETCH (BODY {2048}\r\n", 1024).unwrap_err();
        assert!(err.to_string().contains("literal too large"));
    }
}
