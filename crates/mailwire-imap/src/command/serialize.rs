//! Command serialization.
//!
//! A command is encoded into one or more [`Segment`]s. Each segment is sent
//! as one CRLF-terminated write; a segment ending in a synchronizing literal
//! marker `{n}` must not be followed by the next one until the server has
//! answered with a `+` continuation.

use super::{Argument, Command};
use crate::types::Tag;

/// Encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Strings longer than this are sent as literals.
    pub literal_threshold: usize,
    /// Send literals as `{n+}` without waiting (server has `LITERAL+`).
    pub non_synchronizing: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            literal_threshold: 1024,
            non_synchronizing: false,
        }
    }
}

/// One write of an encoded command, without its trailing CRLF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Bytes to write.
    pub data: Vec<u8>,
    /// The segment ends in `{n}`; wait for `+` before sending the next one.
    pub awaits_continuation: bool,
}

/// A command ready for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCommand {
    /// Writes, in order. The last one never awaits a continuation.
    pub segments: Vec<Segment>,
}

impl EncodedCommand {
    /// Returns the complete wire image, CRLFs included.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for segment in &self.segments {
            out.extend_from_slice(&segment.data);
            out.extend_from_slice(b"\r\n");
        }
        out
    }

    /// Returns the number of continuation round-trips needed.
    #[must_use]
    pub fn continuations(&self) -> usize {
        self.segments.iter().filter(|s| s.awaits_continuation).count()
    }
}

/// Encodes `command` under `tag`.
#[must_use]
pub fn encode_command(tag: &Tag, command: &Command, options: &EncodeOptions) -> EncodedCommand {
    let mut encoder = Encoder {
        options,
        segments: Vec::new(),
        current: Vec::new(),
    };

    encoder.current.extend_from_slice(tag.as_str().as_bytes());
    encoder.current.push(b' ');
    encoder.current.extend_from_slice(command.name().as_bytes());
    for arg in command.args() {
        encoder.current.push(b' ');
        encoder.write_argument(arg);
    }

    encoder.finish()
}

struct Encoder<'a> {
    options: &'a EncodeOptions,
    segments: Vec<Segment>,
    current: Vec<u8>,
}

impl Encoder<'_> {
    fn write_argument(&mut self, arg: &Argument) {
        match arg {
            Argument::Atom(s) | Argument::Raw(s) => self.current.extend_from_slice(s.as_bytes()),
            Argument::AString(s) => self.write_astring(s),
            Argument::Quoted(s) => write_quoted(&mut self.current, s.as_bytes()),
            Argument::Literal(data) => self.write_literal(data),
            Argument::List(items) => {
                self.current.push(b'(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.current.push(b' ');
                    }
                    self.write_argument(item);
                }
                self.current.push(b')');
            }
        }
    }

    fn write_astring(&mut self, s: &str) {
        let bytes = s.as_bytes();
        if bytes.len() > self.options.literal_threshold || bytes.iter().any(|&b| needs_literal(b)) {
            self.write_literal(bytes);
        } else if bytes.is_empty() || bytes.iter().any(|&b| needs_quoting(b)) {
            write_quoted(&mut self.current, bytes);
        } else {
            self.current.extend_from_slice(bytes);
        }
    }

    fn write_literal(&mut self, data: &[u8]) {
        if self.options.non_synchronizing {
            self.current
                .extend_from_slice(format!("{{{}+}}\r\n", data.len()).as_bytes());
            self.current.extend_from_slice(data);
        } else {
            self.current
                .extend_from_slice(format!("{{{}}}", data.len()).as_bytes());
            self.segments.push(Segment {
                data: std::mem::take(&mut self.current),
                awaits_continuation: true,
            });
            self.current.extend_from_slice(data);
        }
    }

    fn finish(mut self) -> EncodedCommand {
        self.segments.push(Segment {
            data: self.current,
            awaits_continuation: false,
        });
        EncodedCommand {
            segments: self.segments,
        }
    }
}

fn write_quoted(buf: &mut Vec<u8>, s: &[u8]) {
    buf.push(b'"');
    for &b in s {
        if b == b'"' || b == b'\\' {
            buf.push(b'\\');
        }
        buf.push(b);
    }
    buf.push(b'"');
}

/// Returns true if the byte cannot be carried by a quoted string.
const fn needs_literal(b: u8) -> bool {
    matches!(b, b'\r' | b'\n' | 0) || b >= 0x80
}

/// Returns true if the byte needs quoting.
const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b'[' | b']'
    ) || b < 0x20
        || b == 0x7F
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

    fn encode(command: &Command) -> Vec<u8> {
        encode_command(&Tag::new("A1"), command, &EncodeOptions::default()).to_bytes()
    }

    #[test]
    fn test_capability_command() {
        assert_eq!(encode(&Command::capability()), b"A1 CAPABILITY\r\n");
    }

    #[test]
    fn test_login_command() {
        assert_eq!(
            encode(&Command::login("user", "pass")),
            b"A1 LOGIN user pass\r\n"
        );
    }

    #[test]
    fn test_login_quoted() {
        assert_eq!(
            encode(&Command::login("user@example.com", "pass word\"x")),
            b"A1 LOGIN user@example.com \"pass word\\\"x\"\r\n"
        );
    }

    #[test]
    fn test_empty_string_is_quoted() {
        assert_eq!(encode(&Command::list("", "*")), b"A1 LIST \"\" \"*\"\r\n");
    }

    #[test]
    fn test_select_command() {
        assert_eq!(encode(&Command::select("INBOX")), b"A1 SELECT INBOX\r\n");
        assert_eq!(
            encode(&Command::select("Sent Items")),
            b"A1 SELECT \"Sent Items\"\r\n"
        );
    }

    #[test]
    fn test_status_list() {
        assert_eq!(
            encode(&Command::status("INBOX", ["MESSAGES", "UIDNEXT"])),
            b"A1 STATUS INBOX (MESSAGES UIDNEXT)\r\n"
        );
    }

    #[test]
    fn test_raw_passthrough() {
        assert_eq!(
            encode(&Command::fetch("1:*", "(UID BODY.PEEK[HEADER])")),
            b"A1 FETCH 1:* (UID BODY.PEEK[HEADER])\r\n"
        );
    }

    #[test]
    fn test_synchronizing_literal_splits() {
        let encoded = encode_command(
            &Tag::new("A7"),
            &Command::login("bob", "line1\r\nline2"),
            &EncodeOptions::default(),
        );
        assert_eq!(encoded.segments.len(), 2);
        assert_eq!(encoded.continuations(), 1);
        assert_eq!(encoded.segments[0].data, b"A7 LOGIN bob {12}");
        assert!(encoded.segments[0].awaits_continuation);
        assert_eq!(encoded.segments[1].data, b"line1\r\nline2");
        assert!(!encoded.segments[1].awaits_continuation);
    }

    #[test]
    fn test_literal_in_middle() {
        let encoded = encode_command(
            &Tag::new("A2"),
            &Command::new("X").literal(b"ab".to_vec()).atom("TAIL"),
            &EncodeOptions::default(),
        );
        assert_eq!(encoded.to_bytes(), b"A2 X {2}\r\nab TAIL\r\n");
    }

    #[test]
    fn test_non_synchronizing_literal() {
        let options = EncodeOptions {
            non_synchronizing: true,
            ..EncodeOptions::default()
        };
        let encoded = encode_command(
            &Tag::new("A3"),
            &Command::append("INBOX", &["\\Seen"], b"Hi\r\n".to_vec()),
            &options,
        );
        assert_eq!(encoded.segments.len(), 1);
        assert_eq!(
            encoded.to_bytes(),
            b"A3 APPEND INBOX (\\Seen) {4+}\r\nHi\r\n\r\n"
        );
    }

    #[test]
    fn test_threshold_forces_literal() {
        let options = EncodeOptions {
            literal_threshold: 4,
            non_synchronizing: false,
        };
        let encoded = encode_command(&Tag::new("A1"), &Command::select("Archive"), &options);
        assert_eq!(encoded.segments[0].data, b"A1 SELECT {7}");
        assert_eq!(encoded.segments[1].data, b"Archive");
    }

    #[test]
    fn test_eight_bit_forces_literal() {
        let encoded = encode_command(
            &Tag::new("A1"),
            &Command::select("Entwürfe"),
            &EncodeOptions::default(),
        );
        assert_eq!(encoded.segments[0].data, b"A1 SELECT {9}");
    }
}
