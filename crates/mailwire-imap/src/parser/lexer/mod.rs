//! IMAP lexer for tokenizing server responses.
//!
//! The lexer walks the text lines of a [`Frame`]. When a line ends in a
//! literal marker, the marker is replaced by the literal payload stored in
//! the frame and lexing resumes at the start of the next line, so literal
//! bytes are never scanned for delimiters.

#![allow(clippy::missing_errors_doc)]

mod token;

pub use token::Token;

use super::frame::Frame;
use crate::{Error, Result};

/// IMAP lexer state.
pub struct Lexer<'a> {
    frame: &'a Frame,
    line: usize,
    pos: usize,
    /// Wire bytes of the frame that precede the current line.
    offset: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer over a framed response.
    #[must_use]
    pub const fn new(frame: &'a Frame) -> Self {
        Self {
            frame,
            line: 0,
            pos: 0,
            offset: 0,
        }
    }

    fn current(&self) -> &'a [u8] {
        let frame: &'a Frame = self.frame;
        frame.lines().get(self.line).map_or(&[], Vec::as_slice)
    }

    /// Returns the current position within the wire bytes of the frame.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.offset + self.pos
    }

    /// Returns true if the whole response has been consumed.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.peek().is_none()
    }

    /// Peeks at the current byte without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.current().get(self.pos).copied()
    }

    /// Advances by one byte and returns it.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        match byte {
            b' ' => {
                self.advance();
                Ok(Token::Space)
            }
            b'(' => {
                self.advance();
                Ok(Token::LParen)
            }
            b')' => {
                self.advance();
                Ok(Token::RParen)
            }
            b'[' => {
                self.advance();
                Ok(Token::LBracket)
            }
            b']' => {
                self.advance();
                Ok(Token::RBracket)
            }
            b'"' => self.read_quoted_string(),
            b'{' => self.read_literal(),
            b'0'..=b'9' => self.read_number_or_atom(),
            _ if is_atom_char(byte) => self.read_atom(),
            _ => Err(self.error(&format!("Unexpected character: {byte:#04x}"))),
        }
    }

    /// Reads a quoted string token.
    fn read_quoted_string(&mut self) -> Result<Token<'a>> {
        self.advance();

        let mut result = Vec::new();

        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(c @ (b'"' | b'\\')) => result.push(c),
                    Some(c) => {
                        return Err(self.error(&format!("Invalid escape: \\{}", char::from(c))));
                    }
                    None => return Err(self.error("Unexpected end of line in quoted string")),
                },
                Some(c) => result.push(c),
                None => return Err(self.error("Unexpected end of line in quoted string")),
            }
        }

        Ok(Token::QuotedString(
            String::from_utf8_lossy(&result).into_owned(),
        ))
    }

    /// Reads a literal marker and yields the payload that followed it.
    fn read_literal(&mut self) -> Result<Token<'a>> {
        self.advance();

        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.advance();
        }
        let digits = &self.current()[start..self.pos];
        if self.peek() == Some(b'+') {
            self.advance();
        }
        if self.advance() != Some(b'}') {
            return Err(self.error("Invalid literal marker"));
        }
        if !self.is_eof() {
            return Err(self.error("Literal marker must end the line"));
        }

        let size: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("Invalid literal size"))?;

        let frame: &'a Frame = self.frame;
        let data = frame
            .literals()
            .get(self.line)
            .ok_or_else(|| self.error("Missing literal data"))?;
        if data.len() != size {
            return Err(self.error(&format!(
                "Literal length mismatch: announced {size}, got {}",
                data.len()
            )));
        }

        self.offset += self.current().len() + 2 + data.len();
        self.line += 1;
        self.pos = 0;

        Ok(Token::Literal(data))
    }

    /// Reads a number or atom starting with a digit.
    fn read_number_or_atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;
        let mut all_digits = true;

        while let Some(b) = self.peek() {
            if !is_atom_char(b) {
                break;
            }
            all_digits &= b.is_ascii_digit();
            self.advance();
        }

        let s = std::str::from_utf8(&self.current()[start..self.pos])
            .map_err(|_| self.error("Invalid UTF-8 in atom"))?;

        if all_digits {
            let n: u64 = s.parse().map_err(|_| self.error("Number too large"))?;
            Ok(Token::Number(n))
        } else {
            Ok(Token::Atom(s))
        }
    }

    /// Reads an atom token.
    fn read_atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;

        while self.peek().is_some_and(is_atom_char) {
            self.advance();
        }

        let s = std::str::from_utf8(&self.current()[start..self.pos])
            .map_err(|_| self.error("Invalid UTF-8 in atom"))?;

        if s.eq_ignore_ascii_case("NIL") {
            Ok(Token::Nil)
        } else {
            Ok(Token::Atom(s))
        }
    }

    /// Reads a tag: every byte up to the next space.
    pub fn read_tag(&mut self) -> Result<&'a str> {
        let start = self.pos;
        while self.peek().is_some_and(|b| is_atom_char(b) && b != b'+') {
            self.advance();
        }
        if self.pos == start {
            return Err(self.error("Missing tag"));
        }
        std::str::from_utf8(&self.current()[start..self.pos])
            .map_err(|_| self.error("Invalid UTF-8 in tag"))
    }

    /// Consumes and returns the rest of the current line as text.
    pub fn rest_of_line(&mut self) -> String {
        let line = self.current();
        let rest = line.get(self.pos..).unwrap_or_default();
        self.pos = line.len();
        String::from_utf8_lossy(rest).into_owned()
    }

    /// Creates a parse error at the current position.
    pub fn error(&self, message: &str) -> Error {
        Error::parse(self.position(), message)
    }

    /// Expects and consumes a space.
    pub fn expect_space(&mut self) -> Result<()> {
        match self.next_token()? {
            Token::Space => Ok(()),
            token => Err(self.error(&format!("Expected space, got {token:?}"))),
        }
    }

    /// Reads an atom.
    pub fn read_atom_string(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s),
            token => Err(self.error(&format!("Expected atom, got {token:?}"))),
        }
    }

    /// Skips optional spaces.
    pub fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.advance();
        }
    }
}

/// Returns true if the byte may appear in an atom.
///
/// This is looser than the formal grammar: `\` is accepted so that flags
/// such as `\Seen` lex as one token, `%` and `*` so that list patterns and
/// `\*` do, and 8-bit bytes so that servers sending raw UTF-8 still parse.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    !matches!(b, b'(' | b')' | b'{' | b' ' | b'"' | b'[' | b']') && b > 0x1F && b != 0x7F
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

    fn tokens(frame: &Frame) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(frame);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token == Token::Eof {
                return out;
            }
            out.push(token);
        }
    }

    #[test]
    fn test_simple_tokens() {
        let frame = Frame::from_line(b"3 EXISTS (\\Seen \\*) NIL".to_vec());
        assert_eq!(
            tokens(&frame),
            vec![
                Token::Number(3),
                Token::Space,
                Token::Atom("EXISTS"),
                Token::Space,
                Token::LParen,
                Token::Atom("\\Seen"),
                Token::Space,
                Token::Atom("\\*"),
                Token::RParen,
                Token::Space,
                Token::Nil,
            ]
        );
    }

    #[test]
    fn test_quoted_string_escapes() {
        let frame = Frame::from_line(br#""a \"b\" \\c""#.to_vec());
        assert_eq!(
            tokens(&frame),
            vec![Token::QuotedString(r#"a "b" \c"#.to_string())]
        );
    }

    #[test]
    fn test_unterminated_quote() {
        let frame = Frame::from_line(b"\"open".to_vec());
        let mut lexer = Lexer::new(&frame);
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn test_number_and_atom_mix() {
        let frame = Frame::from_line(b"12 12ab 18446744073709551615".to_vec());
        assert_eq!(
            tokens(&frame),
            vec![
                Token::Number(12),
                Token::Space,
                Token::Atom("12ab"),
                Token::Space,
                Token::Number(u64::MAX),
            ]
        );

        let frame = Frame::from_line(b"18446744073709551616".to_vec());
        assert!(Lexer::new(&frame).next_token().is_err());
    }

    #[test]
    fn test_literal_spans_lines() {
        let mut frame = Frame::new();
        frame.push_line(b"(BODY {5}".to_vec());
        frame.push_literal(b"a)\r\nb".to_vec());
        frame.push_line(b" X)".to_vec());

        assert_eq!(
            tokens(&frame),
            vec![
                Token::LParen,
                Token::Atom("BODY"),
                Token::Space,
                Token::Literal(b"a)\r\nb"),
                Token::Space,
                Token::Atom("X"),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_literal_length_mismatch() {
        let mut frame = Frame::new();
        frame.push_line(b"{4}".to_vec());
        frame.push_literal(b"abc".to_vec());
        frame.push_line(Vec::new());
        let err = Lexer::new(&frame).next_token().unwrap_err();
        assert!(err.to_string().contains("mismatch"));
    }

    #[test]
    fn test_literal_without_data() {
        let frame = Frame::from_line(b"{4}".to_vec());
        assert!(Lexer::new(&frame).next_token().is_err());
    }

    #[test]
    fn test_rest_of_line_and_tag() {
        let frame = Frame::from_line(b"A1 OK done [really]".to_vec());
        let mut lexer = Lexer::new(&frame);
        assert_eq!(lexer.read_tag().unwrap(), "A1");
        lexer.expect_space().unwrap();
        assert_eq!(lexer.read_atom_string().unwrap(), "OK");
        lexer.skip_spaces();
        assert_eq!(lexer.rest_of_line(), "done [really]");
        assert!(lexer.is_eof());
    }

    #[test]
    fn test_atom_chars() {
        assert!(is_atom_char(b'A'));
        assert!(is_atom_char(b'\\'));
        assert!(is_atom_char(b'*'));
        assert!(is_atom_char(b'%'));
        assert!(is_atom_char(b'+'));
        assert!(!is_atom_char(b'('));
        assert!(!is_atom_char(b']'));
        assert!(!is_atom_char(b'"'));
        assert!(!is_atom_char(b' '));
        assert!(!is_atom_char(b'\r'));
    }
}
