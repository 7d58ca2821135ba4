//! IMAP response parser.
//!
//! Classifies a framed response as untagged, continuation or tagged, then
//! decodes its payload into [`Value`](crate::types::Value) trees.

#![allow(clippy::missing_errors_doc)]

mod helpers;
mod types;

pub use types::{ResponseLine, TaggedCompletion, UntaggedResponse};

use crate::parser::frame::Frame;
use crate::parser::lexer::{Lexer, Token};
use crate::types::{Condition, Status, Tag};
use crate::{Error, Result};

use helpers::{parse_resp_text, parse_values_to_end};

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses complete wire bytes holding exactly one response.
    ///
    /// Literals are honored, so the input may span several CRLF-terminated
    /// lines.
    pub fn parse(input: &[u8]) -> Result<ResponseLine> {
        match Frame::split(input, usize::MAX)? {
            Some((frame, used)) if used == input.len() => Self::parse_frame(&frame),
            Some((_, used)) => Err(Error::parse(used, "Trailing data after response")),
            None => Err(Error::parse(input.len(), "Incomplete response")),
        }
    }

    /// Parses a single line without literals. A trailing CRLF is optional.
    pub fn parse_line(line: &[u8]) -> Result<ResponseLine> {
        let line = line.strip_suffix(b"\r\n").unwrap_or(line);
        Self::parse_frame(&Frame::from_line(line))
    }

    /// Parses a framed response.
    pub fn parse_frame(frame: &Frame) -> Result<ResponseLine> {
        let mut lexer = Lexer::new(frame);

        match lexer.peek() {
            None => Err(Error::parse(0, "Empty response line")),
            Some(b'*') => {
                lexer.advance();
                lexer.expect_space()?;
                Self::parse_untagged(&mut lexer).map(ResponseLine::Untagged)
            }
            Some(b'+') => {
                lexer.advance();
                if lexer.peek() == Some(b' ') {
                    lexer.advance();
                }
                Ok(ResponseLine::Continuation {
                    text: lexer.rest_of_line(),
                })
            }
            Some(_) => Self::parse_tagged(&mut lexer).map(ResponseLine::Tagged),
        }
    }

    /// Parses a tagged completion.
    fn parse_tagged(lexer: &mut Lexer<'_>) -> Result<TaggedCompletion> {
        let tag = Tag::new(lexer.read_tag()?);
        lexer.expect_space()?;

        let keyword = lexer.read_atom_string()?;
        let status = Status::parse(keyword)
            .ok_or_else(|| lexer.error(&format!("Unknown completion status: {keyword}")))?;

        let (code, text) = parse_resp_text(lexer)?;

        Ok(TaggedCompletion {
            tag,
            status,
            code,
            text,
        })
    }

    /// Parses the part of an untagged response after `* `.
    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<UntaggedResponse> {
        match lexer.next_token()? {
            Token::Atom(word) => {
                if let Some(condition) = Condition::parse(word) {
                    let (code, text) = parse_resp_text(lexer)?;
                    return Ok(UntaggedResponse::Condition {
                        condition,
                        code,
                        text,
                    });
                }
                Ok(UntaggedResponse::Data {
                    number: None,
                    keyword: word.to_string(),
                    values: parse_values_to_end(lexer)?,
                })
            }
            Token::Number(n) => {
                let number = u32::try_from(n)
                    .map_err(|_| lexer.error(&format!("Message number out of range: {n}")))?;
                lexer.expect_space()?;
                let keyword = lexer.read_atom_string()?.to_string();
                Ok(UntaggedResponse::Data {
                    number: Some(number),
                    keyword,
                    values: parse_values_to_end(lexer)?,
                })
            }
            token => Err(lexer.error(&format!(
                "Unexpected token in untagged response: {token:?}"
            ))),
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
    use crate::types::{ResponseCode, Value};

    fn atom(s: &str) -> Value {
        Value::Atom(s.to_string())
    }

    #[test]
    fn test_parse_ok_response() {
        let response = ResponseParser::parse(b"* OK IMAP4rev2 server ready\r\n").unwrap();
        match response {
            ResponseLine::Untagged(UntaggedResponse::Condition {
                condition: Condition::Ok,
                code: None,
                text,
            }) => assert_eq!(text, "IMAP4rev2 server ready"),
            other => panic!("Expected untagged OK, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_tagged_ok() {
        let response = ResponseParser::parse_line(b"A001 OK [READ-WRITE] SELECT completed").unwrap();
        let ResponseLine::Tagged(completion) = response else {
            panic!("Expected tagged response");
        };
        assert_eq!(completion.tag, "A001");
        assert_eq!(completion.status, Status::Ok);
        assert_eq!(completion.code, Some(ResponseCode::ReadWrite));
        assert_eq!(completion.text, "SELECT completed");
    }

    #[test]
    fn test_parse_tagged_no_text() {
        let response = ResponseParser::parse_line(b"A2 no").unwrap();
        let ResponseLine::Tagged(completion) = response else {
            panic!("Expected tagged response");
        };
        assert_eq!(completion.status, Status::No);
        assert_eq!(completion.text, "");
    }

    #[test]
    fn test_unknown_completion_status() {
        let err = ResponseParser::parse_line(b"A1 MAYBE later").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_parse_capability() {
        let response = ResponseParser::parse_line(b"* CAPABILITY IMAP4rev1 LITERAL+ AUTH=PLAIN").unwrap();
        assert_eq!(
            response,
            ResponseLine::Untagged(UntaggedResponse::Data {
                number: None,
                keyword: "CAPABILITY".to_string(),
                values: vec![atom("IMAP4rev1"), atom("LITERAL+"), atom("AUTH=PLAIN")],
            })
        );
    }

    #[test]
    fn test_parse_exists() {
        let response = ResponseParser::parse_line(b"* 23 EXISTS").unwrap();
        assert_eq!(
            response,
            ResponseLine::Untagged(UntaggedResponse::Data {
                number: Some(23),
                keyword: "EXISTS".to_string(),
                values: vec![],
            })
        );
    }

    #[test]
    fn test_parse_list() {
        let response = ResponseParser::parse_line(b"* LIST (\\HasNoChildren) \"/\" INBOX").unwrap();
        let ResponseLine::Untagged(UntaggedResponse::Data { values, .. }) = response else {
            panic!("Expected data");
        };
        assert_eq!(
            values,
            vec![
                Value::List(vec![atom("\\HasNoChildren")]),
                Value::Quoted("/".to_string()),
                atom("INBOX"),
            ]
        );
    }

    #[test]
    fn test_parse_continuation() {
        assert_eq!(
            ResponseParser::parse_line(b"+ Ready for literal").unwrap(),
            ResponseLine::Continuation {
                text: "Ready for literal".to_string()
            }
        );
        assert_eq!(
            ResponseParser::parse_line(b"+").unwrap(),
            ResponseLine::Continuation {
                text: String::new()
            }
        );
    }

    #[test]
    fn test_parse_response_code_with_arguments() {
        let response = ResponseParser::parse_line(
            b"* OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)] Limited",
        )
        .unwrap();
        let ResponseLine::Untagged(untagged) = response else {
            panic!("Expected untagged");
        };
        assert_eq!(
            untagged.code(),
            Some(&ResponseCode::PermanentFlags(vec![
                "\\Deleted".to_string(),
                "\\Seen".to_string(),
                "\\*".to_string(),
            ]))
        );
    }

    #[test]
    fn test_unknown_response_code_is_kept() {
        let response = ResponseParser::parse_line(b"A3 OK [APPENDUID 38505 3955] done").unwrap();
        let ResponseLine::Tagged(completion) = response else {
            panic!("Expected tagged");
        };
        assert_eq!(
            completion.code,
            Some(ResponseCode::Other {
                name: "APPENDUID".to_string(),
                values: vec![Value::Number(38505), Value::Number(3955)],
            })
        );
    }

    #[test]
    fn test_parse_fetch_with_literal() {
        let input = b"* 12 FETCH (UID 7 BODY[HEADER] {11}\r\nSubject: x\n)\r\n";
        let response = ResponseParser::parse(input).unwrap();
        let ResponseLine::Untagged(UntaggedResponse::Data {
            number,
            keyword,
            values,
        }) = response
        else {
            panic!("Expected data");
        };
        assert_eq!(number, Some(12));
        assert_eq!(keyword, "FETCH");
        assert_eq!(
            values,
            vec![Value::List(vec![
                atom("UID"),
                Value::Number(7),
                atom("BODY"),
                Value::Section(vec![atom("HEADER")]),
                Value::Literal(b"Subject: x\n".to_vec()),
            ])]
        );
    }

    #[test]
    fn test_literal_containing_tag_like_text() {
        let input = b"* 1 FETCH (BODY[] {16}\r\nA1 OK not done\r\n)\r\n";
        let response = ResponseParser::parse(input).unwrap();
        let ResponseLine::Untagged(untagged) = response else {
            panic!("Expected untagged");
        };
        assert!(untagged.is("fetch"));
    }

    #[test]
    fn test_unbalanced_lists() {
        assert!(ResponseParser::parse_line(b"* 1 FETCH (UID 1").is_err());
        assert!(ResponseParser::parse_line(b"* 1 FETCH UID 1)").is_err());
        assert!(ResponseParser::parse_line(b"* OK [ALERT").is_err());
    }

    #[test]
    fn test_empty_and_incomplete() {
        assert!(ResponseParser::parse_line(b"").is_err());
        assert!(ResponseParser::parse(b"* OK no crlf").is_err());
        assert!(ResponseParser::parse(b"* OK one\r\n* OK two\r\n").is_err());
    }

    #[test]
    fn test_bye() {
        let response = ResponseParser::parse_line(b"* BYE Logging out").unwrap();
        let ResponseLine::Untagged(untagged) = response else {
            panic!("Expected untagged");
        };
        assert!(untagged.is_bye());
        assert_eq!(untagged.keyword(), "BYE");
    }
}
