//! Parser helper functions.

use crate::parser::lexer::{Lexer, Token};
use crate::types::{ResponseCode, Value};
use crate::Result;

/// Parses one value at the current position.
pub fn parse_value(lexer: &mut Lexer<'_>) -> Result<Value> {
    match lexer.next_token()? {
        Token::Atom(s) => Ok(Value::Atom(s.to_string())),
        Token::Number(n) => Ok(Value::Number(n)),
        Token::QuotedString(s) => Ok(Value::Quoted(s)),
        Token::Literal(data) => Ok(Value::Literal(data.to_vec())),
        Token::Nil => Ok(Value::Nil),
        Token::LParen => parse_sequence(lexer, b')').map(Value::List),
        Token::LBracket => parse_sequence(lexer, b']').map(Value::Section),
        Token::RParen => Err(lexer.error("Unbalanced list: unexpected ')'")),
        Token::RBracket => Err(lexer.error("Unbalanced section: unexpected ']'")),
        Token::Space => Err(lexer.error("Unexpected space")),
        Token::Eof => Err(lexer.error("Unexpected end of response")),
    }
}

/// Parses values up to and including the `closing` delimiter.
///
/// The opening delimiter must already be consumed.
pub fn parse_sequence(lexer: &mut Lexer<'_>, closing: u8) -> Result<Vec<Value>> {
    let mut values = Vec::new();
    loop {
        lexer.skip_spaces();
        match lexer.peek() {
            None => return Err(lexer.error("Unterminated list")),
            Some(b) if b == closing => {
                lexer.advance();
                return Ok(values);
            }
            Some(_) => values.push(parse_value(lexer)?),
        }
    }
}

/// Parses space-separated values to the end of the response.
pub fn parse_values_to_end(lexer: &mut Lexer<'_>) -> Result<Vec<Value>> {
    let mut values = Vec::new();
    loop {
        lexer.skip_spaces();
        if lexer.is_eof() {
            return Ok(values);
        }
        values.push(parse_value(lexer)?);
    }
}

/// Parses `[CODE args] text` (both parts optional).
pub fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
    lexer.skip_spaces();

    let code = if lexer.peek() == Some(b'[') {
        lexer.advance();
        let name = lexer.read_atom_string()?;
        let values = match lexer.peek() {
            Some(b']') => {
                lexer.advance();
                Vec::new()
            }
            Some(b' ') => parse_sequence(lexer, b']')?,
            _ => return Err(lexer.error("Unterminated response code")),
        };
        lexer.skip_spaces();
        Some(ResponseCode::from_parts(name, values))
    } else {
        None
    };

    Ok((code, lexer.rest_of_line()))
}
