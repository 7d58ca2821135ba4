//! Generic token tree for response data.

/// A decoded piece of server data.
///
/// Untagged data (`* 3 FETCH (...)`, `* LIST (...) "/" INBOX`) and response
/// code arguments are kept in this shape; interpreting them beyond what the
/// session needs is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Unquoted atom, including flags such as `\Seen`.
    Atom(String),
    /// Non-negative number.
    Number(u64),
    /// Quoted string, unescaped.
    Quoted(String),
    /// Length-prefixed literal bytes.
    Literal(Vec<u8>),
    /// `NIL`.
    Nil,
    /// Parenthesized list.
    List(Vec<Value>),
    /// Bracketed group, e.g. the section in `BODY[HEADER]`.
    Section(Vec<Value>),
}

impl Value {
    /// Returns the textual content of an atom, quoted string or UTF-8 literal.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Atom(s) | Self::Quoted(s) => Some(s),
            Self::Literal(data) => std::str::from_utf8(data).ok(),
            _ => None,
        }
    }

    /// Returns the raw bytes of a string-like value.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Atom(s) | Self::Quoted(s) => Some(s.as_bytes()),
            Self::Literal(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the number, if this is one.
    #[must_use]
    pub const fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the items of a list or section.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) | Self::Section(items) => Some(items),
            _ => None,
        }
    }

    /// Returns `true` for `NIL`.
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Returns `true` if this is an atom equal to `name`, ignoring case.
    #[must_use]
    pub fn is_atom(&self, name: &str) -> bool {
        matches!(self, Self::Atom(s) if s.eq_ignore_ascii_case(name))
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

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Atom("INBOX".to_string()).as_str(), Some("INBOX"));
        assert_eq!(Value::Literal(b"hi".to_vec()).as_str(), Some("hi"));
        assert_eq!(Value::Literal(vec![0xff]).as_str(), None);
        assert_eq!(Value::Literal(vec![0xff]).as_bytes(), Some(&[0xff][..]));
        assert_eq!(Value::Number(7).as_number(), Some(7));
        assert!(Value::Nil.is_nil());
        assert!(Value::Atom("uid".to_string()).is_atom("UID"));
        assert_eq!(
            Value::List(vec![Value::Nil]).as_list(),
            Some(&[Value::Nil][..])
        );
    }
}
