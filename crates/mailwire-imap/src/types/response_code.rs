//! Response codes.

use super::Value;

/// Bracketed response code carried by status responses (`[READ-WRITE]`).
///
/// Codes this crate does not interpret, and known codes whose arguments do
/// not have the expected shape, are kept as [`ResponseCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: Human-readable message that MUST be shown to user.
    Alert,
    /// CAPABILITY: capability list, upper-cased.
    Capability(Vec<String>),
    /// PARSE: Error parsing message.
    Parse,
    /// PERMANENTFLAGS: Flags that can be changed permanently.
    PermanentFlags(Vec<String>),
    /// READ-ONLY: Mailbox selected as read-only.
    ReadOnly,
    /// READ-WRITE: Mailbox selected as read-write.
    ReadWrite,
    /// TRYCREATE: Mailbox doesn't exist, but can be created.
    TryCreate,
    /// UIDNEXT: Next UID to be assigned.
    UidNext(u32),
    /// UIDVALIDITY: Unique identifier validity value.
    UidValidity(u32),
    /// UNSEEN: First unseen message sequence number.
    Unseen(u32),
    /// HIGHESTMODSEQ: Highest mod-sequence value (CONDSTORE).
    HighestModSeq(u64),
    /// NOMODSEQ: Server doesn't support mod-sequences for this mailbox.
    NoModSeq,
    /// Any other code, with its raw arguments.
    Other {
        /// Code name as sent.
        name: String,
        /// Arguments following the name.
        values: Vec<Value>,
    },
}

impl ResponseCode {
    /// Builds a response code from its name and decoded arguments.
    #[must_use]
    pub fn from_parts(name: &str, values: Vec<Value>) -> Self {
        let upper = name.to_ascii_uppercase();
        let number = match values.as_slice() {
            [Value::Number(n)] => Some(*n),
            _ => None,
        };
        let small = number.and_then(|n| u32::try_from(n).ok());

        match (upper.as_str(), values.is_empty()) {
            ("ALERT", true) => return Self::Alert,
            ("PARSE", true) => return Self::Parse,
            ("READ-ONLY", true) => return Self::ReadOnly,
            ("READ-WRITE", true) => return Self::ReadWrite,
            ("TRYCREATE", true) => return Self::TryCreate,
            ("NOMODSEQ", true) => return Self::NoModSeq,
            _ => {}
        }

        match (upper.as_str(), number, small) {
            ("UIDNEXT", _, Some(n)) => return Self::UidNext(n),
            ("UIDVALIDITY", _, Some(n)) => return Self::UidValidity(n),
            ("UNSEEN", _, Some(n)) => return Self::Unseen(n),
            ("HIGHESTMODSEQ", Some(n), _) => return Self::HighestModSeq(n),
            _ => {}
        }

        if upper == "CAPABILITY" && values.iter().all(|v| matches!(v, Value::Atom(_))) {
            return Self::Capability(
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_ascii_uppercase)
                    .collect(),
            );
        }

        if let (true, [Value::List(flags)]) = (upper == "PERMANENTFLAGS", values.as_slice()) {
            return Self::PermanentFlags(
                flags
                    .iter()
                    .filter_map(Value::as_str)
                    .map(ToString::to_string)
                    .collect(),
            );
        }

        Self::Other {
            name: name.to_string(),
            values,
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

    fn atom(s: &str) -> Value {
        Value::Atom(s.to_string())
    }

    #[test]
    fn simple_codes() {
        assert_eq!(ResponseCode::from_parts("alert", vec![]), ResponseCode::Alert);
        assert_eq!(
            ResponseCode::from_parts("READ-WRITE", vec![]),
            ResponseCode::ReadWrite
        );
        assert_eq!(
            ResponseCode::from_parts("read-only", vec![]),
            ResponseCode::ReadOnly
        );
    }

    #[test]
    fn numeric_codes() {
        assert_eq!(
            ResponseCode::from_parts("UIDVALIDITY", vec![Value::Number(3857529045)]),
            ResponseCode::UidValidity(3857529045)
        );
        assert_eq!(
            ResponseCode::from_parts("UIDNEXT", vec![Value::Number(4392)]),
            ResponseCode::UidNext(4392)
        );
        assert_eq!(
            ResponseCode::from_parts("HIGHESTMODSEQ", vec![Value::Number(715194045007)]),
            ResponseCode::HighestModSeq(715194045007)
        );
    }

    #[test]
    fn capability_code_is_uppercased() {
        assert_eq!(
            ResponseCode::from_parts("CAPABILITY", vec![atom("IMAP4rev1"), atom("literal+")]),
            ResponseCode::Capability(vec!["IMAP4REV1".to_string(), "LITERAL+".to_string()])
        );
    }

    #[test]
    fn permanent_flags() {
        let code = ResponseCode::from_parts(
            "PERMANENTFLAGS",
            vec![Value::List(vec![atom("\\Deleted"), atom("\\*")])],
        );
        assert_eq!(
            code,
            ResponseCode::PermanentFlags(vec!["\\Deleted".to_string(), "\\*".to_string()])
        );
    }

    #[test]
    fn unknown_or_malformed_codes_are_kept() {
        assert_eq!(
            ResponseCode::from_parts("APPENDUID", vec![Value::Number(38505), Value::Number(3955)]),
            ResponseCode::Other {
                name: "APPENDUID".to_string(),
                values: vec![Value::Number(38505), Value::Number(3955)],
            }
        );
        assert!(matches!(
            ResponseCode::from_parts("UIDNEXT", vec![atom("soon")]),
            ResponseCode::Other { .. }
        ));
    }
}
