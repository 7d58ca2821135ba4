//! Completion status and untagged conditions.

/// Status of a tagged completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error, e.g. login rejected).
    No,
    /// Command rejected as a protocol or syntax error.
    Bad,
}

impl Status {
    /// Parses a completion keyword, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("OK") {
            Some(Self::Ok)
        } else if s.eq_ignore_ascii_case("NO") {
            Some(Self::No)
        } else if s.eq_ignore_ascii_case("BAD") {
            Some(Self::Bad)
        } else {
            None
        }
    }

    /// Returns true if this is a successful status.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns the wire keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition carried by an untagged status response (`* OK`, `* BYE`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    /// Informational.
    Ok,
    /// Warning.
    No,
    /// Protocol-level error not tied to a command.
    Bad,
    /// Greeting: the connection is already authenticated.
    PreAuth,
    /// Server is closing the connection.
    Bye,
}

impl Condition {
    /// Parses a condition keyword, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "PREAUTH" => Some(Self::PreAuth),
            "BYE" => Some(Self::Bye),
            _ => None,
        }
    }

    /// Returns the wire keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
            Self::PreAuth => "PREAUTH",
            Self::Bye => "BYE",
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

    #[test]
    fn test_status_parse() {
        assert_eq!(Status::parse("ok"), Some(Status::Ok));
        assert_eq!(Status::parse("NO"), Some(Status::No));
        assert_eq!(Status::parse("Bad"), Some(Status::Bad));
        assert_eq!(Status::parse("PREAUTH"), None);
        assert_eq!(Status::parse("DONE"), None);
    }

    #[test]
    fn test_condition_parse() {
        assert_eq!(Condition::parse("bye"), Some(Condition::Bye));
        assert_eq!(Condition::parse("PREAUTH"), Some(Condition::PreAuth));
        assert_eq!(Condition::parse("EXISTS"), None);
    }
}
