//! Command tags.

/// IMAP command tag.
///
/// Each command sent by the client carries a unique tag, and the server's
/// completion line repeats it so the response can be matched to its request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(String);

impl Tag {
    /// Creates a new tag from a string.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if `line` starts with this tag followed by a space.
    #[must_use]
    pub fn prefixes(&self, line: &[u8]) -> bool {
        line.strip_prefix(self.0.as_bytes())
            .is_some_and(|rest| rest.first() == Some(&b' '))
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Tag {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Tag {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
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
    fn new_from_string() {
        let tag = Tag::new("A001".to_string());
        assert_eq!(tag.as_str(), "A001");
    }

    #[test]
    fn display() {
        let tag = Tag::new("CMD123");
        assert_eq!(format!("{tag}"), "CMD123");
    }

    #[test]
    fn equality() {
        assert_eq!(Tag::new("A1"), Tag::new("A1"));
        assert_ne!(Tag::new("A1"), Tag::new("A2"));
        assert_eq!(Tag::new("A1"), "A1");
    }

    #[test]
    fn prefixes_requires_space() {
        let tag = Tag::new("A1");
        assert!(tag.prefixes(b"A1 OK done"));
        assert!(!tag.prefixes(b"A10 OK done"));
        assert!(!tag.prefixes(b"A1"));
        assert!(!tag.prefixes(b"* OK A1"));
    }
}
