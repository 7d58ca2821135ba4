//! IMAP command tag generator.
//!
//! Tags are used to match commands with their responses.

use crate::types::Tag;

/// Tag generator for IMAP commands.
///
/// Generates tags `{prefix}{n}` with `n` counting up from 1: "A1", "A2", ...
/// A generator belongs to one connection and is never reset, so a tag is
/// never reused even when the command it was issued for failed. Once the
/// counter reaches `u64::MAX` the generator yields nothing.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    counter: u64,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { counter: 0, prefix }
    }

    /// Returns the number of tags issued so far.
    #[must_use]
    pub const fn current(&self) -> u64 {
        self.counter
    }
}

impl Iterator for TagGenerator {
    type Item = Tag;

    fn next(&mut self) -> Option<Tag> {
        self.counter = self.counter.checked_add(1)?;
        Some(Tag::new(format!("{}{}", self.prefix, self.counter)))
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
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
    use proptest::prelude::*;

    #[test]
    fn test_tag_generation() {
        let mut generator = TagGenerator::default();
        assert_eq!(generator.next().unwrap(), "A1");
        assert_eq!(generator.next().unwrap(), "A2");
        assert_eq!(generator.next().unwrap(), "A3");
    }

    #[test]
    fn test_custom_prefix() {
        let mut generator = TagGenerator::new('T');
        assert_eq!(generator.next().unwrap(), "T1");
        assert_eq!(generator.next().unwrap(), "T2");
    }

    #[test]
    fn test_current() {
        let mut generator = TagGenerator::default();
        assert_eq!(generator.current(), 0);
        let _ = generator.next();
        assert_eq!(generator.current(), 1);
    }

    #[test]
    fn test_exhausted_counter_yields_nothing() {
        let mut generator = TagGenerator {
            counter: u64::MAX - 1,
            prefix: 'A',
        };
        assert_eq!(generator.next().unwrap(), format!("A{}", u64::MAX).as_str());
        assert!(generator.next().is_none());
        assert!(generator.next().is_none());
        assert_eq!(generator.current(), u64::MAX);
    }

    #[test]
    fn test_uniqueness() {
        let mut generator = TagGenerator::default();
        let mut seen = std::collections::HashSet::new();

        for _ in 0..10000 {
            let tag = generator.next().unwrap();
            assert!(seen.insert(tag), "duplicate tag generated");
        }
    }

    proptest! {
        #[test]
        fn tags_strictly_increase(count in 1usize..500) {
            let mut generator = TagGenerator::new('Z');
            let mut last = 0u64;
            for _ in 0..count {
                let tag = generator.next().unwrap();
                let n: u64 = tag.as_str()[1..].parse().unwrap();
                prop_assert!(n > last);
                last = n;
            }
        }
    }
}
