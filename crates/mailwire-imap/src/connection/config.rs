//! Connection configuration types.

use std::time::Duration;

use crate::parser::lexer::is_atom_char;
use crate::{Error, Result};

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 143). **Not recommended for production.**
    None,
    /// TLS from the start (port 993). **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 143,
            Self::Implicit => 993,
        }
    }
}

/// IMAP connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Time allowed for TCP connect, TLS handshake and greeting.
    pub connect_timeout: Duration,
    /// Time allowed for each read; `None` waits forever.
    pub read_timeout: Option<Duration>,
    /// Strings longer than this are sent as literals.
    pub literal_threshold: usize,
    /// Largest literal accepted from the server.
    pub max_literal_size: usize,
    /// Longest response line accepted from the server.
    pub max_line_length: usize,
    /// First character of every command tag.
    pub tag_prefix: char,
}

impl Config {
    /// Creates a new configuration with implicit TLS on port 993.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }

    /// Returns `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Checks settings that would make the session unusable.
    ///
    /// The tag prefix must be an ASCII atom character other than `*`, `+`,
    /// `%` and `\`; otherwise completions could not be told apart from
    /// untagged data and continuation requests.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending setting.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_tag_prefix(self.tag_prefix) {
            return Err(Error::Config(format!(
                "tag prefix {:?} is not usable in a tag",
                self.tag_prefix
            )));
        }
        Ok(())
    }
}

fn is_valid_tag_prefix(prefix: char) -> bool {
    u8::try_from(prefix).is_ok_and(|b| {
        b.is_ascii() && is_atom_char(b) && !matches!(b, b'*' | b'+' | b'%' | b'\\')
    })
}

/// Builder for connection configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    connect_timeout: Duration,
    read_timeout: Option<Duration>,
    literal_threshold: usize,
    max_literal_size: usize,
    max_line_length: usize,
    tag_prefix: char,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::Implicit,
            connect_timeout: Duration::from_secs(30),
            read_timeout: Some(Duration::from_secs(60)),
            literal_threshold: 1024,
            max_literal_size: 100 * 1024 * 1024,
            max_line_length: 1024 * 1024,
            tag_prefix: 'A',
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the read timeout; `None` disables it.
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the length above which strings are sent as literals.
    #[must_use]
    pub const fn literal_threshold(mut self, bytes: usize) -> Self {
        self.literal_threshold = bytes;
        self
    }

    /// Sets the largest literal accepted from the server.
    #[must_use]
    pub const fn max_literal_size(mut self, bytes: usize) -> Self {
        self.max_literal_size = bytes;
        self
    }

    /// Sets the longest response line accepted from the server.
    #[must_use]
    pub const fn max_line_length(mut self, bytes: usize) -> Self {
        self.max_line_length = bytes;
        self
    }

    /// Sets the tag prefix. See [`Config::validate`] for the characters
    /// that are accepted.
    #[must_use]
    pub const fn tag_prefix(mut self, prefix: char) -> Self {
        self.tag_prefix = prefix;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            literal_threshold: self.literal_threshold,
            max_literal_size: self.max_literal_size,
            max_line_length: self.max_line_length,
            tag_prefix: self.tag_prefix,
        }
    }
}

/// Login credentials. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name.
    pub username: String,
    /// Password or token.
    pub secret: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
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
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 143);
        assert_eq!(Security::Implicit.default_port(), 993);
    }

    #[test]
    fn test_config_new() {
        let config = Config::new("imap.example.com");
        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.security, Security::Implicit);
        assert_eq!(config.read_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.tag_prefix, 'A');
        assert_eq!(config.address(), "imap.example.com:993");
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder("imap.example.com")
            .security(Security::None)
            .connect_timeout(Duration::from_secs(10))
            .read_timeout(None)
            .literal_threshold(64)
            .max_literal_size(4096)
            .tag_prefix('T')
            .build();

        assert_eq!(config.port, 143);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.read_timeout, None);
        assert_eq!(config.literal_threshold, 64);
        assert_eq!(config.max_literal_size, 4096);
        assert_eq!(config.tag_prefix, 'T');
    }

    #[test]
    fn test_validate_tag_prefix() {
        assert!(Config::new("localhost").validate().is_ok());
        assert!(Config::builder("localhost").tag_prefix('z').build().validate().is_ok());

        for prefix in ['*', '+', '%', '\\', ' ', '(', '"', '{', '\n', 'é'] {
            let config = Config::builder("localhost").tag_prefix(prefix).build();
            assert!(
                matches!(config.validate(), Err(Error::Config(_))),
                "prefix {prefix:?} accepted"
            );
        }
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let credentials = Credentials::new("alice", "hunter2");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }
}
