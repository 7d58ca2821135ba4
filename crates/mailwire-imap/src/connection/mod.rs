//! IMAP connection management.
//!
//! - [`Config`] describes where and how to connect
//! - [`ImapStream`] is the plaintext or TLS byte stream
//! - [`Connection`] frames lines and literals on top of it
//! - [`Client`] runs commands over a connection and tracks the session

mod client;
mod config;
mod debug;
mod framed;
mod stream;

pub use client::Client;
pub use config::{Config, ConfigBuilder, Credentials, Security};
pub use debug::{DebugSink, NoopDebug, TracingDebug};
pub use framed::Connection;
pub use stream::{ImapStream, create_tls_connector};
