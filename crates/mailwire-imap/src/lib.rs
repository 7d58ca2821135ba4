//! # mailwire-imap
//!
//! The protocol engine of an IMAP client: it frames lines and literals on a
//! TCP or TLS stream, encodes tagged commands, decodes server responses,
//! tracks the session state and matches each tagged completion to the
//! command that caused it.
//!
//! ## Features
//!
//! - **Literal-aware framing**: `{n}` literals are read as raw bytes and
//!   spliced back into the response they belong to, so CRLF inside message
//!   data never splits a response
//! - **Synchronizing and `LITERAL+` uploads**: long or binary arguments are
//!   sent as literals, waiting for the server's `+` when required
//! - **Runtime session checks**: commands that are illegal in the current
//!   state fail before a byte is written
//! - **One command in flight**: untagged data is delivered to listeners in
//!   wire order and collected into the result of the pending command
//! - **TLS via rustls**: implicit TLS without an OpenSSL dependency
//! - **Sans-I/O parser**: [`Frame::split`](parser::Frame::split) and
//!   [`ResponseParser`] work on in-memory buffers
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailwire_imap::{Client, Config, Credentials};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> mailwire_imap::Result<()> {
//!     let config = Config::new("imap.example.com");
//!     let credentials = Credentials::new("user@example.com", "password");
//!     let mut client = Client::open_and_login(&config, &credentials).await?;
//!
//!     let inbox = client.select("INBOX").await?;
//!     println!("Messages: {}", inbox.exists());
//!
//!     if client.has_capability("IDLE") {
//!         for response in client.idle(Duration::from_secs(30)).await? {
//!             println!("{}", response.keyword());
//!         }
//!     }
//!
//!     client.logout().await
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! Disconnected ── open + OK greeting ──→ Connected ── LOGIN OK ──→ Authenticated
//!                 open + PREAUTH ─────────────────────────────────→ Authenticated
//! Authenticated ── SELECT/EXAMINE OK ──→ MailboxSelected
//! MailboxSelected ── CLOSE/UNSELECT OK, SELECT NO ──→ Authenticated
//! any ── LOGOUT, disconnect, write failure, timeout ──→ Disconnected
//! ```
//!
//! ## Modules
//!
//! - [`command`]: Command builders and the wire encoder
//! - [`connection`]: Transport, framing and the [`Client`]
//! - [`handler`]: Listeners for untagged responses
//! - [`parser`]: Sans-I/O response parser
//! - [`protocol`]: Session state machine and command correlation
//! - [`types`]: Tags, statuses, response codes and mailbox state

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod handler;
pub mod parser;
pub mod protocol;
pub mod types;

pub use command::{Argument, Command, CommandKind, Scope, TagGenerator};
pub use connection::{
    Client, Config, ConfigBuilder, Connection, Credentials, DebugSink, ImapStream, Security,
};
pub use error::{Error, Result};
pub use handler::ResponseHandler;
pub use parser::{Frame, ResponseLine, ResponseParser, TaggedCompletion, UntaggedResponse};
pub use protocol::{CommandResult, SessionState};
pub use types::{
    Condition, MailboxStatus, ResponseCode, SelectedMailbox, Status, Tag, Value,
};
