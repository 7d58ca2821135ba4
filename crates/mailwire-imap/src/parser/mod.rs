//! IMAP protocol parser.
//!
//! Sans-I/O decoding of server responses. Reading bytes off the wire is the
//! job of [`crate::connection`]; everything here works on complete frames.
//!
//! # Architecture
//!
//! - **Frame**: one response split into text lines and literal payloads
//! - **Lexer**: tokenizes a frame, splicing literals in where their markers were
//! - **Response Parser**: classifies the response and builds [`Value`](crate::types::Value) trees
//!
//! # Example
//!
//! ```
//! use mailwire_imap::parser::{ResponseLine, ResponseParser, UntaggedResponse};
//!
//! let response = ResponseParser::parse(b"* 4 EXISTS\r\n").unwrap();
//!
//! match response {
//!     ResponseLine::Untagged(UntaggedResponse::Data { number, keyword, .. }) => {
//!         assert_eq!(number, Some(4));
//!         assert_eq!(keyword, "EXISTS");
//!     }
//!     _ => panic!("Expected message data"),
//! }
//! ```

pub mod frame;
pub mod lexer;
pub mod response;

pub use frame::{Frame, LiteralMarker, literal_marker};
pub use lexer::{Lexer, Token};
pub use response::{ResponseLine, ResponseParser, TaggedCompletion, UntaggedResponse};
