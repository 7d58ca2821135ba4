//! Core IMAP types.
//!
//! This module defines the types shared by the codec, the session state
//! machine and the client: tags, completion status, response codes, the
//! generic [`Value`] token tree and the selected-mailbox cache.

#![allow(clippy::missing_const_for_fn)]

mod identifiers;
mod mailbox;
mod response_code;
mod status;
mod value;

pub use identifiers::Tag;
pub use mailbox::{MailboxStatus, SelectedMailbox};
pub use response_code::ResponseCode;
pub use status::{Condition, Status};
pub use value::Value;
