//! Session protocol logic, free of I/O.
//!
//! [`StateMachine`] owns the session lifecycle and the mailbox cache;
//! [`Correlator`] owns tags and the single pending command. The client in
//! [`crate::connection`] feeds both from the wire.

mod correlator;
mod state;

pub use correlator::{CommandResult, Correlator, Disposition, PendingCommand};
pub use state::{SessionState, StateMachine};
