//! Session bookkeeping for long-lived server-push connections.
//!
//! A [`SessionTransport`] wraps one open stream: it owns the outbound channel that
//! feeds the event stream, the inbound channel that feeds the protocol server, and a
//! write-once context slot holding whatever was learned about the requester when the
//! connection was accepted. The [`SessionRegistry`] maps server-issued session ids to
//! open transports so that a separate request (a posted message) can be routed back
//! to the right connection.
//!
//! A transport is removed from the registry when its [`SessionGuard`] is dropped (the
//! stream went away) or when it is closed explicitly. Removal is idempotent.

use thiserror::Error;

mod registry;
mod stats;
mod transport;

pub use registry::{SessionGuard, SessionRegistry};
pub use stats::SessionStats;
pub use transport::{SessionChannels, SessionOptions, SessionTransport};

/// Errors raised by session bookkeeping
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session {0} already has a context attached")]
    ContextAlreadyAttached(String),
    #[error("Session {0} has no context attached")]
    MissingContext(String),
    #[error("Session {0} is already registered")]
    DuplicateSession(String),
    #[error("Session {0} is closed")]
    Closed(String),
    #[error("Session {0} has too many pending messages")]
    Backlogged(String),
}
