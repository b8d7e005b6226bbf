//! Failures surfaced by the session state machine.

use crate::codec::CodecError;
use crate::ledger::{Address, EventKind, GatewayError};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// A mutating (or, for `View`, ledger-reading) call the machine can have
/// outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum PendingMutation {
    /// Creating a session.
    #[display("start")]
    Start,
    /// Joining a session.
    #[display("join")]
    Join,
    /// Cancelling the tracked session.
    #[display("cancel")]
    Cancel,
    /// Reading a session record.
    #[display("view")]
    View,
}

/// Error returned by session operations.
///
/// Every variant leaves the local view exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum SessionError {
    /// The ledger rejected the call; the reason is the ledger's own text.
    #[display("{}", _0)]
    CallRejected(String),

    /// The signer is neither participant of the viewed session.
    #[display("{} is not a participant of this session", _0)]
    PermissionDenied(Address),

    /// A session id typed by the caller is not a non-negative integer.
    #[display("Malformed session id: {:?}", _0)]
    MalformedInput(String),

    /// A ledger-encoded id does not fit the local integer type.
    #[display("Session id {} exceeds the supported range", _0)]
    DecodeOverflow(String),

    /// Another mutation is still outstanding.
    #[display("A {} call is still pending", _0)]
    Busy(PendingMutation),

    /// The operation is not valid in the current session phase.
    #[display("Invalid session state: {}", _0)]
    InvalidState(String),

    /// A confirmed receipt did not contain the expected log.
    #[display("Receipt has no {} log", _0)]
    MissingReceiptLog(EventKind),

    /// The event stream ended while waiting for the opponent.
    #[display("Event subscription closed")]
    SubscriptionClosed,
}

impl std::error::Error for SessionError {}

impl From<GatewayError> for SessionError {
    fn from(err: GatewayError) -> Self {
        Self::CallRejected(err.reason)
    }
}

impl SessionError {
    /// Maps a failure decoding caller input.
    pub fn from_input(err: CodecError) -> Self {
        match err {
            CodecError::Malformed(input) | CodecError::Overflow(input) => {
                Self::MalformedInput(input)
            }
        }
    }

    /// Maps a failure decoding a ledger-encoded id.
    ///
    /// A malformed encoding from the ledger is treated as a rejected call:
    /// the confirmation cannot be interpreted.
    pub fn from_ledger(err: CodecError) -> Self {
        match err {
            CodecError::Overflow(encoded) => Self::DecodeOverflow(encoded),
            CodecError::Malformed(encoded) => {
                Self::CallRejected(format!("Unreadable session id {:?} from ledger", encoded))
            }
        }
    }
}
