//! Strictly Onchain - client-side session coordination for ledger-hosted games
//!
//! The authoritative state of every game session lives on an external,
//! event-emitting ledger. This library keeps a client's local view of one
//! session in step with it.
//!
//! # Architecture
//!
//! - **Ledger**: the [`LedgerGateway`] trait the core consumes, its wire
//!   types, and [`MemoryLedger`], an in-process implementation
//! - **Codec**: hex encoding of session ids ([`decode_session_id`])
//! - **Session**: the [`SessionMachine`] state machine and the
//!   [`EventReconciler`] that filters broadcast events
//! - **Snapshot / Config**: persistence of the tracked session and client
//!   configuration
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strictly_onchain::{Address, ENTRY_STAKE, MemoryLedger, SessionMachine};
//!
//! # async fn example() -> Result<(), strictly_onchain::SessionError> {
//! let ledger = MemoryLedger::new(ENTRY_STAKE);
//! let gateway = Arc::new(ledger.client(Address::new("0xA11CE")));
//! let mut machine = SessionMachine::new(gateway);
//!
//! let id = machine.start_session().await?;
//! assert!(machine.can_cancel());
//! machine.wait_for_opponent().await?;
//! # let _ = id;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod codec;
mod config;
mod ledger;
mod notice;
mod session;
mod snapshot;

// Crate-level exports - Codec
pub use codec::{CodecError, decode_session_id, encode_session_id, parse_session_id};

// Crate-level exports - Configuration
pub use config::{ClientConfig, ConfigError};

// Crate-level exports - Ledger collaborator
pub use ledger::{
    Address, ConnectionState, Connector, ENTRY_STAKE, ENTRY_STAKE_WEI, EventKind, EventStream,
    GatewayError, LedgerConnection, LedgerEvent, LedgerGateway, MemoryConnector, MemoryLedger,
    MemoryLedgerClient, REVERT_ALREADY_STARTED, REVERT_IDS_EXHAUSTED, REVERT_NOT_CREATOR,
    REVERT_OWN_SESSION, REVERT_UNKNOWN_SESSION, REVERT_WRONG_STAKE, Receipt, SessionId,
    SessionRecord, Stake, SubscriptionId,
};

// Crate-level exports - Notices
pub use notice::SessionNotice;

// Crate-level exports - Session state machine
pub use session::{
    CancelContract, Contract, EnterContract, EventReconciler, Guarded, PendingMutation,
    Reconciliation, ResetContract, Role, SessionError, SessionMachine, SessionPhase, SessionView,
    StartContract, SubscriptionHandle, SubscriptionMatchesPhase, SubscriptionSlot,
    ViewConsistent,
};

// Crate-level exports - Snapshots
pub use snapshot::{SessionSnapshot, SnapshotError, SnapshotStore};
