//! The external ledger: its wire types, the gateway trait the session core
//! consumes, and an in-process implementation.

mod connection;
mod gateway;
mod memory;
mod types;

pub use connection::{ConnectionState, Connector, LedgerConnection, MemoryConnector};
pub use gateway::LedgerGateway;
pub use memory::{
    MemoryLedger, MemoryLedgerClient, REVERT_ALREADY_STARTED, REVERT_IDS_EXHAUSTED,
    REVERT_NOT_CREATOR, REVERT_OWN_SESSION, REVERT_UNKNOWN_SESSION, REVERT_WRONG_STAKE,
};
pub use types::{
    Address, ENTRY_STAKE, ENTRY_STAKE_WEI, EventKind, EventStream, GatewayError, LedgerEvent,
    Receipt, SessionId, SessionRecord, Stake, SubscriptionId,
};
