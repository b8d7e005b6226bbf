//! Wire-level types exchanged with the ledger.

use derive_getters::Getters;
use derive_more::{Display, From};
use derive_new::new;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay, EnumString};
use tokio::sync::mpsc;

/// Identifier of a game session, as assigned by the ledger.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Wraps a raw integer id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// An account address on the ledger.
///
/// Equality is exact; use [`Address::same_account`] for the case-insensitive
/// comparison the ledger's checksummed encodings require.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// The all-zero address the ledger reports for an unset participant.
    pub const ZERO: &'static str = "0x0000000000000000000000000000000000000000";

    /// Creates an address from its textual form.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the zero address.
    pub fn zero() -> Self {
        Self::new(Self::ZERO)
    }

    /// Returns the textual form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when both addresses name the same account, ignoring case.
    pub fn same_account(&self, other: &Address) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }

    /// True for the zero address.
    pub fn is_zero(&self) -> bool {
        self.same_account(&Self::zero())
    }
}

/// Payment attached to a mutating call, in wei.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Serialize, Deserialize,
)]
#[display("{} wei", _0)]
pub struct Stake(u128);

impl Stake {
    /// Creates a stake from a wei amount.
    pub const fn from_wei(wei: u128) -> Self {
        Self(wei)
    }

    /// Returns the amount in wei.
    pub const fn wei(self) -> u128 {
        self.0
    }
}

/// Entry stake agreed with the deployed contract, in wei: 0.001 ether.
pub const ENTRY_STAKE_WEI: u64 = 1_000_000_000_000_000;

/// [`ENTRY_STAKE_WEI`] as a [`Stake`].
pub const ENTRY_STAKE: Stake = Stake::from_wei(ENTRY_STAKE_WEI as u128);

/// Named events emitted by the session contract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString, AsRefStr, Serialize, Deserialize,
)]
pub enum EventKind {
    /// A new session was created; arg 0 is the id, arg 1 the creator.
    SessionStarted,
    /// The second participant joined; arg 0 is the id, arg 1 the joiner.
    JoinedSession,
    /// The creator cancelled before anyone joined; arg 0 is the id.
    SessionCancelled,
}

/// One event log, either inside a receipt or delivered to a subscriber.
///
/// Arguments keep the ledger's native encoding; integer arguments are
/// hexadecimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize, new)]
pub struct LedgerEvent {
    kind: EventKind,
    args: Vec<String>,
}

impl LedgerEvent {
    /// Returns the argument at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

/// Confirmation record of a mined mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize, new)]
pub struct Receipt {
    transaction: String,
    logs: Vec<LedgerEvent>,
}

impl Receipt {
    /// Finds the first log of the given kind.
    pub fn find(&self, kind: EventKind) -> Option<&LedgerEvent> {
        self.logs.iter().find(|log| log.kind == kind)
    }
}

/// The ledger's stored record for one session.
///
/// Unknown ids read back as an all-zero record, the way contract storage
/// reports a missing mapping entry.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize, new)]
pub struct SessionRecord {
    id: String,
    participant_one: Address,
    participant_two: Address,
    is_started: bool,
}

impl SessionRecord {
    /// The record returned for an id the ledger has never stored.
    pub fn vacant() -> Self {
        Self::new("0x0".to_string(), Address::zero(), Address::zero(), false)
    }
}

/// Handle identifying one registration with the ledger's event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, From)]
pub struct SubscriptionId(u64);

/// Stream of broadcast events for one subscription.
pub type EventStream = mpsc::UnboundedReceiver<LedgerEvent>;

/// Failure reported by the ledger or its transport.
///
/// The reason is the human-readable revert string and is passed upward
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{}", reason)]
pub struct GatewayError {
    /// Reason given by the ledger.
    pub reason: String,
}

impl GatewayError {
    /// Creates a gateway error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl std::error::Error for GatewayError {}
