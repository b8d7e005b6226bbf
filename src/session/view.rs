//! The client's local, derived view of one session.

use crate::ledger::SessionId;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which seat this client occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum Role {
    /// Created the session.
    #[strum(serialize = "Player-1")]
    #[serde(rename = "Player-1")]
    PlayerOne,
    /// Joined the session.
    #[strum(serialize = "Player-2")]
    #[serde(rename = "Player-2")]
    PlayerTwo,
}

/// Phase of the session view, derived from its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionPhase {
    /// Nothing tracked.
    Empty,
    /// Created by this client; waiting for the second participant.
    AwaitingOpponent,
    /// Both participants present.
    Active,
    /// Both participants present, entered by viewing the ledger record.
    ReadOnlyActive,
}

/// Local view of a session.
///
/// `other_present` implies `id` is set, and `role` is set exactly when `id`
/// is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    id: Option<SessionId>,
    role: Option<Role>,
    other_present: bool,
    observed: bool,
}

impl SessionView {
    /// The empty view.
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn awaiting(id: SessionId, role: Role) -> Self {
        Self {
            id: Some(id),
            role: Some(role),
            other_present: false,
            observed: false,
        }
    }

    pub(crate) fn joined(id: SessionId) -> Self {
        Self {
            id: Some(id),
            role: Some(Role::PlayerTwo),
            other_present: true,
            observed: false,
        }
    }

    pub(crate) fn observed(id: SessionId, role: Role, started: bool) -> Self {
        Self {
            id: Some(id),
            role: Some(role),
            other_present: started,
            observed: true,
        }
    }

    pub(crate) fn mark_other_present(&mut self) {
        self.other_present = true;
    }

    /// Tracked session id.
    pub fn id(&self) -> Option<SessionId> {
        self.id
    }

    /// This client's role.
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Whether the other participant is known to be present.
    pub fn other_present(&self) -> bool {
        self.other_present
    }

    /// Whether the view was entered by reading the ledger record.
    pub fn is_observed(&self) -> bool {
        self.observed
    }

    /// A session is tracked and nobody has joined it yet.
    pub fn can_cancel(&self) -> bool {
        self.id.is_some() && !self.other_present
    }

    /// A session is tracked and both participants are present.
    pub fn is_active(&self) -> bool {
        self.id.is_some() && self.other_present
    }

    /// Derived phase.
    pub fn phase(&self) -> SessionPhase {
        match (self.id, self.other_present, self.observed) {
            (None, _, _) => SessionPhase::Empty,
            (Some(_), false, _) => SessionPhase::AwaitingOpponent,
            (Some(_), true, false) => SessionPhase::Active,
            (Some(_), true, true) => SessionPhase::ReadOnlyActive,
        }
    }
}
