//! Filtering of broadcast ledger events against the tracked session.
//!
//! The ledger's event channel is shared by every session, and delivery is at
//! least once. The reconciler decides, per delivery, whether it is the one
//! logical event this client is waiting for.

use crate::codec::decode_session_id;
use crate::ledger::{EventKind, LedgerEvent, SessionId};
use tracing::{debug, instrument};

/// Outcome of reconciling one delivered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The awaited event for the tracked session; apply it.
    Accepted(SessionId),
    /// An event for some other session.
    Foreign(SessionId),
    /// A redelivery of an event already accepted.
    Duplicate(SessionId),
    /// The event's id argument is missing or undecodable.
    Malformed(String),
    /// Nothing is awaited, or the event is of another kind.
    Ignored,
}

impl Reconciliation {
    /// True when the event should drive a transition.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Classifies `JoinedSession` deliveries for one client.
#[derive(Debug, Clone, Default)]
pub struct EventReconciler {
    accepted: Option<SessionId>,
}

impl EventReconciler {
    /// A reconciler that has accepted nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies `event` given the session currently awaiting an opponent.
    ///
    /// `awaiting` is `None` when no join is expected. Never fails: anything
    /// unusable is reported and dropped.
    #[instrument(skip(self, event), fields(kind = %event.kind()))]
    pub fn reconcile(
        &mut self,
        awaiting: Option<SessionId>,
        event: &LedgerEvent,
    ) -> Reconciliation {
        if *event.kind() != EventKind::JoinedSession {
            return Reconciliation::Ignored;
        }

        let Some(encoded) = event.arg(0) else {
            debug!("Join event without an id");
            return Reconciliation::Malformed(String::new());
        };
        let id = match decode_session_id(encoded) {
            Ok(id) => id,
            Err(err) => {
                debug!(error = %err, "Dropping undecodable join event");
                return Reconciliation::Malformed(encoded.to_string());
            }
        };

        if self.accepted == Some(id) {
            debug!(session_id = %id, "Duplicate join event");
            return Reconciliation::Duplicate(id);
        }
        match awaiting {
            Some(tracked) if tracked == id => {
                self.accepted = Some(id);
                Reconciliation::Accepted(id)
            }
            Some(_) => {
                debug!(session_id = %id, "Join event for another session");
                Reconciliation::Foreign(id)
            }
            None => Reconciliation::Ignored,
        }
    }

    /// Forgets the accepted id, e.g. when the view is reset.
    pub fn clear(&mut self) {
        self.accepted = None;
    }
}
