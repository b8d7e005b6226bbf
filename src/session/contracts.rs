//! Preconditions and invariants for session transitions.
//!
//! Each operation checks its preconditions before any ledger call is issued;
//! invariants are asserted after every transition in debug builds.

use super::error::{PendingMutation, SessionError};
use super::view::{SessionPhase, SessionView};
use tracing::{instrument, warn};

// ─────────────────────────────────────────────────────────────
//  Contract Trait
// ─────────────────────────────────────────────────────────────

/// What a contract inspects: the view plus the outstanding call, if any.
#[derive(Debug, Clone, Copy)]
pub struct Guarded<'a> {
    /// Current view.
    pub view: &'a SessionView,
    /// Outstanding mutation.
    pub pending: Option<PendingMutation>,
}

/// Preconditions for one session operation.
pub trait Contract {
    /// Checks that the operation may begin.
    fn pre(state: Guarded<'_>) -> Result<(), SessionError>;
}

// ─────────────────────────────────────────────────────────────
//  Preconditions
// ─────────────────────────────────────────────────────────────

/// Precondition: no mutation is outstanding.
pub struct NothingPending;

impl NothingPending {
    #[instrument(skip(state))]
    pub fn check(state: Guarded<'_>) -> Result<(), SessionError> {
        match state.pending {
            Some(kind) => {
                warn!(%kind, "Refusing while a call is pending");
                Err(SessionError::Busy(kind))
            }
            None => Ok(()),
        }
    }
}

/// Precondition: no session is tracked.
pub struct NoSessionTracked;

impl NoSessionTracked {
    #[instrument(skip(state))]
    pub fn check(state: Guarded<'_>) -> Result<(), SessionError> {
        match state.view.id() {
            Some(id) => Err(SessionError::InvalidState(format!(
                "session {} is already tracked",
                id
            ))),
            None => Ok(()),
        }
    }
}

/// Precondition: the tracked session is waiting for an opponent.
pub struct Cancellable;

impl Cancellable {
    #[instrument(skip(state))]
    pub fn check(state: Guarded<'_>) -> Result<(), SessionError> {
        if state.view.can_cancel() {
            Ok(())
        } else {
            Err(SessionError::InvalidState(format!(
                "cannot cancel in phase {}",
                state.view.phase()
            )))
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Operation Contracts
// ─────────────────────────────────────────────────────────────

/// Contract for `start_session`.
pub struct StartContract;

impl Contract for StartContract {
    fn pre(state: Guarded<'_>) -> Result<(), SessionError> {
        NothingPending::check(state)?;
        NoSessionTracked::check(state)
    }
}

/// Contract for `join_session` and `view_session`.
pub struct EnterContract;

impl Contract for EnterContract {
    fn pre(state: Guarded<'_>) -> Result<(), SessionError> {
        NothingPending::check(state)
    }
}

/// Contract for `cancel_session`.
pub struct CancelContract;

impl Contract for CancelContract {
    fn pre(state: Guarded<'_>) -> Result<(), SessionError> {
        NothingPending::check(state)?;
        Cancellable::check(state)
    }
}

/// Contract for `reset`.
pub struct ResetContract;

impl Contract for ResetContract {
    fn pre(state: Guarded<'_>) -> Result<(), SessionError> {
        NothingPending::check(state)
    }
}

// ─────────────────────────────────────────────────────────────
//  Invariants
// ─────────────────────────────────────────────────────────────

/// Invariant: presence implies a tracked id, and role is set with the id.
pub struct ViewConsistent;

impl ViewConsistent {
    #[instrument(skip(view))]
    pub fn holds(view: &SessionView) -> bool {
        let presence = !view.other_present() || view.id().is_some();
        let role = view.role().is_some() == view.id().is_some();
        if !(presence && role) {
            warn!(?view, "View consistency violated");
        }
        presence && role
    }
}

/// Invariant: a subscription is open only while awaiting an opponent.
pub struct SubscriptionMatchesPhase;

impl SubscriptionMatchesPhase {
    #[instrument(skip(view))]
    pub fn holds(view: &SessionView, subscription_open: bool) -> bool {
        let valid = !subscription_open || view.phase() == SessionPhase::AwaitingOpponent;
        if !valid {
            warn!(phase = %view.phase(), "Subscription open outside AwaitingOpponent");
        }
        valid
    }
}

/// Asserts all session invariants (debug builds only).
pub fn assert_invariants(view: &SessionView, subscription_open: bool) {
    debug_assert!(ViewConsistent::holds(view), "View consistency violated");
    debug_assert!(
        SubscriptionMatchesPhase::holds(view, subscription_open),
        "Subscription outlived its phase"
    );
}
