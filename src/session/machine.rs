//! The session state machine.
//!
//! The machine owns the local [`SessionView`], the single-flight guard and
//! the one subscription slot. All of them change only through `&mut self`,
//! so transitions are applied one at a time even though they interleave with
//! arbitrary delays between a call being issued and being confirmed.

use super::contracts::{
    CancelContract, Contract, EnterContract, Guarded, ResetContract, StartContract,
    assert_invariants,
};
use super::error::{PendingMutation, SessionError};
use super::reconciler::{EventReconciler, Reconciliation};
use super::subscription::SubscriptionSlot;
use super::view::{Role, SessionPhase, SessionView};
use crate::codec::{decode_session_id, parse_session_id};
use crate::ledger::{
    ENTRY_STAKE, EventKind, LedgerEvent, LedgerGateway, Receipt, SessionId, Stake,
};
use crate::notice::{NoticeSink, SessionNotice};
use crate::snapshot::SessionSnapshot;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Client-side coordinator for one game session on the ledger.
#[derive(Debug)]
pub struct SessionMachine<G>
where
    G: LedgerGateway + ?Sized,
{
    gateway: Arc<G>,
    stake: Stake,
    view: SessionView,
    pending: Option<PendingMutation>,
    subscription: SubscriptionSlot,
    reconciler: EventReconciler,
    notices: NoticeSink,
}

impl<G> SessionMachine<G>
where
    G: LedgerGateway + ?Sized,
{
    /// Creates an empty machine that pays the protocol's [`ENTRY_STAKE`].
    pub fn new(gateway: Arc<G>) -> Self {
        Self::with_stake(gateway, ENTRY_STAKE)
    }

    /// Creates an empty machine that pays `stake` to start or join.
    #[instrument(skip(gateway), fields(signer = %gateway.signer()))]
    pub fn with_stake(gateway: Arc<G>, stake: Stake) -> Self {
        info!("Creating session machine");
        Self {
            gateway,
            stake,
            view: SessionView::empty(),
            pending: None,
            subscription: SubscriptionSlot::new(),
            reconciler: EventReconciler::new(),
            notices: NoticeSink::default(),
        }
    }

    /// Routes [`SessionNotice`]s to `sender`.
    pub fn with_notices(mut self, sender: mpsc::UnboundedSender<SessionNotice>) -> Self {
        self.notices = NoticeSink::new(sender);
        self
    }

    // ─────────────────────────────────────────────────────────
    //  Queries
    // ─────────────────────────────────────────────────────────

    /// The gateway this machine calls.
    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Current view.
    pub fn view(&self) -> &SessionView {
        &self.view
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.view.phase()
    }

    /// The outstanding mutation, if any.
    pub fn pending(&self) -> Option<PendingMutation> {
        self.pending
    }

    /// The subscription slot.
    pub fn subscription(&self) -> &SubscriptionSlot {
        &self.subscription
    }

    /// True when a session is tracked and no opponent has joined.
    pub fn can_cancel(&self) -> bool {
        self.view.can_cancel()
    }

    /// True when a session is tracked and both participants are present.
    pub fn is_active(&self) -> bool {
        self.view.is_active()
    }

    /// What to persist so the session can be resumed later.
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        Some(SessionSnapshot::new(self.view.id()?, self.view.role()?))
    }

    // ─────────────────────────────────────────────────────────
    //  Operations
    // ─────────────────────────────────────────────────────────

    /// Returns to the empty view and releases any subscription.
    ///
    /// Idempotent. Refused while a call is outstanding, so a late
    /// confirmation can never be lost under a reset.
    #[instrument(skip(self), fields(session_id = ?self.view.id()))]
    pub fn reset(&mut self) -> Result<(), SessionError> {
        ResetContract::pre(self.guarded())?;
        self.clear_view();
        Ok(())
    }

    /// Creates a new session as Player-1 and starts waiting for Player-2.
    #[instrument(skip(self), fields(stake = %self.stake))]
    pub async fn start_session(&mut self) -> Result<SessionId, SessionError> {
        StartContract::pre(self.guarded())?;

        self.pending = Some(PendingMutation::Start);
        let outcome = self.gateway.start_session(self.stake).await;
        self.pending = None;

        let id = self.settle(outcome, EventKind::SessionStarted)?;
        self.view = SessionView::awaiting(id, Role::PlayerOne);
        // Opened only now that the id is recorded, so no event can be
        // reconciled against an unknown session.
        self.await_opponent(id);
        self.check_invariants();

        info!(session_id = %id, "Session started, awaiting opponent");
        self.notices.send(SessionNotice::ShareSessionId(id));
        self.notices.send(SessionNotice::CancelAvailable(id));
        Ok(id)
    }

    /// Resets, then starts a fresh session.
    pub async fn start_new_session(&mut self) -> Result<SessionId, SessionError> {
        self.reset()?;
        self.start_session().await
    }

    /// Joins session `target` (decimal input) as Player-2.
    #[instrument(skip(self), fields(stake = %self.stake))]
    pub async fn join_session(&mut self, target: &str) -> Result<SessionId, SessionError> {
        let target = parse_session_id(target).map_err(SessionError::from_input)?;
        EnterContract::pre(self.guarded())?;

        self.pending = Some(PendingMutation::Join);
        let outcome = self.gateway.join_session(target, self.stake).await;
        self.pending = None;

        let id = self.settle(outcome, EventKind::JoinedSession)?;
        self.clear_view();
        self.view = SessionView::joined(id);
        self.check_invariants();

        info!(session_id = %id, "Joined session as Player-2");
        self.notices.send(SessionNotice::JoinedAsPlayerTwo(id));
        Ok(id)
    }

    /// Cancels the tracked session before anyone joins it.
    #[instrument(skip(self), fields(session_id = ?self.view.id()))]
    pub async fn cancel_session(&mut self) -> Result<(), SessionError> {
        CancelContract::pre(self.guarded())?;
        let Some(id) = self.view.id() else {
            return Err(SessionError::InvalidState("no session tracked".to_string()));
        };

        self.pending = Some(PendingMutation::Cancel);
        let outcome = self.gateway.cancel_session(id).await;
        self.pending = None;

        if let Err(err) = outcome {
            return Err(self.fail(err.into()));
        }
        self.clear_view();
        info!(session_id = %id, "Session cancelled");
        self.notices.send(SessionNotice::Cancelled(id));
        Ok(())
    }

    /// Views session `target` (decimal input) from the ledger's record.
    ///
    /// Only a recorded participant may view; anyone else gets
    /// [`SessionError::PermissionDenied`] and the view is untouched.
    #[instrument(skip(self), fields(signer = %self.gateway.signer()))]
    pub async fn view_session(&mut self, target: &str) -> Result<SessionId, SessionError> {
        let target = parse_session_id(target).map_err(SessionError::from_input)?;
        self.view_by_id(target).await
    }

    /// Views the session named by a stored snapshot.
    pub async fn resume(&mut self, snapshot: &SessionSnapshot) -> Result<SessionId, SessionError> {
        info!(session_id = %snapshot.id, role = %snapshot.role, "Resuming session");
        self.view_by_id(snapshot.id).await
    }

    /// Forgets an outstanding call whose future was dropped.
    ///
    /// The ledger may still confirm that call; the local view will not
    /// reflect it. Returns the kind that was pending.
    #[instrument(skip(self))]
    pub fn abandon_pending(&mut self) -> Option<PendingMutation> {
        let abandoned = self.pending.take();
        if let Some(kind) = abandoned {
            warn!(%kind, "Abandoning pending call; its outcome will be ignored");
        }
        abandoned
    }

    // ─────────────────────────────────────────────────────────
    //  Event reconciliation
    // ─────────────────────────────────────────────────────────

    /// Reconciles one delivered event. Never fails; unusable events are
    /// dropped.
    pub fn apply_event(&mut self, event: &LedgerEvent) -> Reconciliation {
        let awaiting = self
            .subscription
            .current()
            .filter(|handle| handle.kind() == *event.kind())
            .map(|handle| handle.session());
        let verdict = self.reconciler.reconcile(awaiting, event);

        if let Reconciliation::Accepted(id) = verdict {
            // Tracked id equals the subscription's session by construction.
            self.view.mark_other_present();
            self.subscription.release(self.gateway.as_ref());
            self.check_invariants();
            info!(session_id = %id, "Opponent joined, session active");
            self.notices.send(SessionNotice::OpponentJoined(id));
        }
        verdict
    }

    /// Applies every event already delivered, without waiting. Returns
    /// whether the session became active.
    pub fn pump_events(&mut self) -> bool {
        let mut activated = false;
        while let Some(event) = self.subscription.try_next() {
            activated |= self.apply_event(&event).is_accepted();
        }
        activated
    }

    /// Waits until the opponent joins the tracked session.
    ///
    /// Returns immediately if the session is already active.
    #[instrument(skip(self), fields(session_id = ?self.view.id()))]
    pub async fn wait_for_opponent(&mut self) -> Result<SessionId, SessionError> {
        loop {
            if let (Some(id), true) = (self.view.id(), self.view.is_active()) {
                return Ok(id);
            }
            if !self.subscription.is_open() {
                return Err(SessionError::InvalidState(format!(
                    "not awaiting an opponent in phase {}",
                    self.phase()
                )));
            }
            match self.subscription.next().await {
                Some(event) => {
                    self.apply_event(&event);
                }
                None => {
                    warn!("Event stream closed while awaiting opponent");
                    return Err(SessionError::SubscriptionClosed);
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────
    //  Internals
    // ─────────────────────────────────────────────────────────

    fn guarded(&self) -> Guarded<'_> {
        Guarded {
            view: &self.view,
            pending: self.pending,
        }
    }

    async fn view_by_id(&mut self, target: SessionId) -> Result<SessionId, SessionError> {
        EnterContract::pre(self.guarded())?;

        self.pending = Some(PendingMutation::View);
        let outcome = self.gateway.read_session(target).await;
        self.pending = None;

        let record = outcome.map_err(|err| self.fail(err.into()))?;
        let signer = self.gateway.signer();
        // A vacant record has no creator, even for a zero-address signer.
        if record.participant_one().is_zero() {
            warn!(session_id = %target, "No session on ledger");
            return Err(self.fail(SessionError::PermissionDenied(signer.clone())));
        }
        let role = if signer.same_account(record.participant_one()) {
            Role::PlayerOne
        } else if signer.same_account(record.participant_two()) {
            Role::PlayerTwo
        } else {
            warn!(session_id = %target, "Signer is not a participant");
            return Err(self.fail(SessionError::PermissionDenied(signer.clone())));
        };
        let id = decode_session_id(record.id())
            .map_err(|err| self.fail(SessionError::from_ledger(err)))?;
        if id != target {
            warn!(requested = %target, returned = %id, "Ledger returned another session");
            return Err(self.fail(SessionError::CallRejected(format!(
                "Ledger returned session {} for {}",
                id, target
            ))));
        }

        let started = *record.is_started();
        self.clear_view();
        self.view = SessionView::observed(id, role, started);
        if !started && role == Role::PlayerOne {
            self.await_opponent(id);
        }
        self.check_invariants();

        info!(session_id = %id, %role, started, "Viewing session");
        self.notices.send(SessionNotice::Viewing { id, role });
        Ok(id)
    }

    /// Turns a call outcome into the session id carried by its receipt.
    fn settle<E>(
        &self,
        outcome: Result<Receipt, E>,
        kind: EventKind,
    ) -> Result<SessionId, SessionError>
    where
        E: Into<SessionError>,
    {
        let receipt = outcome.map_err(|err| self.fail(err.into()))?;
        debug!(transaction = %receipt.transaction(), "Call confirmed");
        let encoded = receipt
            .find(kind)
            .and_then(|log| log.arg(0))
            .ok_or_else(|| self.fail(SessionError::MissingReceiptLog(kind)))?;
        decode_session_id(encoded).map_err(|err| self.fail(SessionError::from_ledger(err)))
    }

    /// Reports `err` and hands it back for propagation.
    fn fail(&self, err: SessionError) -> SessionError {
        warn!(error = %err, "Session operation failed");
        self.notices.send(SessionNotice::Failed(err.to_string()));
        err
    }

    fn await_opponent(&mut self, id: SessionId) {
        self.reconciler.clear();
        self.subscription
            .open(self.gateway.as_ref(), id, EventKind::JoinedSession);
    }

    fn clear_view(&mut self) {
        self.subscription.release(self.gateway.as_ref());
        self.reconciler.clear();
        self.view = SessionView::empty();
        self.check_invariants();
    }

    fn check_invariants(&self) {
        assert_invariants(&self.view, self.subscription.is_open());
    }
}

impl<G> Drop for SessionMachine<G>
where
    G: LedgerGateway + ?Sized,
{
    fn drop(&mut self) {
        self.subscription.release(self.gateway.as_ref());
    }
}
