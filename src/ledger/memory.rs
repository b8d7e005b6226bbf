//! In-process ledger that enforces the session contract's rules.
//!
//! [`MemoryLedger`] is the shared chain; each [`MemoryLedgerClient`] is one
//! signer's view of it and implements [`LedgerGateway`]. Confirmations can be
//! held back and rejections scripted so in-flight and failing calls can be
//! driven deterministically.

use super::gateway::LedgerGateway;
use super::types::{
    Address, EventKind, EventStream, GatewayError, LedgerEvent, Receipt, SessionId,
    SessionRecord, Stake, SubscriptionId,
};
use crate::codec::encode_session_id;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, warn};

/// Revert reason for a stake that differs from the entry stake.
pub const REVERT_WRONG_STAKE: &str = "Incorrect entry stake";
/// Revert reason for an id the ledger has never issued (or has cancelled).
pub const REVERT_UNKNOWN_SESSION: &str = "Session does not exist";
/// Revert reason for joining or cancelling a session that already started.
pub const REVERT_ALREADY_STARTED: &str = "Session already started";
/// Revert reason for joining one's own session.
pub const REVERT_OWN_SESSION: &str = "Cannot join your own session";
/// Revert reason for a cancel from anyone but the creator.
pub const REVERT_NOT_CREATOR: &str = "Only the creator can cancel";
/// Revert reason when no further session id can be issued.
pub const REVERT_IDS_EXHAUSTED: &str = "Session id space exhausted";

#[derive(Debug, Clone)]
struct StoredSession {
    creator: Address,
    joiner: Option<Address>,
}

#[derive(Debug)]
struct Subscriber {
    id: SubscriptionId,
    kind: EventKind,
    sender: mpsc::UnboundedSender<LedgerEvent>,
}

#[derive(Debug)]
struct LedgerState {
    entry_stake: Stake,
    next_session: u64,
    next_subscription: u64,
    next_transaction: u64,
    sessions: BTreeMap<u64, StoredSession>,
    subscribers: Vec<Subscriber>,
    scripted_rejections: VecDeque<String>,
}

impl LedgerState {
    fn transaction_hash(&mut self) -> String {
        self.next_transaction += 1;
        format!("{:#066x}", self.next_transaction)
    }

    fn take_scripted_rejection(&mut self) -> Result<(), GatewayError> {
        match self.scripted_rejections.pop_front() {
            Some(reason) => {
                warn!(reason = %reason, "Rejecting call as scripted");
                Err(GatewayError::new(reason))
            }
            None => Ok(()),
        }
    }

    fn check_stake(&self, stake: Stake) -> Result<(), GatewayError> {
        if stake != self.entry_stake {
            warn!(%stake, expected = %self.entry_stake, "Stake mismatch");
            return Err(GatewayError::new(REVERT_WRONG_STAKE));
        }
        Ok(())
    }

    /// Delivers `event` to every live subscriber of its kind.
    fn broadcast(&mut self, event: &LedgerEvent) {
        self.subscribers.retain(|sub| {
            if sub.kind != *event.kind() {
                return true;
            }
            // A closed receiver means the subscriber went away without
            // unsubscribing; forget it.
            sub.sender.send(event.clone()).is_ok()
        });
    }
}

/// A shared in-memory ledger.
#[derive(Debug, Clone)]
pub struct MemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    gate: Arc<watch::Sender<bool>>,
}

impl MemoryLedger {
    /// Creates an empty ledger that requires `entry_stake` for start and join.
    #[instrument]
    pub fn new(entry_stake: Stake) -> Self {
        info!("Creating in-memory ledger");
        let (gate, _) = watch::channel(true);
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                entry_stake,
                next_session: 0,
                next_subscription: 0,
                next_transaction: 0,
                sessions: BTreeMap::new(),
                subscribers: Vec::new(),
                scripted_rejections: VecDeque::new(),
            })),
            gate: Arc::new(gate),
        }
    }

    /// Makes the next issued session id equal to `next`.
    pub fn with_next_session_id(self, next: u64) -> Self {
        self.lock().next_session = next;
        self
    }

    /// Returns a gateway that signs calls as `signer`.
    pub fn client(&self, signer: Address) -> MemoryLedgerClient {
        MemoryLedgerClient {
            ledger: self.clone(),
            signer,
        }
    }

    /// Queues a rejection for the next mutating call, whoever makes it.
    pub fn reject_next(&self, reason: impl Into<String>) {
        self.lock().scripted_rejections.push_back(reason.into());
    }

    /// Holds every mutating call until [`MemoryLedger::release_confirmations`].
    pub fn hold_confirmations(&self) {
        debug!("Holding confirmations");
        self.gate.send_replace(false);
    }

    /// Lets held and future mutating calls complete.
    pub fn release_confirmations(&self) {
        debug!("Releasing confirmations");
        self.gate.send_replace(true);
    }

    /// Broadcasts an arbitrary event, as another client's activity would.
    #[instrument(skip(self))]
    pub fn emit(&self, event: LedgerEvent) {
        self.lock().broadcast(&event);
    }

    /// Number of live registrations for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.lock()
            .subscribers
            .iter()
            .filter(|sub| sub.kind == kind && !sub.sender.is_closed())
            .count()
    }

    /// Reads a record directly, bypassing any client.
    pub fn record(&self, id: SessionId) -> SessionRecord {
        Self::record_of(&self.lock(), id)
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn confirmation(&self) {
        let mut gate = self.gate.subscribe();
        // The sender lives as long as `self`, so this only ends when open.
        let _ = gate.wait_for(|open| *open).await;
    }

    fn record_of(state: &LedgerState, id: SessionId) -> SessionRecord {
        match state.sessions.get(&id.get()) {
            Some(stored) => SessionRecord::new(
                encode_session_id(id),
                stored.creator.clone(),
                stored.joiner.clone().unwrap_or_else(Address::zero),
                stored.joiner.is_some(),
            ),
            None => SessionRecord::vacant(),
        }
    }
}

/// One signer's connection to a [`MemoryLedger`].
#[derive(Debug, Clone)]
pub struct MemoryLedgerClient {
    ledger: MemoryLedger,
    signer: Address,
}

impl MemoryLedgerClient {
    /// The shared ledger behind this client.
    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }
}

#[async_trait::async_trait]
impl LedgerGateway for MemoryLedgerClient {
    fn signer(&self) -> &Address {
        &self.signer
    }

    #[instrument(skip(self), fields(signer = %self.signer))]
    async fn start_session(&self, stake: Stake) -> Result<Receipt, GatewayError> {
        self.ledger.confirmation().await;
        let mut state = self.ledger.lock();
        state.take_scripted_rejection()?;
        state.check_stake(stake)?;

        let id = SessionId::new(state.next_session);
        state.next_session = state
            .next_session
            .checked_add(1)
            .ok_or_else(|| GatewayError::new(REVERT_IDS_EXHAUSTED))?;
        state.sessions.insert(
            id.get(),
            StoredSession {
                creator: self.signer.clone(),
                joiner: None,
            },
        );

        let event = LedgerEvent::new(
            EventKind::SessionStarted,
            vec![encode_session_id(id), self.signer.to_string()],
        );
        state.broadcast(&event);
        info!(session_id = %id, "Session started on ledger");
        Ok(Receipt::new(state.transaction_hash(), vec![event]))
    }

    #[instrument(skip(self), fields(signer = %self.signer))]
    async fn join_session(&self, id: SessionId, stake: Stake) -> Result<Receipt, GatewayError> {
        self.ledger.confirmation().await;
        let mut state = self.ledger.lock();
        state.take_scripted_rejection()?;
        state.check_stake(stake)?;

        let stored = state
            .sessions
            .get_mut(&id.get())
            .ok_or_else(|| GatewayError::new(REVERT_UNKNOWN_SESSION))?;
        if stored.joiner.is_some() {
            return Err(GatewayError::new(REVERT_ALREADY_STARTED));
        }
        if stored.creator.same_account(&self.signer) {
            return Err(GatewayError::new(REVERT_OWN_SESSION));
        }
        stored.joiner = Some(self.signer.clone());

        let event = LedgerEvent::new(
            EventKind::JoinedSession,
            vec![encode_session_id(id), self.signer.to_string()],
        );
        state.broadcast(&event);
        info!(session_id = %id, "Session joined on ledger");
        Ok(Receipt::new(state.transaction_hash(), vec![event]))
    }

    #[instrument(skip(self), fields(signer = %self.signer))]
    async fn cancel_session(&self, id: SessionId) -> Result<Receipt, GatewayError> {
        self.ledger.confirmation().await;
        let mut state = self.ledger.lock();
        state.take_scripted_rejection()?;

        let stored = state
            .sessions
            .get(&id.get())
            .ok_or_else(|| GatewayError::new(REVERT_UNKNOWN_SESSION))?;
        if !stored.creator.same_account(&self.signer) {
            return Err(GatewayError::new(REVERT_NOT_CREATOR));
        }
        if stored.joiner.is_some() {
            return Err(GatewayError::new(REVERT_ALREADY_STARTED));
        }
        state.sessions.remove(&id.get());

        let event = LedgerEvent::new(EventKind::SessionCancelled, vec![encode_session_id(id)]);
        state.broadcast(&event);
        info!(session_id = %id, "Session cancelled on ledger");
        Ok(Receipt::new(state.transaction_hash(), vec![event]))
    }

    #[instrument(skip(self))]
    async fn read_session(&self, id: SessionId) -> Result<SessionRecord, GatewayError> {
        Ok(MemoryLedger::record_of(&self.ledger.lock(), id))
    }

    fn subscribe(&self, kind: EventKind) -> (SubscriptionId, EventStream) {
        let mut state = self.ledger.lock();
        state.next_subscription += 1;
        let id = SubscriptionId::from(state.next_subscription);
        let (sender, receiver) = mpsc::unbounded_channel();
        state.subscribers.push(Subscriber { id, kind, sender });
        debug!(%id, %kind, "Subscribed");
        (id, receiver)
    }

    fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) {
        let mut state = self.ledger.lock();
        state
            .subscribers
            .retain(|sub| !(sub.id == id && sub.kind == kind));
        debug!(%id, %kind, "Unsubscribed");
    }
}
