//! The one-slot holder for the machine's event subscription.

use crate::ledger::{EventKind, EventStream, LedgerEvent, LedgerGateway, SessionId, SubscriptionId};
use tracing::{debug, instrument};

/// An open registration on the ledger's event channel, bound to one session.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    session: SessionId,
    kind: EventKind,
    stream: EventStream,
}

impl SubscriptionHandle {
    /// Registration id at the gateway.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Session the subscription waits on.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Event kind subscribed to.
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

/// Holds at most one [`SubscriptionHandle`].
///
/// Opening while occupied releases the old handle first, so the gateway
/// never sees two live registrations from the same machine.
#[derive(Debug, Default)]
pub struct SubscriptionSlot {
    handle: Option<SubscriptionHandle>,
}

impl SubscriptionSlot {
    /// An empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// The live handle, if any.
    pub fn current(&self) -> Option<&SubscriptionHandle> {
        self.handle.as_ref()
    }

    /// True when a subscription is open.
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Opens a subscription for `kind` events concerning `session`.
    #[instrument(skip(self, gateway))]
    pub fn open<G>(&mut self, gateway: &G, session: SessionId, kind: EventKind)
    where
        G: LedgerGateway + ?Sized,
    {
        self.release(gateway);
        let (id, stream) = gateway.subscribe(kind);
        debug!(%id, "Subscription opened");
        self.handle = Some(SubscriptionHandle {
            id,
            session,
            kind,
            stream,
        });
    }

    /// Unsubscribes and empties the slot. Releasing an empty slot is a no-op.
    pub fn release<G>(&mut self, gateway: &G)
    where
        G: LedgerGateway + ?Sized,
    {
        if let Some(handle) = self.handle.take() {
            gateway.unsubscribe(handle.kind, handle.id);
            debug!(id = %handle.id, session_id = %handle.session, "Subscription released");
        }
    }

    /// Takes a buffered event without waiting.
    pub(crate) fn try_next(&mut self) -> Option<LedgerEvent> {
        self.handle.as_mut()?.stream.try_recv().ok()
    }

    /// Waits for the next event. `None` when the slot is empty or the
    /// stream has ended.
    pub(crate) async fn next(&mut self) -> Option<LedgerEvent> {
        self.handle.as_mut()?.stream.recv().await
    }
}
