//! The ledger collaborator as seen by the session core.

use super::types::{
    Address, EventKind, EventStream, GatewayError, Receipt, SessionId, SessionRecord, Stake,
    SubscriptionId,
};

/// Remote, authoritative store of game sessions.
///
/// Mutating calls resolve once the call is confirmed or rejected; there is no
/// client-side timeout. Events are broadcast at least once to every
/// subscriber of a kind and are not filtered by session id.
#[async_trait::async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Address of the identity signing calls through this gateway.
    fn signer(&self) -> &Address;

    /// Creates a session, paying `stake`. The receipt carries a
    /// [`EventKind::SessionStarted`] log.
    async fn start_session(&self, stake: Stake) -> Result<Receipt, GatewayError>;

    /// Joins session `id`, paying `stake`. The receipt carries a
    /// [`EventKind::JoinedSession`] log.
    async fn join_session(&self, id: SessionId, stake: Stake) -> Result<Receipt, GatewayError>;

    /// Cancels session `id` before a second participant joins.
    async fn cancel_session(&self, id: SessionId) -> Result<Receipt, GatewayError>;

    /// Reads the stored record for `id`.
    async fn read_session(&self, id: SessionId) -> Result<SessionRecord, GatewayError>;

    /// Registers for every future event of `kind`.
    fn subscribe(&self, kind: EventKind) -> (SubscriptionId, EventStream);

    /// Drops a registration made by [`LedgerGateway::subscribe`].
    fn unsubscribe(&self, kind: EventKind, id: SubscriptionId);
}
