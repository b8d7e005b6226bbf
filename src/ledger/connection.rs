//! Lifecycle of a gateway handle: connect, ready, torn down.

use super::gateway::LedgerGateway;
use super::memory::{MemoryLedger, MemoryLedgerClient};
use super::types::{Address, GatewayError};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Produces a connected gateway, e.g. by asking a wallet for its accounts.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Gateway type this connector yields.
    type Gateway: LedgerGateway;

    /// Establishes the connection.
    async fn connect(&self) -> Result<Self::Gateway, GatewayError>;
}

/// Where a [`LedgerConnection`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ConnectionState {
    /// No gateway yet.
    Disconnected,
    /// A gateway is available.
    Ready,
    /// The gateway was released and cannot be reused.
    TornDown,
}

/// Owner of the gateway handle handed to session machines.
#[derive(Debug)]
pub struct LedgerConnection<G> {
    gateway: Option<Arc<G>>,
    state: ConnectionState,
}

impl<G: LedgerGateway> LedgerConnection<G> {
    /// Creates a disconnected handle.
    pub fn new() -> Self {
        Self {
            gateway: None,
            state: ConnectionState::Disconnected,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Connects through `connector`. A failed attempt leaves the handle
    /// disconnected; connecting a torn-down handle is refused.
    #[instrument(skip_all, fields(state = %self.state))]
    pub async fn connect<C>(&mut self, connector: &C) -> Result<Arc<G>, GatewayError>
    where
        C: Connector<Gateway = G>,
    {
        match self.state {
            ConnectionState::Ready => {
                if let Some(gateway) = &self.gateway {
                    return Ok(Arc::clone(gateway));
                }
            }
            ConnectionState::TornDown => {
                warn!("Connect attempted after tear-down");
                return Err(GatewayError::new("Connection has been torn down"));
            }
            ConnectionState::Disconnected => {}
        }

        let gateway = Arc::new(connector.connect().await?);
        info!(signer = %gateway.signer(), "Ledger connection ready");
        self.gateway = Some(Arc::clone(&gateway));
        self.state = ConnectionState::Ready;
        Ok(gateway)
    }

    /// The connected gateway, if ready.
    pub fn gateway(&self) -> Option<Arc<G>> {
        self.gateway.clone()
    }

    /// Releases the gateway. Machines still holding a clone keep it alive
    /// until they are dropped.
    #[instrument(skip(self))]
    pub fn tear_down(&mut self) {
        self.gateway = None;
        self.state = ConnectionState::TornDown;
        info!("Ledger connection torn down");
    }
}

impl<G: LedgerGateway> Default for LedgerConnection<G> {
    fn default() -> Self {
        Self::new()
    }
}

/// Connects a fixed signer to a [`MemoryLedger`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    ledger: MemoryLedger,
    signer: Address,
}

impl MemoryConnector {
    /// Creates a connector for `signer` on `ledger`.
    pub fn new(ledger: MemoryLedger, signer: Address) -> Self {
        Self { ledger, signer }
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    type Gateway = MemoryLedgerClient;

    async fn connect(&self) -> Result<MemoryLedgerClient, GatewayError> {
        if self.signer.is_zero() {
            return Err(GatewayError::new("No account available to sign with"));
        }
        Ok(self.ledger.client(self.signer.clone()))
    }
}
