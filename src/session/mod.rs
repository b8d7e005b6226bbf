//! Game-session state machine and its event reconciliation.

mod contracts;
mod error;
mod machine;
mod reconciler;
mod subscription;
mod view;

pub use contracts::{
    CancelContract, Contract, EnterContract, Guarded, ResetContract, StartContract,
    SubscriptionMatchesPhase, ViewConsistent,
};
pub use error::{PendingMutation, SessionError};
pub use machine::SessionMachine;
pub use reconciler::{EventReconciler, Reconciliation};
pub use subscription::{SubscriptionHandle, SubscriptionSlot};
pub use view::{Role, SessionPhase, SessionView};
