//! Tests for viewing, cancelling, resetting and single-flight discipline.

use std::sync::Arc;
use std::time::Duration;

use strictly_onchain::{
    Address, ENTRY_STAKE, EventKind, EventStream, GatewayError, LedgerEvent, LedgerGateway,
    MemoryLedger, MemoryLedgerClient, PendingMutation, REVERT_ALREADY_STARTED, Receipt, Role,
    SessionError, SessionId, SessionMachine, SessionPhase, SessionRecord, Stake, SubscriptionId,
};
use tokio::sync::mpsc;

const ALICE: &str = "0xA11CE00000000000000000000000000000000001";
const BOB: &str = "0xB0B0000000000000000000000000000000000002";
const MALLORY: &str = "0x3A11020000000000000000000000000000000004";

fn machine(ledger: &MemoryLedger, signer: &str) -> SessionMachine<MemoryLedgerClient> {
    SessionMachine::new(Arc::new(ledger.client(Address::new(signer))))
}

/// Starts a session for alice and has bob join it.
async fn started_pair(
    ledger: &MemoryLedger,
) -> (
    SessionMachine<MemoryLedgerClient>,
    SessionMachine<MemoryLedgerClient>,
) {
    let mut alice = machine(ledger, ALICE);
    let mut bob = machine(ledger, BOB);
    let id = alice.start_session().await.expect("start failed");
    bob.join_session(&id.to_string()).await.expect("join failed");
    alice.pump_events();
    (alice, bob)
}

// ─────────────────────────────────────────────────────────────
//  View
// ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_view_by_stranger_is_denied() {
    let ledger = MemoryLedger::new(ENTRY_STAKE).with_next_session_id(3);
    let _pair = started_pair(&ledger).await;
    let mut mallory = machine(&ledger, MALLORY);

    let result = mallory.view_session("3").await;

    assert_eq!(
        result,
        Err(SessionError::PermissionDenied(Address::new(MALLORY)))
    );
    assert_eq!(mallory.phase(), SessionPhase::Empty);
    assert_eq!(mallory.pending(), None);
}

#[tokio::test]
async fn test_view_of_unknown_session_is_denied() {
    let ledger = MemoryLedger::new(ENTRY_STAKE);
    let mut alice = machine(&ledger, ALICE);

    assert!(matches!(
        alice.view_session("42").await,
        Err(SessionError::PermissionDenied(_))
    ));
    assert_eq!(alice.phase(), SessionPhase::Empty);
}

#[tokio::test]
async fn test_zero_signer_cannot_view_vacant_record() {
    let ledger = MemoryLedger::new(ENTRY_STAKE);
    let mut nobody = SessionMachine::new(Arc::new(ledger.client(Address::zero())));

    assert_eq!(
        nobody.view_session("42").await,
        Err(SessionError::PermissionDenied(Address::zero()))
    );
    assert_eq!(nobody.phase(), SessionPhase::Empty);
    assert!(!nobody.can_cancel());
    assert_eq!(ledger.subscriber_count(EventKind::JoinedSession), 0);
}

#[tokio::test]
async fn test_view_by_participants_derives_roles() {
    let ledger = MemoryLedger::new(ENTRY_STAKE).with_next_session_id(3);
    let _pair = started_pair(&ledger).await;

    let mut alice_elsewhere = machine(&ledger, ALICE);
    alice_elsewhere.view_session("3").await.expect("view failed");
    assert_eq!(alice_elsewhere.view().role(), Some(Role::PlayerOne));
    assert_eq!(alice_elsewhere.phase(), SessionPhase::ReadOnlyActive);
    assert!(alice_elsewhere.is_active());
    assert!(!alice_elsewhere.can_cancel());

    // Address comparison ignores case.
    let mut bob_lowercase = machine(&ledger, &BOB.to_lowercase());
    bob_lowercase.view_session("3").await.expect("view failed");
    assert_eq!(bob_lowercase.view().role(), Some(Role::PlayerTwo));
    assert_eq!(bob_lowercase.view().id(), Some(SessionId::new(3)));
}

#[tokio::test]
async fn test_view_of_unstarted_session_awaits_opponent() {
    let ledger = MemoryLedger::new(ENTRY_STAKE).with_next_session_id(11);
    let mut alice = machine(&ledger, ALICE);
    let mut bob = machine(&ledger, BOB);
    alice.start_session().await.expect("start failed");

    let mut alice_elsewhere = machine(&ledger, ALICE);
    alice_elsewhere.view_session("11").await.expect("view failed");
    assert_eq!(alice_elsewhere.phase(), SessionPhase::AwaitingOpponent);
    assert!(alice_elsewhere.can_cancel());
    assert!(alice_elsewhere.subscription().is_open());

    bob.join_session("11").await.expect("join failed");
    let id = tokio::time::timeout(Duration::from_secs(1), alice_elsewhere.wait_for_opponent())
        .await
        .expect("timed out")
        .expect("wait failed");
    assert_eq!(id, SessionId::new(11));
    assert_eq!(alice_elsewhere.phase(), SessionPhase::ReadOnlyActive);
}

// ─────────────────────────────────────────────────────────────
//  Cancel
// ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_cancel_resets_view() {
    let ledger = MemoryLedger::new(ENTRY_STAKE).with_next_session_id(5);
    let mut alice = machine(&ledger, ALICE);
    alice.start_session().await.expect("start failed");

    alice.cancel_session().await.expect("cancel failed");

    assert_eq!(alice.phase(), SessionPhase::Empty);
    assert!(!alice.can_cancel());
    assert!(!alice.subscription().is_open());
    assert_eq!(ledger.subscriber_count(EventKind::JoinedSession), 0);
    assert_eq!(ledger.record(SessionId::new(5)), SessionRecord::vacant());
}

#[tokio::test]
async fn test_cancel_outside_awaiting_is_invalid() {
    let ledger = MemoryLedger::new(ENTRY_STAKE);
    let mut idle = machine(&ledger, ALICE);
    assert!(matches!(
        idle.cancel_session().await,
        Err(SessionError::InvalidState(_))
    ));

    let (mut alice, mut bob) = started_pair(&ledger).await;
    for player in [&mut alice, &mut bob] {
        assert!(!player.can_cancel());
        assert!(matches!(
            player.cancel_session().await,
            Err(SessionError::InvalidState(_))
        ));
        assert!(player.is_active());
    }
}

#[tokio::test]
async fn test_rejected_cancel_keeps_state() {
    let ledger = MemoryLedger::new(ENTRY_STAKE);
    let mut alice = machine(&ledger, ALICE);
    let id = alice.start_session().await.expect("start failed");

    // Bob's join lands on the ledger before alice has seen the event.
    let mut bob = machine(&ledger, BOB);
    bob.join_session(&id.to_string()).await.expect("join failed");

    let result = alice.cancel_session().await;
    assert_eq!(
        result,
        Err(SessionError::CallRejected(REVERT_ALREADY_STARTED.to_string()))
    );
    assert_eq!(alice.phase(), SessionPhase::AwaitingOpponent);
    assert!(alice.subscription().is_open());

    // The buffered event then settles the view.
    assert!(alice.pump_events());
    assert!(alice.is_active());
}

// ─────────────────────────────────────────────────────────────
//  Reset and predicates
// ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_reset_is_idempotent() {
    let ledger = MemoryLedger::new(ENTRY_STAKE);
    let mut alice = machine(&ledger, ALICE);
    alice.reset().expect("reset failed");
    assert_eq!(alice.phase(), SessionPhase::Empty);

    alice.start_session().await.expect("start failed");
    alice.reset().expect("reset failed");
    alice.reset().expect("reset failed");

    assert_eq!(alice.phase(), SessionPhase::Empty);
    assert_eq!(alice.view().id(), None);
    assert_eq!(alice.view().role(), None);
    assert!(!alice.view().other_present());
    assert!(!alice.subscription().is_open());
    assert_eq!(ledger.subscriber_count(EventKind::JoinedSession), 0);
}

#[tokio::test]
async fn test_can_cancel_iff_tracked_and_alone() {
    let ledger = MemoryLedger::new(ENTRY_STAKE);
    let mut alice = machine(&ledger, ALICE);
    let mut bob = machine(&ledger, BOB);

    let check = |m: &SessionMachine<MemoryLedgerClient>| {
        let expected = m.view().id().is_some() && !m.view().other_present();
        assert_eq!(m.can_cancel(), expected);
        assert_eq!(
            m.is_active(),
            m.view().id().is_some() && m.view().other_present()
        );
    };

    check(&alice);
    let id = alice.start_session().await.expect("start failed");
    check(&alice);
    bob.join_session(&id.to_string()).await.expect("join failed");
    check(&bob);
    alice.pump_events();
    check(&alice);
    alice.reset().expect("reset failed");
    check(&alice);
}

#[tokio::test]
async fn test_dropping_machine_releases_subscription() {
    let ledger = MemoryLedger::new(ENTRY_STAKE);
    {
        let mut alice = machine(&ledger, ALICE);
        alice.start_session().await.expect("start failed");
        assert_eq!(ledger.subscriber_count(EventKind::JoinedSession), 1);
    }
    assert_eq!(ledger.subscriber_count(EventKind::JoinedSession), 0);
}

// ─────────────────────────────────────────────────────────────
//  Single flight
// ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pending_call_blocks_other_operations() {
    let ledger = MemoryLedger::new(ENTRY_STAKE);
    let mut alice = machine(&ledger, ALICE);
    ledger.hold_confirmations();

    let outcome = tokio::time::timeout(Duration::from_millis(20), alice.start_session()).await;
    assert!(outcome.is_err(), "start should still be pending");
    assert_eq!(alice.pending(), Some(PendingMutation::Start));

    let busy: Result<SessionId, SessionError> = Err(SessionError::Busy(PendingMutation::Start));
    assert_eq!(alice.join_session("0").await, busy.clone());
    assert_eq!(alice.view_session("0").await, busy.clone());
    assert_eq!(alice.reset(), Err(SessionError::Busy(PendingMutation::Start)));
    assert_eq!(alice.phase(), SessionPhase::Empty);

    ledger.release_confirmations();
    assert_eq!(alice.abandon_pending(), Some(PendingMutation::Start));
    assert_eq!(alice.abandon_pending(), None);
    alice.reset().expect("reset failed");
    assert_eq!(alice.phase(), SessionPhase::Empty);
}

#[tokio::test]
async fn test_held_confirmation_completes_when_released() {
    let ledger = MemoryLedger::new(ENTRY_STAKE).with_next_session_id(7);
    let gateway = Arc::new(ledger.client(Address::new(ALICE)));
    let mut alice = SessionMachine::new(gateway);
    ledger.hold_confirmations();

    let releaser = {
        let ledger = ledger.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ledger.release_confirmations();
        })
    };

    let id = alice.start_session().await.expect("start failed");
    releaser.await.expect("releaser panicked");
    assert_eq!(id, SessionId::new(7));
    assert_eq!(alice.pending(), None);
    assert_eq!(alice.phase(), SessionPhase::AwaitingOpponent);
}

// ─────────────────────────────────────────────────────────────
//  Receipt decoding
// ─────────────────────────────────────────────────────────────

/// Gateway whose receipts and reads return whatever it is built with.
#[derive(Debug)]
struct ScriptedReceipts {
    signer: Address,
    logs: Vec<LedgerEvent>,
    record: SessionRecord,
}

#[async_trait::async_trait]
impl LedgerGateway for ScriptedReceipts {
    fn signer(&self) -> &Address {
        &self.signer
    }

    async fn start_session(&self, _stake: Stake) -> Result<Receipt, GatewayError> {
        Ok(Receipt::new("0x1".to_string(), self.logs.clone()))
    }

    async fn join_session(&self, _id: SessionId, _stake: Stake) -> Result<Receipt, GatewayError> {
        Ok(Receipt::new("0x2".to_string(), self.logs.clone()))
    }

    async fn cancel_session(&self, _id: SessionId) -> Result<Receipt, GatewayError> {
        Ok(Receipt::new("0x3".to_string(), vec![]))
    }

    async fn read_session(&self, _id: SessionId) -> Result<SessionRecord, GatewayError> {
        Ok(self.record.clone())
    }

    fn subscribe(&self, _kind: EventKind) -> (SubscriptionId, EventStream) {
        let (_tx, rx) = mpsc::unbounded_channel();
        (SubscriptionId::from(1), rx)
    }

    fn unsubscribe(&self, _kind: EventKind, _id: SubscriptionId) {}
}

#[tokio::test]
async fn test_oversized_session_id_is_detected() {
    let huge = format!("0x1{}", "0".repeat(16));
    let gateway = Arc::new(ScriptedReceipts {
        signer: Address::new(ALICE),
        logs: vec![LedgerEvent::new(EventKind::SessionStarted, vec![huge.clone()])],
        record: SessionRecord::vacant(),
    });
    let mut alice = SessionMachine::new(gateway);

    assert_eq!(
        alice.start_session().await,
        Err(SessionError::DecodeOverflow(huge))
    );
    assert_eq!(alice.phase(), SessionPhase::Empty);
    assert!(!alice.subscription().is_open());
}

#[tokio::test]
async fn test_receipt_without_log_commits_nothing() {
    let gateway = Arc::new(ScriptedReceipts {
        signer: Address::new(BOB),
        logs: vec![LedgerEvent::new(EventKind::SessionStarted, vec!["0x4".to_string()])],
        record: SessionRecord::vacant(),
    });
    let mut bob = SessionMachine::new(gateway);

    assert_eq!(
        bob.join_session("4").await,
        Err(SessionError::MissingReceiptLog(EventKind::JoinedSession))
    );
    assert_eq!(bob.phase(), SessionPhase::Empty);
}

#[tokio::test]
async fn test_view_rejects_record_for_another_session() {
    let gateway = Arc::new(ScriptedReceipts {
        signer: Address::new(ALICE),
        logs: vec![],
        record: SessionRecord::new(
            "0x9".to_string(),
            Address::new(ALICE),
            Address::zero(),
            false,
        ),
    });
    let mut alice = SessionMachine::new(gateway);

    assert!(matches!(
        alice.view_session("4").await,
        Err(SessionError::CallRejected(_))
    ));
    assert_eq!(alice.phase(), SessionPhase::Empty);
    assert!(!alice.can_cancel());
    assert!(!alice.subscription().is_open());
}

#[tokio::test]
async fn test_machine_accepts_trait_object_gateway() {
    let ledger = MemoryLedger::new(ENTRY_STAKE);
    let gateway: Arc<dyn LedgerGateway> = Arc::new(ledger.client(Address::new(ALICE)));
    let mut alice = SessionMachine::new(gateway);
    alice.start_session().await.expect("start failed");
    assert!(alice.can_cancel());
}
