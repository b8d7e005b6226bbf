//! Strictly Onchain - CLI
//!
//! Drives session machines against an in-memory ledger and exposes the id
//! codec.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use std::sync::Arc;
use strictly_onchain::{
    Address, ClientConfig, EventKind, LedgerConnection, LedgerEvent, MemoryConnector,
    MemoryLedger, MemoryLedgerClient, SessionMachine, SessionNotice, SnapshotStore,
    decode_session_id, encode_session_id, parse_session_id,
};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_SIGNER: &str = "0xA11CE00000000000000000000000000000000001";
const STRANGER: &str = "0x5752A4EE00000000000000000000000000000003";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::new(DEFAULT_SIGNER),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .init();

    match cli.command {
        Command::Simulate { opponent, first_id } => simulate(&config, opponent, first_id).await,
        Command::Encode { id } => {
            println!("{}", encode_session_id(parse_session_id(&id)?));
            Ok(())
        }
        Command::Decode { hex } => {
            println!("{}", decode_session_id(&hex)?);
            Ok(())
        }
    }
}

/// Plays a full session lifecycle between the configured signer and
/// `opponent`, printing every notice.
#[instrument(skip(config), fields(signer = %config.signer()))]
async fn simulate(config: &ClientConfig, opponent: String, first_id: u64) -> Result<()> {
    if let Some(ledger) = config.ledger_address() {
        info!(ledger = %ledger, "Simulating against in-memory stand-in");
    }
    let ledger = MemoryLedger::new(config.entry_stake()).with_next_session_id(first_id);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let creator = connect(&ledger, config.signer_address()).await?;
    let joiner = connect(&ledger, Address::new(opponent)).await?;
    let stranger = connect(&ledger, Address::new(STRANGER)).await?;

    let mut player_one =
        SessionMachine::with_stake(creator, config.entry_stake()).with_notices(tx.clone());
    let mut player_two =
        SessionMachine::with_stake(joiner, config.entry_stake()).with_notices(tx.clone());
    let mut observer = SessionMachine::with_stake(stranger, config.entry_stake()).with_notices(tx);

    let id = player_one.start_session().await?;
    print_notices("Player-1", &mut rx);

    // Another session's join, sharing the broadcast channel.
    ledger.emit(LedgerEvent::new(
        EventKind::JoinedSession,
        vec![encode_session_id(id.get().wrapping_add(1000).into()), STRANGER.to_string()],
    ));
    player_one.pump_events();
    println!("after foreign event: phase = {}", player_one.phase());

    player_two.join_session(&id.to_string()).await?;
    print_notices("Player-2", &mut rx);

    player_one.wait_for_opponent().await?;
    print_notices("Player-1", &mut rx);

    // A redelivery of the join must change nothing.
    ledger.emit(LedgerEvent::new(
        EventKind::JoinedSession,
        vec![encode_session_id(id), STRANGER.to_string()],
    ));
    let verdict = player_one.apply_event(&LedgerEvent::new(
        EventKind::JoinedSession,
        vec![encode_session_id(id)],
    ));
    println!("redelivered join: {:?}", verdict);

    if let Err(err) = observer.view_session(&id.to_string()).await {
        warn!(error = %err, "Observer view refused");
    }
    print_notices("Observer", &mut rx);

    let store = config.snapshot_path().as_ref().map(SnapshotStore::new);
    if let Some(store) = &store {
        store.sync(player_one.snapshot().as_ref())?;
        resume_from(store, &ledger, config).await?;
    }

    // Start over and cancel before anyone joins.
    player_one.start_new_session().await?;
    if let Some(store) = &store {
        store.sync(player_one.snapshot().as_ref())?;
    }
    player_one.cancel_session().await?;
    if let Some(store) = &store {
        store.sync(player_one.snapshot().as_ref())?;
    }
    print_notices("Player-1", &mut rx);

    println!(
        "final: player one = {}, player two = {}",
        player_one.phase(),
        player_two.phase()
    );
    Ok(())
}

/// Restarts the configured signer's client from the stored snapshot.
#[instrument(skip_all, fields(path = %store.path().display()))]
async fn resume_from(
    store: &SnapshotStore,
    ledger: &MemoryLedger,
    config: &ClientConfig,
) -> Result<()> {
    let Some(snapshot) = store.load()? else {
        return Ok(());
    };
    let gateway = connect(ledger, config.signer_address()).await?;
    let mut restarted = SessionMachine::with_stake(gateway, config.entry_stake());
    let id = restarted.resume(&snapshot).await?;
    println!(
        "resumed session {id} as {} from {}",
        restarted.phase(),
        store.path().display()
    );
    Ok(())
}

async fn connect(ledger: &MemoryLedger, signer: Address) -> Result<Arc<MemoryLedgerClient>> {
    let mut connection = LedgerConnection::new();
    let gateway = connection
        .connect(&MemoryConnector::new(ledger.clone(), signer))
        .await?;
    Ok(gateway)
}

fn print_notices(who: &str, rx: &mut mpsc::UnboundedReceiver<SessionNotice>) {
    while let Ok(notice) = rx.try_recv() {
        match notice {
            SessionNotice::ShareSessionId(id) => {
                println!("[{who}] Share session id {id} with the other player")
            }
            SessionNotice::CancelAvailable(_) => {
                println!("[{who}] You can cancel until the other player joins")
            }
            SessionNotice::OpponentJoined(_) => {
                println!("[{who}] Player-2 has joined. Let's start!")
            }
            SessionNotice::JoinedAsPlayerTwo(_) => {
                println!("[{who}] Player-1 is already here. Let's start!")
            }
            SessionNotice::Cancelled(id) => println!("[{who}] Session {id} cancelled"),
            SessionNotice::Viewing { id, role } => {
                println!("[{who}] Viewing session {id} as {role}")
            }
            SessionNotice::Failed(reason) => println!("[{who}] Error: {reason}"),
        }
    }
}
