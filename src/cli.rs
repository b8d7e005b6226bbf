//! Command-line interface for strictly_onchain.

use clap::{Parser, Subcommand};

/// Strictly Onchain - session coordinator for ledger-hosted games
#[derive(Parser, Debug)]
#[command(name = "strictly_onchain")]
#[command(about = "Client-side session coordinator for ledger-hosted games", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the client configuration file
    #[arg(short, long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play out a session between two clients on an in-memory ledger
    Simulate {
        /// Address of the second client
        #[arg(long, default_value = "0xB0B0000000000000000000000000000000000002")]
        opponent: String,

        /// First session id the ledger issues
        #[arg(long, default_value = "0")]
        first_id: u64,
    },

    /// Encode a session id in the ledger's hexadecimal form
    Encode {
        /// Decimal session id
        id: String,
    },

    /// Decode a ledger-encoded hexadecimal session id
    Decode {
        /// Hexadecimal session id, optionally 0x-prefixed
        hex: String,
    },
}
