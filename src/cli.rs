//! Command-line interface for four_in_a_row.

use clap::{Parser, Subcommand};

/// Four in a Row - real-time game server with matchmaking and a bot opponent
#[derive(Parser, Debug)]
#[command(name = "four_in_a_row")]
#[command(about = "Real-time four-in-a-row game server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the game server
    Serve {
        /// Optional TOML config file
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,

        /// Host to bind to (overrides config and HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Path to the SQLite database (overrides config and DATABASE_URL)
        #[arg(long)]
        db: Option<String>,

        /// Run without persistence
        #[arg(long)]
        no_db: bool,
    },

    /// Create the database tables and exit
    InitDb {
        /// Path to the SQLite database
        #[arg(long)]
        db: Option<String>,
    },
}
