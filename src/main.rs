//! Four in a Row - server binary
//!
//! Loads configuration, prepares the database and serves WebSocket play.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use four_in_a_row::{
    Analytics, GameRepository, Orchestrator, OrchestratorSettings, ServerConfig, TracingSink,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,four_in_a_row=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            host,
            port,
            db,
            no_db,
        } => run_server(config, host, port, db, no_db).await,
        Command::InitDb { db } => init_db(db),
    }
}

/// Resolves configuration: defaults, then file, then environment.
fn load_config(path: Option<PathBuf>) -> Result<ServerConfig> {
    let config = match path {
        Some(path) => ServerConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServerConfig::default(),
    };
    Ok(config.apply_env()?)
}

/// Run the game server
#[instrument(skip_all)]
async fn run_server(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    db: Option<String>,
    no_db: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?.with_bind(host, port);
    if let Some(db) = db {
        config = config.with_database_url(db);
    }
    info!(?config, "Starting Four in a Row server");

    let repository = if no_db {
        warn!("Persistence disabled");
        None
    } else {
        let repository = GameRepository::new(config.database_url().clone())?;
        repository
            .ensure_schema()
            .context("database initialization failed")?;
        Some(repository)
    };

    let analytics = if *config.analytics_enabled() {
        Analytics::new(Arc::new(TracingSink))
    } else {
        Analytics::disabled()
    };

    let orchestrator =
        Orchestrator::new(OrchestratorSettings::from(&config), analytics, repository);

    let shutdown = CancellationToken::new();
    let sweeper = orchestrator
        .matchmaking()
        .spawn_sweeper(config.sweep_interval(), shutdown.child_token());

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("binding {}", config.bind_address()))?;
    info!(address = %config.bind_address(), "WebSocket endpoint at /ws");

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        signal.cancel();
    });

    four_in_a_row::serve(listener, orchestrator, shutdown.clone()).await?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        warn!(error = %e, "Sweeper task failed");
    }
    info!("Server stopped");
    Ok(())
}

/// Create the schema and exit
#[instrument]
fn init_db(db: Option<String>) -> Result<()> {
    let mut config = ServerConfig::default().apply_env()?;
    if let Some(db) = db {
        config = config.with_database_url(db);
    }
    let repository = GameRepository::new(config.database_url().clone())?;
    repository.ensure_schema()?;
    info!(path = %config.database_url(), "Database initialized");
    Ok(())
}
