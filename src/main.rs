//! Chat Backup Relay daemon
//!
//! CLI for resolving the backup chat and running the relay.

use anyhow::Context;
use chat_backup_relay::config::{Config, ResolveStrategy};
use chat_backup_relay::daemon;
use chat_backup_relay::health;
use chat_backup_relay::resolver::DestinationOrigin;
use chat_backup_relay::telegram::{self, TelegramBackend};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Pending events between the listener and the relay
const EVENT_QUEUE_SIZE: usize = 64;

/// Chat Backup Relay - copies a Telegram chat into a backup chat
#[derive(Parser)]
#[command(name = "chat-backup-relay")]
#[command(about = "Relay messages from one Telegram chat into a backup chat")]
struct Cli {
    /// Backup strategy: manual, create or scan (overrides BACKUP_STRATEGY)
    #[arg(long, global = true)]
    strategy: Option<ResolveStrategy>,

    /// Known backup chat id (overrides BACKUP_CHAT_ID)
    #[arg(long, global = true, allow_hyphen_values = true)]
    backup_chat: Option<i64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the backup chat and relay messages until interrupted (default)
    Run,

    /// Resolve the backup chat, print its id and exit
    Resolve,

    /// Verify the source and backup chats are reachable
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = Config::from_env().context("invalid configuration")?;
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }
    if let Some(backup_chat) = cli.backup_chat {
        config.backup_chat = Some(backup_chat);
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd_run(config).await,
        Commands::Resolve => cmd_resolve(&config).await,
        Commands::Check => cmd_check(&config).await,
    }
}

// ============================================================================
// CLI Commands
// ============================================================================

async fn cmd_resolve(config: &Config) -> anyhow::Result<()> {
    let backend = TelegramBackend::from_token(&config.bot_token);
    telegram::connect(&backend).await?;

    let destination = daemon::resolve_only(&backend, config).await?;
    println!("{}", destination.id);
    if let Some(link) = destination.invite_link {
        println!("{}", link);
    }
    Ok(())
}

async fn cmd_check(config: &Config) -> anyhow::Result<()> {
    let backend = TelegramBackend::from_token(&config.bot_token);
    telegram::connect(&backend).await?;

    daemon::check(&backend, config).await?;
    println!("OK");
    Ok(())
}

// ============================================================================
// Daemon
// ============================================================================

async fn cmd_run(config: Config) -> anyhow::Result<()> {
    info!("Chat backup relay starting");

    if let Some(port) = config.health_port {
        tokio::spawn(async move {
            if let Err(e) = health::serve(port).await {
                error!("Health endpoint stopped: {}", e);
            }
        });
    }

    let backend = Arc::new(TelegramBackend::from_token(&config.bot_token));
    telegram::connect(&backend).await?;

    let relay = daemon::start(backend.clone(), &config).await?;
    match &relay.destination().origin {
        DestinationOrigin::Reused { serial } => info!("Using backup chat #{}", serial),
        DestinationOrigin::Created { title } => info!("Using new backup chat '{}'", title),
        DestinationOrigin::Rejoined => info!("Using configured backup chat"),
        DestinationOrigin::BasicGroup => info!("Using fallback basic group"),
    }

    let (tx, rx) = mpsc::channel(EVENT_QUEUE_SIZE);
    let listener = tokio::spawn(telegram::run_listener(
        backend.bot().clone(),
        config.source_chat,
        tx,
    ));

    tokio::select! {
        _ = relay.run(rx) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    listener.abort();
    Ok(())
}
