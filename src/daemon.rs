//! Startup sequence shared by the CLI commands

use crate::backend::MessagingBackend;
use crate::config::{Config, ResolveStrategy};
use crate::error::{Error, Result};
use crate::relay::Relay;
use crate::resolver::{Destination, Resolver, ResolverSettings};
use crate::senders::IgnoreList;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Steps printed when no backup chat could be established
pub const MANUAL_STEPS: &[&str] = &[
    "1. Create a channel manually",
    "2. Add the bot as admin",
    "3. Set BACKUP_CHAT_ID to its ID (-100 prefix)",
];

/// Reject configurations the backend cannot satisfy before any request is made
pub fn check_capabilities<B: MessagingBackend + ?Sized>(
    backend: &B,
    config: &Config,
) -> Result<()> {
    let capabilities = backend.capabilities();

    if !capabilities.can_create_chats() && config.backup_chat.is_none() {
        return Err(Error::Config(
            "BACKUP_CHAT_ID is required: this account cannot create backup chats".to_string(),
        ));
    }

    if config.strategy != ResolveStrategy::ManualId && !capabilities.create_conversations {
        warn!(
            "Strategy '{}' needs an account that can create chats, using BACKUP_CHAT_ID instead",
            config.strategy
        );
    }

    Ok(())
}

/// Confirm the source chat is reachable
pub async fn verify_source<B: MessagingBackend + ?Sized>(
    backend: &B,
    config: &Config,
) -> Result<()> {
    match backend.verify(config.source_chat).await {
        Ok(()) => {
            info!("Source chat verified ({})", config.source_chat);
            Ok(())
        }
        Err(e) => {
            error!("Source chat error: {}", e);
            Err(Error::LookupFailed(format!("source chat {}: {}", config.source_chat, e)))
        }
    }
}

/// Verify the source and resolve the backup chat, without building a relay
pub async fn resolve_only<B: MessagingBackend + ?Sized>(
    backend: &B,
    config: &Config,
) -> Result<Destination> {
    check_capabilities(backend, config)?;
    verify_source(backend, config).await?;

    let resolver = Resolver::new(backend, ResolverSettings::from(config));
    match resolver.resolve().await {
        Ok(destination) => Ok(destination),
        Err(e) => {
            error!("Failed to establish backup chat: {}", e);
            if matches!(e, Error::ResolutionExhausted) {
                info!("Manual solution:");
                for step in MANUAL_STEPS {
                    info!("{}", step);
                }
            }
            Err(e)
        }
    }
}

/// Full startup: verify, resolve, then build the relay. No relay exists unless
/// resolution succeeded.
pub async fn start<B: MessagingBackend + ?Sized>(
    backend: Arc<B>,
    config: &Config,
) -> Result<Relay<B>> {
    let destination = resolve_only(backend.as_ref(), config).await?;
    Ok(Relay::new(
        backend,
        config.source_chat,
        destination,
        IgnoreList::new(&config.ignored_senders),
    ))
}

/// Check that both the source and the configured backup chat are reachable
pub async fn check<B: MessagingBackend + ?Sized>(backend: &B, config: &Config) -> Result<()> {
    verify_source(backend, config).await?;

    if let Some(backup) = config.backup_chat {
        backend
            .verify(backup)
            .await
            .map_err(|e| Error::LookupFailed(format!("backup chat {}: {}", backup, e)))?;
        info!("Backup chat verified ({})", backup);
    }

    Ok(())
}
