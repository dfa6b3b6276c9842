//! Backup chat resolution
//!
//! Runs once at startup and decides which chat receives relayed messages.
//! Steps are tried in a fixed order: reuse a numbered backup chat (scan
//! strategy only), create a new one, rejoin the configured chat id, and
//! finally create a basic group. A flood wait at any step aborts resolution.
//! Steps the backend has no capability for are skipped without a request.

use crate::backend::{Conversation, ConversationId, MessagingBackend};
use crate::config::{Config, ResolveStrategy};
use crate::error::{BackendError, Error, Result};
use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

/// Numbered backup chat titles, e.g. "💾 Message Backup Channel #3 (2024-05-01)"
static SERIAL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bBackup\b.*?#(\d+)").expect("Invalid serial regex"));

/// How the destination was obtained
#[derive(Debug, Clone, PartialEq)]
pub enum DestinationOrigin {
    Reused { serial: u32 },
    Created { title: String },
    Rejoined,
    BasicGroup,
}

/// The resolved backup chat
#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    pub id: ConversationId,
    pub origin: DestinationOrigin,
    pub invite_link: Option<String>,
}

/// Inputs for a resolution run
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub strategy: ResolveStrategy,
    pub known_destination: Option<ConversationId>,
    pub title: String,
    pub about: String,
    pub fallback_title: String,
}

impl From<&Config> for ResolverSettings {
    fn from(config: &Config) -> Self {
        Self {
            strategy: config.strategy,
            known_destination: config.backup_chat,
            title: config.backup_title.clone(),
            about: config.backup_about.clone(),
            fallback_title: config.fallback_group_title.clone(),
        }
    }
}

pub struct Resolver<'a, B: ?Sized> {
    backend: &'a B,
    settings: ResolverSettings,
}

impl<'a, B: MessagingBackend + ?Sized> Resolver<'a, B> {
    pub fn new(backend: &'a B, settings: ResolverSettings) -> Self {
        Self { backend, settings }
    }

    /// Resolve using today's date for new chat titles
    pub async fn resolve(&self) -> Result<Destination> {
        self.resolve_on(Utc::now().date_naive()).await
    }

    pub async fn resolve_on(&self, today: NaiveDate) -> Result<Destination> {
        info!("Resolving backup chat (strategy: {})", self.settings.strategy);

        let capabilities = self.backend.capabilities();
        let mut next_serial = None;

        if self.settings.strategy == ResolveStrategy::ScanAndReuse {
            let (latest, highest) = self.scan().await?;
            if let Some((conversation, serial)) = latest {
                match self.backend.join(conversation.id).await {
                    Ok(()) => {
                        info!(
                            "Reusing backup chat '{}' (ID: {})",
                            conversation.title, conversation.id
                        );
                        return Ok(Destination {
                            id: conversation.id,
                            origin: DestinationOrigin::Reused { serial },
                            invite_link: None,
                        });
                    }
                    Err(e) => {
                        abort_on_flood_wait(&e)?;
                        warn!("Couldn't rejoin backup chat {}: {}", conversation.id, e);
                    }
                }
            }
            next_serial = Some(highest.saturating_add(1));
        }

        let wants_creation = self.settings.strategy != ResolveStrategy::ManualId;
        if wants_creation && !capabilities.create_conversations {
            info!("Account cannot create chats, skipping creation");
        } else if wants_creation {
            let title = backup_title(&self.settings.title, next_serial, today);
            match self.create(&title).await {
                Ok(destination) => return Ok(destination),
                Err(Error::RateLimited { wait_secs }) => {
                    warn!("Flood wait: please wait {} seconds before trying again", wait_secs);
                    return Err(Error::RateLimited { wait_secs });
                }
                Err(e) => {
                    warn!("{}", e);
                    info!("Trying fallback solutions...");
                }
            }
        }

        if let Some(known) = self.settings.known_destination {
            match self.backend.join(known).await {
                Ok(()) => {
                    info!("Joined existing backup chat (ID: {})", known);
                    return Ok(Destination {
                        id: known,
                        origin: DestinationOrigin::Rejoined,
                        invite_link: None,
                    });
                }
                Err(e) => {
                    abort_on_flood_wait(&e)?;
                    warn!("Couldn't join existing backup chat {}: {}", known, e);
                }
            }
        }

        if !capabilities.create_basic_groups {
            warn!("Account cannot create groups, no backup chat available");
            return Err(Error::ResolutionExhausted);
        }

        info!("Attempting to create basic group '{}'", self.settings.fallback_title);
        match self.backend.create_basic_group(&self.settings.fallback_title).await {
            Ok(id) => {
                info!("Basic group created (ID: {})", id);
                Ok(Destination {
                    id,
                    origin: DestinationOrigin::BasicGroup,
                    invite_link: None,
                })
            }
            Err(e) => {
                abort_on_flood_wait(&e)?;
                warn!("Basic group creation failed: {}", e);
                Err(Error::ResolutionExhausted)
            }
        }
    }

    /// Find the highest numbered backup chat. Returns it (if any) and the
    /// highest serial seen, 0 when none.
    async fn scan(&self) -> Result<(Option<(Conversation, u32)>, u32)> {
        if !self.backend.capabilities().list_conversations {
            info!("Account cannot list chats, assuming no backup exists");
            return Ok((None, 0));
        }

        let conversations = match self.backend.list_conversations().await {
            Ok(c) => c,
            Err(e) => {
                abort_on_flood_wait(&e)?;
                warn!("Couldn't list chats, assuming no backup exists: {}", e);
                return Ok((None, 0));
            }
        };

        let latest = conversations
            .into_iter()
            .filter_map(|c| title_serial(&c.title).map(|n| (c, n)))
            .max_by_key(|(_, n)| *n);

        let highest = latest.as_ref().map(|(_, n)| *n).unwrap_or(0);
        Ok((latest, highest))
    }

    async fn create(&self, title: &str) -> Result<Destination> {
        let id = self
            .backend
            .create_conversation(title, &self.settings.about)
            .await
            .map_err(creation_error)?;
        info!("Backup chat created (ID: {})", id);

        self.backend.join(id).await.map_err(creation_error)?;
        info!("Backup chat joined");

        let invite_link = match self.backend.export_invite_link(id).await {
            Ok(link) => {
                info!("Permanent invite link: {}", link);
                Some(link)
            }
            Err(e) => {
                warn!("Couldn't create invite link: {}", e);
                None
            }
        };

        Ok(Destination {
            id,
            origin: DestinationOrigin::Created {
                title: title.to_string(),
            },
            invite_link,
        })
    }
}

fn creation_error(e: BackendError) -> Error {
    match e.wait_secs() {
        Some(wait_secs) => Error::RateLimited { wait_secs },
        None => Error::CreationFailed(e.to_string()),
    }
}

fn abort_on_flood_wait(e: &BackendError) -> Result<()> {
    match e.wait_secs() {
        Some(wait_secs) => {
            warn!("Flood wait: please wait {} seconds before trying again", wait_secs);
            Err(Error::RateLimited { wait_secs })
        }
        None => Ok(()),
    }
}

/// Serial number from a "Backup #N" title
pub fn title_serial(title: &str) -> Option<u32> {
    SERIAL_PATTERN
        .captures(title)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Title for a new backup chat. Numbered titles also carry the creation date.
pub fn backup_title(base: &str, serial: Option<u32>, date: NaiveDate) -> String {
    match serial {
        Some(n) => format!("{} #{} ({})", base, n, date.format("%Y-%m-%d")),
        None => base.to_string(),
    }
}
