//! Telegram backend over the Bot API
//!
//! All teloxide usage is confined to this module. Bot accounts cannot list
//! dialogs or create chats, so the backend advertises
//! [`BackendCapabilities::CHAT_MEMBER_ONLY`] and those calls report
//! `Unsupported`. The resolver then goes straight to the configured backup chat.

use crate::backend::{
    BackendCapabilities, Conversation, ConversationId, MediaKind as RelayMediaKind, MediaRef,
    MessageEvent, MessagingBackend, Sender,
};
use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use teloxide::payloads::CopyMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, MediaKind, MessageId, MessageKind, UpdateKind};
use teloxide::RequestError;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Long-poll timeout for getUpdates, in seconds
const POLL_TIMEOUT_SECS: u32 = 30;

pub struct TelegramBackend {
    bot: Bot,
}

impl TelegramBackend {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn from_token(token: &str) -> Self {
        Self::new(Bot::new(token))
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

fn backend_error(e: RequestError) -> BackendError {
    match e {
        RequestError::RetryAfter(wait) => BackendError::RateLimited {
            wait: wait.duration(),
        },
        other => BackendError::Request(other.to_string()),
    }
}

#[async_trait]
impl MessagingBackend for TelegramBackend {
    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::CHAT_MEMBER_ONLY
    }

    async fn verify(&self, chat: ConversationId) -> BackendResult<()> {
        self.bot.get_chat(ChatId(chat)).await.map_err(backend_error)?;
        Ok(())
    }

    async fn list_conversations(&self) -> BackendResult<Vec<Conversation>> {
        Err(BackendError::Unsupported("bot accounts cannot list dialogs"))
    }

    async fn create_conversation(
        &self,
        _title: &str,
        _about: &str,
    ) -> BackendResult<ConversationId> {
        Err(BackendError::Unsupported("bot accounts cannot create chats"))
    }

    /// Bots are added to chats by an admin; joining means confirming membership.
    async fn join(&self, chat: ConversationId) -> BackendResult<()> {
        self.verify(chat).await
    }

    async fn export_invite_link(&self, chat: ConversationId) -> BackendResult<String> {
        self.bot
            .export_chat_invite_link(ChatId(chat))
            .await
            .map_err(backend_error)
    }

    async fn create_basic_group(&self, _title: &str) -> BackendResult<ConversationId> {
        Err(BackendError::Unsupported("bot accounts cannot create groups"))
    }

    async fn send_text(&self, chat: ConversationId, text: &str) -> BackendResult<()> {
        self.bot
            .send_message(ChatId(chat), text)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn send_media(
        &self,
        chat: ConversationId,
        media: &MediaRef,
        caption: &str,
    ) -> BackendResult<()> {
        self.bot
            .copy_message(ChatId(chat), ChatId(media.chat), MessageId(media.message_id))
            .caption(caption)
            .await
            .map_err(backend_error)?;
        Ok(())
    }
}

/// Convert a Telegram message into a relay event. A media caption counts as
/// the message text.
pub fn message_event(msg: &Message) -> MessageEvent {
    let sender = msg.from.as_ref().map(|user| Sender {
        first_name: Some(user.first_name.clone()),
        last_name: user.last_name.clone(),
        username: user.username.clone(),
        is_bot: user.is_bot,
    });

    let media = media_kind(msg).map(|kind| MediaRef {
        kind,
        chat: msg.chat.id.0,
        message_id: msg.id.0,
    });

    MessageEvent {
        chat: msg.chat.id.0,
        message_id: msg.id.0,
        sender,
        date: msg.date,
        text: msg.text().or(msg.caption()).map(String::from),
        media,
    }
}

fn media_kind(msg: &Message) -> Option<RelayMediaKind> {
    let MessageKind::Common(common) = &msg.kind else {
        return None;
    };
    let kind = match &common.media_kind {
        MediaKind::Text(_) => return None,
        MediaKind::Photo(_) => RelayMediaKind::Photo,
        MediaKind::Video(_) => RelayMediaKind::Video,
        MediaKind::Document(_) => RelayMediaKind::Document,
        MediaKind::Audio(_) => RelayMediaKind::Audio,
        MediaKind::Voice(_) => RelayMediaKind::Voice,
        MediaKind::Animation(_) => RelayMediaKind::Animation,
        MediaKind::Sticker(_) => RelayMediaKind::Sticker,
        MediaKind::VideoNote(_) => RelayMediaKind::VideoNote,
        _ => RelayMediaKind::Other,
    };
    Some(kind)
}

/// Confirm the token works and clear any webhook so long polling can run
pub async fn connect(backend: &TelegramBackend) -> anyhow::Result<()> {
    let me = backend.bot().get_me().await?;
    backend.bot().delete_webhook().send().await?;
    info!(
        "Logged in as @{}",
        me.username.as_deref().unwrap_or("(no username)")
    );
    Ok(())
}

/// Poll for updates and push source-chat messages to `events`, one update at a
/// time. Returns when the receiving side is dropped.
pub async fn run_listener(bot: Bot, source: ConversationId, events: mpsc::Sender<MessageEvent>) {
    let mut offset: i32 = 0;

    loop {
        let result = bot
            .get_updates()
            .offset(offset)
            .timeout(POLL_TIMEOUT_SECS)
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::ChannelPost])
            .await;

        let updates = match result {
            Ok(updates) => updates,
            Err(RequestError::RetryAfter(wait)) => {
                warn!("Polling rate limited, waiting {}s", wait.duration().as_secs());
                tokio::time::sleep(wait.duration()).await;
                continue;
            }
            Err(e) => {
                error!("Failed to poll updates: {}", e);
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                continue;
            }
        };

        for update in updates {
            offset = update.id.as_offset();
            let msg = match update.kind {
                UpdateKind::Message(msg) | UpdateKind::ChannelPost(msg) => msg,
                other => {
                    debug!("Ignoring non-message update: {:?}", other);
                    continue;
                }
            };

            if msg.chat.id.0 != source {
                continue;
            }

            if events.send(message_event(&msg)).await.is_err() {
                info!("Relay stopped, listener exiting");
                return;
            }
        }
    }
}
