//! Messaging backend abstraction
//!
//! Everything the resolver and relay need from the remote service goes through
//! [`MessagingBackend`]. The Telegram implementation lives in `telegram.rs`.

use crate::error::BackendResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Telegram chat id (supergroups and channels carry the -100 prefix)
pub type ConversationId = i64;

/// A chat visible to the account, as returned by a dialog scan
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
}

/// Who sent a message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sender {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub is_bot: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Document,
    Audio,
    Voice,
    Animation,
    Sticker,
    VideoNote,
    Other,
}

/// Pointer to the original media message, copied as-is by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub chat: ConversationId,
    pub message_id: i32,
}

/// A new message seen in a watched chat
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub chat: ConversationId,
    pub message_id: i32,
    pub sender: Option<Sender>,
    pub date: DateTime<Utc>,
    pub text: Option<String>,
    pub media: Option<MediaRef>,
}

/// Which optional account-level operations a backend can perform.
///
/// User accounts can do everything; Bot API accounts can only work with chats
/// an admin already added them to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    pub list_conversations: bool,
    pub create_conversations: bool,
    pub create_basic_groups: bool,
}

impl BackendCapabilities {
    pub const FULL: Self = Self {
        list_conversations: true,
        create_conversations: true,
        create_basic_groups: true,
    };

    pub const CHAT_MEMBER_ONLY: Self = Self {
        list_conversations: false,
        create_conversations: false,
        create_basic_groups: false,
    };

    /// Whether the backend can bring a new backup chat into existence
    pub fn can_create_chats(&self) -> bool {
        self.create_conversations || self.create_basic_groups
    }
}

/// Operations the relay needs from the remote messaging service.
///
/// Implementations report failures as [`crate::error::BackendError`]; a flood
/// wait must be surfaced as `RateLimited` so the resolver can abort early.
#[async_trait]
pub trait MessagingBackend: Send + Sync {
    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities::FULL
    }

    /// Confirm the account can see the given chat.
    async fn verify(&self, chat: ConversationId) -> BackendResult<()>;

    /// List chats the account is a member of.
    async fn list_conversations(&self) -> BackendResult<Vec<Conversation>>;

    /// Create a new supergroup and return its id.
    async fn create_conversation(&self, title: &str, about: &str)
        -> BackendResult<ConversationId>;

    /// Join (or rejoin) a chat by id.
    async fn join(&self, chat: ConversationId) -> BackendResult<()>;

    /// Export a permanent invite link for a chat.
    async fn export_invite_link(&self, chat: ConversationId) -> BackendResult<String>;

    /// Create a basic group and return its id.
    async fn create_basic_group(&self, title: &str) -> BackendResult<ConversationId>;

    async fn send_text(&self, chat: ConversationId, text: &str) -> BackendResult<()>;

    /// Copy a media message into `chat` with a new caption.
    async fn send_media(
        &self,
        chat: ConversationId,
        media: &MediaRef,
        caption: &str,
    ) -> BackendResult<()>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! Recording backend for unit tests

    use super::*;
    use crate::error::BackendError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Verify(ConversationId),
        List,
        Create(String),
        Join(ConversationId),
        Invite(ConversationId),
        BasicGroup(String),
        Text(ConversationId, String),
        Media(ConversationId, MediaRef, String),
    }

    /// Which operation a scripted failure applies to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Op {
        Verify,
        List,
        Create,
        Join,
        Invite,
        BasicGroup,
        Text,
        Media,
    }

    #[derive(Default)]
    pub struct MockBackend {
        pub calls: Mutex<Vec<Call>>,
        pub conversations: Vec<Conversation>,
        pub created_id: ConversationId,
        pub basic_group_id: ConversationId,
        pub capabilities: Option<BackendCapabilities>,
        failures: Mutex<HashMap<Op, BackendError>>,
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self {
                created_id: -1001000000001,
                basic_group_id: -4000000001,
                ..Default::default()
            }
        }

        pub fn with_conversations(mut self, conversations: Vec<Conversation>) -> Self {
            self.conversations = conversations;
            self
        }

        pub fn with_capabilities(mut self, capabilities: BackendCapabilities) -> Self {
            self.capabilities = Some(capabilities);
            self
        }

        pub fn fail(self, op: Op, err: BackendError) -> Self {
            self.failures.lock().unwrap().insert(op, err);
            self
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        /// Only the send_text / send_media calls
        pub fn dispatches(&self) -> Vec<Call> {
            self.calls()
                .into_iter()
                .filter(|c| matches!(c, Call::Text(..) | Call::Media(..)))
                .collect()
        }

        fn record(&self, call: Call, op: Op) -> BackendResult<()> {
            self.calls.lock().unwrap().push(call);
            match self.failures.lock().unwrap().get(&op) {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl MessagingBackend for MockBackend {
        fn capabilities(&self) -> BackendCapabilities {
            self.capabilities.unwrap_or(BackendCapabilities::FULL)
        }

        async fn verify(&self, chat: ConversationId) -> BackendResult<()> {
            self.record(Call::Verify(chat), Op::Verify)
        }

        async fn list_conversations(&self) -> BackendResult<Vec<Conversation>> {
            self.record(Call::List, Op::List)?;
            Ok(self.conversations.clone())
        }

        async fn create_conversation(
            &self,
            title: &str,
            _about: &str,
        ) -> BackendResult<ConversationId> {
            self.record(Call::Create(title.to_string()), Op::Create)?;
            Ok(self.created_id)
        }

        async fn join(&self, chat: ConversationId) -> BackendResult<()> {
            self.record(Call::Join(chat), Op::Join)
        }

        async fn export_invite_link(&self, chat: ConversationId) -> BackendResult<String> {
            self.record(Call::Invite(chat), Op::Invite)?;
            Ok(format!("https://t.me/+invite{}", chat.unsigned_abs()))
        }

        async fn create_basic_group(&self, title: &str) -> BackendResult<ConversationId> {
            self.record(Call::BasicGroup(title.to_string()), Op::BasicGroup)?;
            Ok(self.basic_group_id)
        }

        async fn send_text(&self, chat: ConversationId, text: &str) -> BackendResult<()> {
            self.record(Call::Text(chat, text.to_string()), Op::Text)
        }

        async fn send_media(
            &self,
            chat: ConversationId,
            media: &MediaRef,
            caption: &str,
        ) -> BackendResult<()> {
            self.record(Call::Media(chat, media.clone(), caption.to_string()), Op::Media)
        }
    }
}
