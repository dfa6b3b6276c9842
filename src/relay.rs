//! Message relay
//!
//! Copies each new message from the source chat into the backup chat. A relay
//! can only be built from a resolved [`Destination`], so there is no state in
//! which it could dispatch without one.

use crate::backend::{ConversationId, MessageEvent, MessagingBackend};
use crate::error::{Error, Result};
use crate::resolver::Destination;
use crate::senders::{compose_label, IgnoreList, SenderFilter};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// What happened to one event
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    ForwardedText,
    ForwardedMedia,
    /// Sender was a bot or on the ignore list
    Filtered(SenderFilter),
    /// Event came from a chat other than the source
    OtherChat,
    /// Neither text nor media
    Empty,
    /// Dispatch failed; the relay keeps running
    Failed(String),
}

pub struct Relay<B: ?Sized> {
    backend: Arc<B>,
    source: ConversationId,
    destination: Destination,
    ignored: IgnoreList,
}

impl<B: MessagingBackend + ?Sized> Relay<B> {
    pub fn new(
        backend: Arc<B>,
        source: ConversationId,
        destination: Destination,
        ignored: IgnoreList,
    ) -> Self {
        Self {
            backend,
            source,
            destination,
            ignored,
        }
    }

    pub fn source(&self) -> ConversationId {
        self.source
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Handle one event. Never fails; errors are logged and reported in the outcome.
    pub async fn on_message(&self, event: &MessageEvent) -> RelayOutcome {
        match self.dispatch(event).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Forward error for message {}: {}", event.message_id, e);
                RelayOutcome::Failed(e.to_string())
            }
        }
    }

    async fn dispatch(&self, event: &MessageEvent) -> Result<RelayOutcome> {
        if event.chat != self.source {
            debug!("Ignoring message from non-source chat {}", event.chat);
            return Ok(RelayOutcome::OtherChat);
        }

        if let Some(sender) = &event.sender {
            if let Some(filter) = self.ignored.check(sender) {
                let handle = sender.username.as_deref().unwrap_or("?");
                match &filter {
                    SenderFilter::Automated => info!("Ignoring message from bot: {}", handle),
                    SenderFilter::Ignored(_) => {
                        info!("Ignoring message from ignored sender: {}", handle)
                    }
                }
                return Ok(RelayOutcome::Filtered(filter));
            }
        }

        let label = compose_label(event.sender.as_ref());
        let target = self.destination.id;

        if let Some(text) = event.text.as_deref().filter(|t| !t.is_empty()) {
            let body = format_text(&label, &event.date, text);
            self.backend
                .send_text(target, &body)
                .await
                .map_err(|e| Error::ForwardFailed(e.to_string()))?;
            return Ok(RelayOutcome::ForwardedText);
        }

        if let Some(media) = &event.media {
            self.backend
                .send_media(target, media, &format_caption(&label))
                .await
                .map_err(|e| Error::ForwardFailed(e.to_string()))?;
            return Ok(RelayOutcome::ForwardedMedia);
        }

        Ok(RelayOutcome::Empty)
    }

    /// Drain events one at a time until every sender is dropped
    pub async fn run(&self, mut events: mpsc::Receiver<MessageEvent>) {
        info!("Ready! Monitoring {} → {}", self.source, self.destination.id);
        while let Some(event) = events.recv().await {
            self.on_message(&event).await;
        }
        info!("Event stream closed, relay stopping");
    }
}

/// Timestamp as shown in relayed messages, e.g. "2024-05-01 12:30:00+00:00"
pub fn format_timestamp(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S%:z").to_string()
}

/// Body of a relayed text message
pub fn format_text(label: &str, date: &DateTime<Utc>, text: &str) -> String {
    format!("👤 {}\n⏰ {}\n💬 {}", label, format_timestamp(date), text)
}

/// Caption attached to relayed media
pub fn format_caption(label: &str) -> String {
    format!("📎 From {}", label)
}
