//! Sender classification and display labels

use crate::backend::Sender;
use std::collections::HashSet;

/// Label used when the sender has no first name (or is anonymous)
pub const UNKNOWN_SENDER: &str = "Unknown";

/// Why a sender's message is not relayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderFilter {
    /// Platform flagged the account as a bot
    Automated,
    /// Handle is on the ignore list
    Ignored(String),
}

/// Static set of ignored handles.
///
/// Telegram usernames are case-insensitive, so entries are stored without the
/// leading `@` and lowercased.
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    handles: HashSet<String>,
}

impl IgnoreList {
    pub fn new<I, S>(handles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            handles: handles
                .into_iter()
                .map(|h| normalize_handle(h.as_ref()))
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.handles.contains(&normalize_handle(handle))
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Check whether a sender must be dropped
    pub fn check(&self, sender: &Sender) -> Option<SenderFilter> {
        if sender.is_bot {
            return Some(SenderFilter::Automated);
        }
        match sender.username.as_deref() {
            Some(handle) if self.contains(handle) => {
                Some(SenderFilter::Ignored(handle.to_string()))
            }
            _ => None,
        }
    }
}

fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_ascii_lowercase()
}

/// Build the display label: "First Last (@handle)"
pub fn compose_label(sender: Option<&Sender>) -> String {
    let Some(sender) = sender else {
        return UNKNOWN_SENDER.to_string();
    };

    let mut label = non_empty(sender.first_name.as_deref())
        .unwrap_or(UNKNOWN_SENDER)
        .to_string();

    if let Some(last) = non_empty(sender.last_name.as_deref()) {
        label.push(' ');
        label.push_str(last);
    }
    if let Some(handle) = non_empty(sender.username.as_deref()) {
        label.push_str(&format!(" (@{})", handle));
    }

    label
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}
