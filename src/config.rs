//! Configuration loaded from the process environment

use crate::backend::ConversationId;
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Bot accounts whose messages are never relayed
pub const DEFAULT_IGNORED_SENDERS: &[&str] = &[
    "@KPSLeech6Bot",
    "@KPSLeech5Bot",
    "@KPSLeech4Bot",
    "@KPSLeech3Bot",
    "@KPSLeech2Bot",
    "@KPSLeech1Bot",
    "@KPSMirrorXBot",
    "@KPSLeechBot",
];

pub const DEFAULT_BACKUP_TITLE: &str = "💾 Message Backup Channel";
pub const DEFAULT_BACKUP_ABOUT: &str = "Automatically created for message backups";
pub const DEFAULT_FALLBACK_GROUP_TITLE: &str = "Message Backup Group";

/// How the backup chat is found at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveStrategy {
    /// Only rejoin the configured backup chat id
    ManualId,
    /// Create a fresh backup chat on every run
    #[default]
    AlwaysCreate,
    /// Reuse the highest numbered "Backup #N" chat, create the next one otherwise
    ScanAndReuse,
}

impl FromStr for ResolveStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" | "manual-id" => Ok(ResolveStrategy::ManualId),
            "create" | "always-create" => Ok(ResolveStrategy::AlwaysCreate),
            "scan" | "scan-and-reuse" => Ok(ResolveStrategy::ScanAndReuse),
            other => Err(Error::Config(format!(
                "unknown backup strategy '{}' (expected manual, create or scan)",
                other
            ))),
        }
    }
}

impl fmt::Display for ResolveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveStrategy::ManualId => write!(f, "manual"),
            ResolveStrategy::AlwaysCreate => write!(f, "create"),
            ResolveStrategy::ScanAndReuse => write!(f, "scan"),
        }
    }
}

/// All runtime settings
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub source_chat: ConversationId,
    /// Previously known backup chat, used by the rejoin fallback
    pub backup_chat: Option<ConversationId>,
    pub strategy: ResolveStrategy,
    pub ignored_senders: Vec<String>,
    pub backup_title: String,
    pub backup_about: String,
    pub fallback_group_title: String,
    /// Port for the liveness endpoint; disabled when unset
    pub health_port: Option<u16>,
}

impl Config {
    /// Read settings from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bot_token = get("BOT_TOKEN")
            .ok_or_else(|| Error::Config("BOT_TOKEN is not set".to_string()))?;

        let source_chat = get("SOURCE_CHAT_ID")
            .ok_or_else(|| Error::Config("SOURCE_CHAT_ID is not set".to_string()))
            .and_then(|v| parse_chat_id("SOURCE_CHAT_ID", &v))?;

        let backup_chat = get("BACKUP_CHAT_ID")
            .map(|v| parse_chat_id("BACKUP_CHAT_ID", &v))
            .transpose()?;

        let strategy = match get("BACKUP_STRATEGY") {
            Some(v) => v.parse()?,
            None => ResolveStrategy::default(),
        };

        let ignored_senders = match get("IGNORED_SENDERS") {
            Some(v) => v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            None => DEFAULT_IGNORED_SENDERS.iter().map(|s| s.to_string()).collect(),
        };

        let health_port = get("PORT")
            .map(|v| {
                v.parse::<u16>()
                    .map_err(|_| Error::Config(format!("PORT is not a valid port: {}", v)))
            })
            .transpose()?;

        Ok(Self {
            bot_token,
            source_chat,
            backup_chat,
            strategy,
            ignored_senders,
            backup_title: get("BACKUP_TITLE").unwrap_or_else(|| DEFAULT_BACKUP_TITLE.to_string()),
            backup_about: get("BACKUP_ABOUT").unwrap_or_else(|| DEFAULT_BACKUP_ABOUT.to_string()),
            fallback_group_title: get("FALLBACK_GROUP_TITLE")
                .unwrap_or_else(|| DEFAULT_FALLBACK_GROUP_TITLE.to_string()),
            health_port,
        })
    }

    /// Create config for testing
    pub fn for_test(source_chat: ConversationId) -> Self {
        Self {
            bot_token: "123456:TEST".to_string(),
            source_chat,
            backup_chat: None,
            strategy: ResolveStrategy::default(),
            ignored_senders: DEFAULT_IGNORED_SENDERS.iter().map(|s| s.to_string()).collect(),
            backup_title: DEFAULT_BACKUP_TITLE.to_string(),
            backup_about: DEFAULT_BACKUP_ABOUT.to_string(),
            fallback_group_title: DEFAULT_FALLBACK_GROUP_TITLE.to_string(),
            health_port: None,
        }
    }
}

fn parse_chat_id(key: &str, value: &str) -> Result<ConversationId> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{} is not a numeric chat id: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_minimal_env() {
        let config = Config::from_lookup(lookup(&[
            ("BOT_TOKEN", "123:abc"),
            ("SOURCE_CHAT_ID", "-1001552790071"),
        ]))
        .unwrap();

        assert_eq!(config.source_chat, -1001552790071);
        assert_eq!(config.backup_chat, None);
        assert_eq!(config.strategy, ResolveStrategy::AlwaysCreate);
        assert_eq!(config.ignored_senders.len(), DEFAULT_IGNORED_SENDERS.len());
        assert_eq!(config.backup_title, DEFAULT_BACKUP_TITLE);
        assert_eq!(config.health_port, None);
    }

    #[test]
    fn test_missing_token() {
        let err = Config::from_lookup(lookup(&[("SOURCE_CHAT_ID", "-100")])).unwrap_err();
        assert!(err.to_string().contains("BOT_TOKEN"));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let err = Config::from_lookup(lookup(&[("BOT_TOKEN", "  "), ("SOURCE_CHAT_ID", "-100")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_source_chat() {
        let err = Config::from_lookup(lookup(&[
            ("BOT_TOKEN", "123:abc"),
            ("SOURCE_CHAT_ID", "my-group"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("SOURCE_CHAT_ID"));
    }

    #[test]
    fn test_full_env() {
        let config = Config::from_lookup(lookup(&[
            ("BOT_TOKEN", "123:abc"),
            ("SOURCE_CHAT_ID", "-1001"),
            ("BACKUP_CHAT_ID", "-1002"),
            ("BACKUP_STRATEGY", "scan"),
            ("IGNORED_SENDERS", "@SpamBot, ,OtherBot"),
            ("PORT", "8080"),
            ("BACKUP_TITLE", "Archive"),
        ]))
        .unwrap();

        assert_eq!(config.backup_chat, Some(-1002));
        assert_eq!(config.strategy, ResolveStrategy::ScanAndReuse);
        assert_eq!(config.ignored_senders, vec!["@SpamBot", "OtherBot"]);
        assert_eq!(config.health_port, Some(8080));
        assert_eq!(config.backup_title, "Archive");
    }

    #[test]
    fn test_invalid_port() {
        let err = Config::from_lookup(lookup(&[
            ("BOT_TOKEN", "123:abc"),
            ("SOURCE_CHAT_ID", "-1001"),
            ("PORT", "99999"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("manual".parse::<ResolveStrategy>().unwrap(), ResolveStrategy::ManualId);
        assert_eq!("Create".parse::<ResolveStrategy>().unwrap(), ResolveStrategy::AlwaysCreate);
        assert_eq!(
            "scan-and-reuse".parse::<ResolveStrategy>().unwrap(),
            ResolveStrategy::ScanAndReuse
        );
        assert!("sometimes".parse::<ResolveStrategy>().is_err());
    }

    #[test]
    fn test_strategy_display_roundtrips() {
        for strategy in [
            ResolveStrategy::ManualId,
            ResolveStrategy::AlwaysCreate,
            ResolveStrategy::ScanAndReuse,
        ] {
            assert_eq!(strategy.to_string().parse::<ResolveStrategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_default_ignore_list() {
        assert!(DEFAULT_IGNORED_SENDERS.contains(&"@KPSLeechBot"));
        assert!(DEFAULT_IGNORED_SENDERS.contains(&"@KPSMirrorXBot"));
        assert!(DEFAULT_IGNORED_SENDERS.iter().all(|s| s.starts_with('@')));
    }
}
