//! Chat Backup Relay - Telegram backup daemon
//!
//! Watches one source chat and copies every message from a human sender into
//! a backup chat, which is found or created at startup.

pub mod backend;
pub mod config;
pub mod daemon;
pub mod error;
pub mod health;
pub mod relay;
pub mod resolver;
pub mod senders;
pub mod telegram;

pub use error::{Error, Result};
