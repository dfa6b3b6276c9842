//! Error types for chat-backup-relay

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rate limited: wait {wait_secs} seconds before trying again")]
    RateLimited { wait_secs: u64 },

    #[error("Backup chat creation failed: {0}")]
    CreationFailed(String),

    #[error("Chat lookup failed: {0}")]
    LookupFailed(String),

    #[error("Forward failed: {0}")]
    ForwardFailed(String),

    #[error("Could not establish a backup chat")]
    ResolutionExhausted,

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a messaging backend call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("flood wait of {}s", wait.as_secs())]
    RateLimited { wait: Duration },

    #[error("not supported by this backend: {0}")]
    Unsupported(&'static str),

    #[error("request failed: {0}")]
    Request(String),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

impl BackendError {
    /// Seconds the backend asked us to wait, if this is a flood wait
    pub fn wait_secs(&self) -> Option<u64> {
        match self {
            BackendError::RateLimited { wait } => Some(wait.as_secs()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::LookupFailed("-1001552790071".to_string());
        assert!(err.to_string().contains("-1001552790071"));
    }

    #[test]
    fn test_rate_limited_display() {
        let err = Error::RateLimited { wait_secs: 30 };
        assert!(err.to_string().contains("30 seconds"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_backend_wait_secs() {
        let err = BackendError::RateLimited {
            wait: Duration::from_secs(42),
        };
        assert_eq!(err.wait_secs(), Some(42));
        assert_eq!(BackendError::Request("boom".into()).wait_secs(), None);
        assert_eq!(BackendError::Unsupported("create").wait_secs(), None);
    }
}
