//! Error types

use thiserror::Error;

/// Core error types
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("No API keys configured for {0}")]
    NoKeys(String),

    #[error("Timed out after {waited_ms}ms waiting for a free {pool} key")]
    KeyAcquireTimeout { pool: String, waited_ms: u64 },
}

/// Errors raised while talking to a vendor API
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("{vendor} API error {code}: {message}")]
    Api {
        vendor: &'static str,
        code: String,
        message: String,
    },

    #[error("Rate limited by {0}")]
    RateLimited(String),

    #[error("Unexpected response shape: {0}")]
    Decode(String),

    #[error("Missing credentials for {0}")]
    MissingCredentials(&'static str),

    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl FetchError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        FetchError::Transport(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        FetchError::Decode(err.to_string())
    }

    /// Whether repeating the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) | FetchError::RateLimited(_) => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited(_) | FetchError::Status { status: 429, .. }
        )
    }
}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;
pub type FetchResult<T> = Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::transport("connection reset").is_retryable());
        assert!(FetchError::Status { status: 503, url: "u".into() }.is_retryable());
        assert!(FetchError::Status { status: 429, url: "u".into() }.is_rate_limited());
        assert!(!FetchError::Status { status: 404, url: "u".into() }.is_retryable());
        assert!(!FetchError::MissingCredentials("okx").is_retryable());
    }
}
