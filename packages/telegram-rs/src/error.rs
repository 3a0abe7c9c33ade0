//! Error types for the Telegram client.

use thiserror::Error;

/// Result type for Telegram client operations.
pub type Result<T> = std::result::Result<T, TelegramError>;

/// Telegram client errors.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Network error (connection failed, client timeout)
    #[error("Network error: {message}")]
    Network { message: String, timed_out: bool },

    /// The Bot API answered with `ok: false`
    #[error("Telegram API error ({status}): {description}")]
    Api {
        status: u16,
        description: String,
        /// Seconds to wait before retrying, sent with 429 responses
        retry_after: Option<u64>,
    },

    /// Parse error (invalid JSON, unexpected response format)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl TelegramError {
    /// Whether the same request may succeed later.
    ///
    /// 429 and 5xx are transient. Other 4xx (bad token, unknown chat, markup the
    /// API refuses to parse) will fail again until the request or config changes.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelegramError::Network { .. } => true,
            TelegramError::Api { status, .. } => *status == 429 || *status >= 500,
            TelegramError::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for TelegramError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return TelegramError::Parse(e.to_string());
        }
        TelegramError::Network {
            message: e.to_string(),
            timed_out: e.is_timeout(),
        }
    }
}
