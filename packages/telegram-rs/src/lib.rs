//! Minimal Telegram Bot API client.
//!
//! Covers what a broadcast bot needs: posting text and photos to a channel.
//!
//! # Example
//!
//! ```rust,ignore
//! use telegram::{ParseMode, TelegramClient};
//!
//! let client = TelegramClient::new("123456:ABC-DEF".into())?;
//! let message = client
//!     .send_message("@my_channel", "*hello*", Some(ParseMode::MarkdownV2))
//!     .await?;
//! println!("sent {}", message.message_id);
//! ```

pub mod error;
pub mod types;

pub use error::{Result, TelegramError};
pub use types::{Chat, Message, ParseMode};

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use types::{ApiResponse, SendMessageRequest, SendPhotoRequest};

const BASE_URL: &str = "https://api.telegram.org";

pub struct TelegramClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: String) -> Result<Self> {
        Self::with_timeout(token, Duration::from_secs(10))
    }

    pub fn with_timeout(token: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            token,
            base_url: BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API host (used against local fakes).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Send a text message. Link previews stay enabled so apply links unfurl.
    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<Message> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode,
            disable_web_page_preview: false,
        };
        self.call("sendMessage", &request).await
    }

    /// Send a photo by URL with an optional caption.
    pub async fn send_photo(
        &self,
        chat_id: &str,
        photo_url: &str,
        caption: Option<&str>,
        parse_mode: Option<ParseMode>,
    ) -> Result<Message> {
        let request = SendPhotoRequest {
            chat_id,
            photo: photo_url,
            caption,
            parse_mode,
        };
        self.call("sendPhoto", &request).await
    }

    async fn call<B: Serialize, T: DeserializeOwned>(&self, method: &str, body: &B) -> Result<T> {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        let resp = self.client.post(&url).json(body).send().await?;

        let status = resp.status();
        let text = resp.text().await?;

        let envelope: ApiResponse<T> = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(TelegramError::Parse(e.to_string())),
            Err(_) => {
                return Err(TelegramError::Api {
                    status: status.as_u16(),
                    description: text,
                    retry_after: None,
                })
            }
        };

        if !envelope.ok {
            let description = envelope
                .description
                .unwrap_or_else(|| "unknown error".to_string());
            tracing::debug!(method, status = status.as_u16(), %description, "Telegram call rejected");
            return Err(TelegramError::Api {
                status: envelope.error_code.unwrap_or(status.as_u16()),
                description,
                retry_after: envelope.parameters.and_then(|p| p.retry_after),
            });
        }

        envelope
            .result
            .ok_or_else(|| TelegramError::Parse(format!("{} returned ok without result", method)))
    }
}
