//! Destination adapters implementing [`BasePublisher`].
//!
//! Each adapter wraps a client crate and classifies its errors into
//! [`PublishError::Transient`] or [`PublishError::Permanent`].

use std::sync::Arc;

use async_trait::async_trait;
use telegram::{ParseMode, TelegramClient, TelegramError};
use twilio::{TwilioError, TwilioService};

use super::facebook_client::{FacebookClient, FacebookError};
use super::{BasePublisher, DeliveryReceipt, OutboundMessage, PublishError};
use crate::domains::distribution::Destination;

// =============================================================================
// Telegram
// =============================================================================

pub struct TelegramPublisher {
    client: Arc<TelegramClient>,
    channel_id: String,
}

impl TelegramPublisher {
    pub fn new(client: Arc<TelegramClient>, channel_id: impl Into<String>) -> Self {
        Self {
            client,
            channel_id: channel_id.into(),
        }
    }

    async fn send_text(&self, text: &str) -> Result<DeliveryReceipt, PublishError> {
        self.client
            .send_message(&self.channel_id, text, Some(ParseMode::MarkdownV2))
            .await
            .map(|message| DeliveryReceipt {
                message_id: message.message_id.to_string(),
            })
            .map_err(classify_telegram)
    }
}

fn classify_telegram(e: TelegramError) -> PublishError {
    if e.is_retryable() {
        PublishError::Transient(e.to_string())
    } else {
        PublishError::Permanent(e.to_string())
    }
}

#[async_trait]
impl BasePublisher for TelegramPublisher {
    fn destination(&self) -> Destination {
        Destination::Telegram
    }

    async fn publish(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, PublishError> {
        let Some(photo_url) = message.media_url.as_deref() else {
            return self.send_text(&message.text).await;
        };

        match self
            .client
            .send_photo(
                &self.channel_id,
                photo_url,
                Some(&message.text),
                Some(ParseMode::MarkdownV2),
            )
            .await
        {
            Ok(sent) => Ok(DeliveryReceipt {
                message_id: sent.message_id.to_string(),
            }),
            // A timed out photo may already be in the channel; no text fallback
            Err(e @ TelegramError::Network { timed_out: true, .. }) => Err(classify_telegram(e)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    photo_url,
                    "Telegram photo failed, sending as text"
                );
                self.send_text(&message.text).await
            }
        }
    }
}

// =============================================================================
// WhatsApp (via Twilio)
// =============================================================================

pub struct WhatsAppPublisher {
    twilio: Arc<TwilioService>,
    from: String,
    to: String,
}

impl WhatsAppPublisher {
    /// `from` and `to` accept bare E.164 numbers or the `whatsapp:` form.
    pub fn new(twilio: Arc<TwilioService>, from: &str, to: &str) -> Self {
        Self {
            twilio,
            from: whatsapp_address(from),
            to: whatsapp_address(to),
        }
    }
}

fn whatsapp_address(number: &str) -> String {
    let number = number.trim();
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{}", number)
    }
}

#[async_trait]
impl BasePublisher for WhatsAppPublisher {
    fn destination(&self) -> Destination {
        Destination::WhatsApp
    }

    async fn publish(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, PublishError> {
        self.twilio
            .send_message(
                &self.from,
                &self.to,
                &message.text,
                message.media_url.as_deref(),
            )
            .await
            .map(|response| DeliveryReceipt {
                message_id: response.sid,
            })
            .map_err(|e: TwilioError| {
                if e.is_retryable() {
                    PublishError::Transient(e.to_string())
                } else {
                    PublishError::Permanent(e.to_string())
                }
            })
    }
}

// =============================================================================
// Facebook group feed
// =============================================================================

pub struct FacebookPublisher {
    client: Arc<FacebookClient>,
    group_id: String,
}

impl FacebookPublisher {
    pub fn new(client: Arc<FacebookClient>, group_id: impl Into<String>) -> Self {
        Self {
            client,
            group_id: group_id.into(),
        }
    }
}

#[async_trait]
impl BasePublisher for FacebookPublisher {
    fn destination(&self) -> Destination {
        Destination::Facebook
    }

    /// Posts text only; the feed endpoint unfurls the apply link itself.
    async fn publish(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, PublishError> {
        self.client
            .post_to_group(&self.group_id, &message.text)
            .await
            .map(|post_id| DeliveryReceipt { message_id: post_id })
            .map_err(|e: FacebookError| {
                if e.is_retryable() {
                    PublishError::Transient(e.to_string())
                } else {
                    PublishError::Permanent(e.to_string())
                }
            })
    }
}
