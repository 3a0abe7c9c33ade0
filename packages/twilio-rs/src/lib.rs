// Minimal client for the Twilio Programmable Messaging API (SMS and WhatsApp).

use std::collections::HashMap;
use std::time::Duration;

pub mod models;
use reqwest::{header, Client};

use crate::models::{ErrorResponse, MessageResponse};

const API_BASE: &str = "https://api.twilio.com/2010-04-01";

#[derive(Debug, Clone)]
pub struct TwilioOptions {
    pub account_sid: String,
    pub auth_token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TwilioError {
    /// The request never produced a response (DNS, connect, reset, client timeout)
    #[error("Request to Twilio failed: {message}")]
    Network { message: String, timed_out: bool },

    /// Twilio answered with a non-2xx status
    #[error("Twilio returned an error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The body could not be decoded
    #[error("Failed to parse Twilio response: {0}")]
    Parse(String),
}

impl TwilioError {
    /// Whether a later attempt could succeed without changing the request.
    pub fn is_retryable(&self) -> bool {
        match self {
            TwilioError::Network { .. } => true,
            TwilioError::Api { status, .. } => *status == 429 || *status >= 500,
            TwilioError::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for TwilioError {
    fn from(e: reqwest::Error) -> Self {
        TwilioError::Network {
            message: e.to_string(),
            timed_out: e.is_timeout(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TwilioService {
    options: TwilioOptions,
    client: Client,
    base_url: String,
}

impl TwilioService {
    pub fn new(options: TwilioOptions) -> Self {
        Self::with_timeout(options, Duration::from_secs(10))
    }

    pub fn with_timeout(options: TwilioOptions, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            options,
            client,
            base_url: API_BASE.to_string(),
        }
    }

    /// Point the client at a different API host (used against local fakes).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Send a message. WhatsApp senders and recipients use the
    /// `whatsapp:+15551234567` address form.
    pub async fn send_message(
        &self,
        from: &str,
        to: &str,
        body: &str,
        media_url: Option<&str>,
    ) -> Result<MessageResponse, TwilioError> {
        let url = format!(
            "{base}/Accounts/{sid}/Messages.json",
            base = self.base_url,
            sid = self.options.account_sid
        );

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/x-www-form-urlencoded"),
        );

        let mut form_body: HashMap<&str, &str> = HashMap::new();
        form_body.insert("From", from);
        form_body.insert("To", to);
        form_body.insert("Body", body);
        if let Some(media) = media_url {
            form_body.insert("MediaUrl", media);
        }

        let response = self
            .client
            .post(url)
            .basic_auth(&self.options.account_sid, Some(&self.options.auth_token))
            .headers(headers)
            .form(&form_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&error_body)
                .map(|e| e.message)
                .unwrap_or(error_body);
            return Err(TwilioError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<MessageResponse>()
            .await
            .map_err(|e| TwilioError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_throttling_are_retryable() {
        let throttled = TwilioError::Api {
            status: 429,
            message: "Too Many Requests".into(),
        };
        let unavailable = TwilioError::Api {
            status: 503,
            message: "Service Unavailable".into(),
        };
        assert!(throttled.is_retryable());
        assert!(unavailable.is_retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        let unauthorized = TwilioError::Api {
            status: 401,
            message: "Authenticate".into(),
        };
        assert!(!unauthorized.is_retryable());
        assert!(!TwilioError::Parse("eof".into()).is_retryable());
    }

    #[test]
    fn error_body_message_is_decoded() {
        let body = r#"{"code":21211,"message":"The 'To' number is not valid.","more_info":"https://www.twilio.com/docs/errors/21211","status":400}"#;
        let parsed: ErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.code, Some(21211));
        assert_eq!(parsed.status, Some(400));
    }
}
