//! Minimal Facebook Graph API client for posting to a group feed.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const GRAPH_API_VERSION: &str = "v18.0";

#[derive(Debug, Error)]
pub enum FacebookError {
    #[error("request to Graph API failed: {message}")]
    Network { message: String, timed_out: bool },

    #[error("Graph API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected Graph API response: {0}")]
    Parse(String),
}

impl FacebookError {
    /// Network failures, throttling and server errors may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            FacebookError::Network { .. } => true,
            FacebookError::Api { status, .. } => *status == 429 || *status >= 500,
            FacebookError::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for FacebookError {
    fn from(e: reqwest::Error) -> Self {
        FacebookError::Network {
            message: e.to_string(),
            timed_out: e.is_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GraphErrorEnvelope {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

pub struct FacebookClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl FacebookClient {
    pub fn new(access_token: impl Into<String>) -> Result<Self, FacebookError> {
        Self::with_timeout(access_token, Duration::from_secs(30))
    }

    pub fn with_timeout(
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FacebookError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            access_token: access_token.into(),
            base_url: format!("https://graph.facebook.com/{}", GRAPH_API_VERSION),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Post `message` to a group's feed, returning the new post id.
    pub async fn post_to_group(&self, group_id: &str, message: &str) -> Result<String, FacebookError> {
        let url = format!("{}/{}/feed", self.base_url, group_id);
        let response = self
            .client
            .post(&url)
            .form(&[("message", message), ("access_token", self.access_token.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<GraphErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            return Err(FacebookError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str::<PostResponse>(&body)
            .map(|post| post.id)
            .map_err(|e| FacebookError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_and_server_errors_are_retryable() {
        let throttled = FacebookError::Api {
            status: 429,
            message: "slow down".into(),
        };
        let server = FacebookError::Api {
            status: 503,
            message: "unavailable".into(),
        };
        let forbidden = FacebookError::Api {
            status: 403,
            message: "(#200) permission".into(),
        };
        assert!(throttled.is_retryable());
        assert!(server.is_retryable());
        assert!(!forbidden.is_retryable());
    }

    #[test]
    fn graph_error_envelope_parses() {
        let body = r#"{"error":{"message":"Invalid OAuth access token.","type":"OAuthException","code":190}}"#;
        let envelope: GraphErrorEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.error.message, "Invalid OAuth access token.");
    }

    #[test]
    fn base_url_override_drops_trailing_slash() {
        let client = FacebookClient::new("token")
            .unwrap()
            .with_base_url("http://localhost:9999/");
        assert_eq!(client.base_url, "http://localhost:9999");
    }
}
