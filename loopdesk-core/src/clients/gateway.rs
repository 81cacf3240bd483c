//! HTTP client for the chat gateway's delivery channels
//!
//! The gateway fronts the chat platform. The reconciler only needs three
//! sends from it: into a conversation thread, as a direct message, and into
//! the shared fallback channel. The chat platform itself (rendering,
//! presence, threading rules) stays outside this crate.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;

use crate::config::GatewayConfig;
use crate::error::{Error, Result};

/// Delivery channels exposed by the chat platform.
///
/// Every send either lands or errors; the caller decides what failing over
/// to the next channel means.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Send into a conversation thread.
    async fn send_to_thread(&self, thread_ref: &str, text: &str) -> Result<()>;

    /// Send a direct message to an external identity.
    async fn send_direct(&self, user_ref: &str, text: &str) -> Result<()>;

    /// Send into the shared fallback channel, mentioning the recipient so
    /// the message is attributable.
    async fn send_to_fallback(&self, user_ref: &str, text: &str) -> Result<()>;
}

/// Request body for gateway message endpoints
#[derive(Serialize)]
struct SendMessageRequest<'a> {
    text: &'a str,
    /// Identity to mention, for fallback-channel sends
    #[serde(skip_serializing_if = "Option::is_none")]
    mention: Option<&'a str>,
}

/// HTTP implementation of [`ChatGateway`]
pub struct HttpChatGateway {
    config: GatewayConfig,
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpChatGateway {
    /// Create a new gateway client from configuration
    ///
    /// Returns an error if the configuration is invalid or missing required fields.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| Error::Config("gateway.base_url is required".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(api_key) = &config.api_key {
            let auth_value = format!("Bearer {}", api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
            base_url,
        })
    }

    /// POST a message body to a gateway endpoint, retrying transient failures.
    ///
    /// Retries are bounded and brief: the fallback to the next delivery
    /// channel lives in the reconciler, not here.
    async fn post_message(&self, url: &str, body: &SendMessageRequest<'_>) -> Result<()> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(500);

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    "Retrying gateway send (attempt {}/{}), waiting {:?}",
                    attempt + 1,
                    self.config.max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(5));
            }

            match self.post_once(url, body).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if is_retryable_error(&e) {
                        tracing::warn!("Transient gateway error: {}", e);
                        last_error = Some(e);
                        continue;
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Gateway("max retries exceeded".to_string())))
    }

    async fn post_once(&self, url: &str, body: &SendMessageRequest<'_>) -> Result<()> {
        let response = self
            .http_client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Gateway(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Gateway(format!(
                "API error ({}): {}",
                status, error_text
            )))
        }
    }
}

#[async_trait]
impl ChatGateway for HttpChatGateway {
    async fn send_to_thread(&self, thread_ref: &str, text: &str) -> Result<()> {
        let url = format!(
            "{}/threads/{}/messages",
            self.base_url,
            urlencoding::encode(thread_ref)
        );
        self.post_message(&url, &SendMessageRequest {
            text,
            mention: None,
        })
        .await
    }

    async fn send_direct(&self, user_ref: &str, text: &str) -> Result<()> {
        let url = format!(
            "{}/users/{}/messages",
            self.base_url,
            urlencoding::encode(user_ref)
        );
        self.post_message(&url, &SendMessageRequest {
            text,
            mention: None,
        })
        .await
    }

    async fn send_to_fallback(&self, user_ref: &str, text: &str) -> Result<()> {
        let channel = self
            .config
            .fallback_channel
            .as_deref()
            .ok_or_else(|| Error::Config("gateway.fallback_channel is required".to_string()))?;
        let url = format!(
            "{}/channels/{}/messages",
            self.base_url,
            urlencoding::encode(channel)
        );
        self.post_message(&url, &SendMessageRequest {
            text,
            mention: Some(user_ref),
        })
        .await
    }
}

/// Check if an error is retryable (transient)
fn is_retryable_error(error: &Error) -> bool {
    match error {
        Error::Gateway(msg) => {
            // Retry on 5xx errors and network/timeout failures
            msg.contains("50") && msg.contains("API error")
                || msg.contains("timeout")
                || msg.contains("connection")
                || msg.contains("request failed")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_requires_valid_config() {
        let config = GatewayConfig::default();
        assert!(HttpChatGateway::new(config).is_err());
    }

    #[test]
    fn test_gateway_with_valid_config() {
        let config = GatewayConfig {
            base_url: Some("https://gateway.example.com/".to_string()),
            fallback_channel: Some("900000000000000001".to_string()),
            api_key: Some("gw_test".to_string()),
            ..Default::default()
        };
        let gateway = HttpChatGateway::new(config).unwrap();
        // Trailing slash is normalized away
        assert_eq!(gateway.base_url, "https://gateway.example.com");
    }

    #[test]
    fn test_is_retryable_error() {
        assert!(is_retryable_error(&Error::Gateway(
            "API error (503): unavailable".to_string()
        )));
        assert!(is_retryable_error(&Error::Gateway(
            "HTTP request failed: timeout".to_string()
        )));
        assert!(!is_retryable_error(&Error::Gateway(
            "API error (403): recipient disallows unsolicited messages".to_string()
        )));
        assert!(!is_retryable_error(&Error::Config("bad".to_string())));
    }
}
