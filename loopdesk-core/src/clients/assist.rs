//! HTTP client for the assist-match collaborator
//!
//! The assist-match service is asked whether a new report names the same
//! underlying problem as a recent open incident. It is strictly advisory:
//! the grouping engine tolerates it being slow, wrong, or absent, and always
//! has a text-similarity fallback behind it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::AssistConfig;
use crate::error::{Error, Result};
use crate::types::IncidentId;

/// A candidate offered to the assist collaborator: enough to reason about,
/// nothing more.
#[derive(Debug, Clone, Serialize)]
pub struct AssistCandidate {
    pub id: IncidentId,
    pub query: String,
}

/// Assist-match collaborator seam.
#[async_trait]
pub trait AssistMatcher: Send + Sync {
    /// Return the candidate the query matches, or `None` for no match.
    ///
    /// Errors are expected and non-fatal; callers fall through to their
    /// next strategy.
    async fn match_incident(
        &self,
        query: &str,
        candidates: &[AssistCandidate],
    ) -> Result<Option<IncidentId>>;
}

/// Request body for POST /match
#[derive(Serialize)]
struct MatchRequest<'a> {
    query: &'a str,
    candidates: &'a [AssistCandidate],
}

/// Response from POST /match
#[derive(Deserialize)]
struct MatchResponse {
    /// Matched incident ID, absent or null for no match
    #[serde(default)]
    matched_id: Option<String>,
}

/// HTTP implementation of [`AssistMatcher`]
pub struct HttpAssistMatcher {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpAssistMatcher {
    /// Create a new assist client from configuration
    ///
    /// Returns `None` if the assist collaborator is not enabled or configured.
    pub fn new(config: &AssistConfig) -> Result<Option<Self>> {
        if !config.is_ready() {
            return Ok(None);
        }

        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| Error::Config("assist.base_url is required".to_string()))?
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

        Ok(Some(Self {
            http_client,
            base_url,
        }))
    }
}

#[async_trait]
impl AssistMatcher for HttpAssistMatcher {
    async fn match_incident(
        &self,
        query: &str,
        candidates: &[AssistCandidate],
    ) -> Result<Option<IncidentId>> {
        let url = format!("{}/match", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .json(&MatchRequest { query, candidates })
            .send()
            .await
            .map_err(|e| Error::Assist(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::Assist(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let result: MatchResponse = response
            .json()
            .await
            .map_err(|e| Error::Assist(format!("failed to parse response: {}", e)))?;

        Ok(result.matched_id.map(|s| IncidentId::from(s.as_str())))
    }
}
