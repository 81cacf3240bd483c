//! HTTP client for the classifier collaborator
//!
//! The classifier reads a report (plus recent conversation) and returns
//! labels, a draft response, and two routing signals: `confidence` and
//! `escalation_required`. Those two signals alone decide "respond directly"
//! versus "open an incident". Prompt design and categorization text live in
//! the collaborator, not here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::ClassifierConfig;
use crate::error::{Error, Result};
use crate::types::HistoryEntry;

/// Classifier confidence in its own draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Result of analyzing a report
#[derive(Debug, Clone, Deserialize)]
pub struct Analysis {
    /// Standardized issue title (e.g. "VPN Access Failure")
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    /// Draft solution, admin-perspective
    #[serde(default)]
    pub draft: Option<String>,
    pub confidence: Confidence,
    /// True when a human admin must handle this
    #[serde(default)]
    pub escalation_required: bool,
    /// False for chit-chat and off-topic queries
    #[serde(default = "default_true")]
    pub is_relevant: bool,
}

fn default_true() -> bool {
    true
}

impl Analysis {
    /// Degraded analysis used when the classifier is unreachable: lowest
    /// confidence and forced escalation, so the report still becomes an
    /// incident instead of being dropped.
    pub fn unavailable() -> Self {
        Self {
            title: None,
            category: None,
            subcategory: None,
            draft: None,
            confidence: Confidence::Low,
            escalation_required: true,
            is_relevant: true,
        }
    }
}

/// Classifier collaborator seam.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn analyze(&self, query: &str, history: &[HistoryEntry]) -> Result<Analysis>;
}

/// Request body for POST /analyze
#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    query: &'a str,
    history: &'a [HistoryEntry],
}

/// HTTP implementation of [`Classifier`]
pub struct HttpClassifier {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpClassifier {
    /// Create a new classifier client from configuration
    ///
    /// Returns `None` if the classifier is not enabled or configured.
    pub fn new(config: &ClassifierConfig) -> Result<Option<Self>> {
        if !config.is_ready() {
            return Ok(None);
        }

        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| Error::Config("classifier.base_url is required".to_string()))?
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
impl Classifier for HttpClassifier {
    async fn analyze(&self, query: &str, history: &[HistoryEntry]) -> Result<Analysis> {
        let url = format!("{}/analyze", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .json(&AnalyzeRequest { query, history })
            .send()
            .await
            .map_err(|e| Error::Classifier(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::Classifier(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let analysis: Analysis = response
            .json()
            .await
            .map_err(|e| Error::Classifier(format!("failed to parse response: {}", e)))?;

        Ok(analysis)
    }
}
