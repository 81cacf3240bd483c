//! Error types for loopdesk-core

use thiserror::Error;

/// Main error type for the loopdesk-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Incident not found
    #[error("incident not found: {0}")]
    IncidentNotFound(String),

    /// Chat gateway error (thread, direct message, or fallback channel)
    #[error("gateway error: {0}")]
    Gateway(String),

    /// All delivery channels exhausted for a notification
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Assist-match collaborator error
    #[error("assist error: {0}")]
    Assist(String),

    /// Classifier collaborator error
    #[error("classifier error: {0}")]
    Classifier(String),
}

/// Result type alias for loopdesk-core
pub type Result<T> = std::result::Result<T, Error>;
