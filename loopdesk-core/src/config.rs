//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/loopdesk/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/loopdesk/` (~/.config/loopdesk/)
//! - Data: `$XDG_DATA_HOME/loopdesk/` (~/.local/share/loopdesk/)
//! - State/Logs: `$XDG_STATE_HOME/loopdesk/` (~/.local/state/loopdesk/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Incident grouping thresholds
    #[serde(default)]
    pub grouping: GroupingConfig,

    /// Notification poller schedule
    #[serde(default)]
    pub poller: PollerConfig,

    /// Chat gateway (delivery channels)
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// AI assist-match collaborator (optional)
    #[serde(default)]
    pub assist: AssistConfig,

    /// Classifier collaborator (optional)
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Grouping-engine thresholds.
///
/// The defaults encode a deliberate precision/recall trade-off: the bar is
/// lower when the candidate set is already narrowed by a shared category.
#[derive(Debug, Deserialize, Clone)]
pub struct GroupingConfig {
    /// Token-overlap threshold when the category already matches
    #[serde(default = "default_category_threshold")]
    pub category_threshold: f64,

    /// Token-overlap threshold for the global fallback pass
    #[serde(default = "default_global_threshold")]
    pub global_threshold: f64,

    /// How many most-recent open incidents to offer the assist collaborator
    #[serde(default = "default_assist_candidates")]
    pub assist_candidates: usize,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            category_threshold: default_category_threshold(),
            global_threshold: default_global_threshold(),
            assist_candidates: default_assist_candidates(),
        }
    }
}

fn default_category_threshold() -> f64 {
    0.40
}

fn default_global_threshold() -> f64 {
    0.45
}

fn default_assist_candidates() -> usize {
    20
}

/// Notification poller configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PollerConfig {
    /// Seconds between poll ticks
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
        }
    }
}

fn default_poll_interval() -> u64 {
    5
}

/// Chat gateway configuration
///
/// The gateway fronts the chat platform's delivery channels: conversation
/// threads, direct messages, and the shared fallback channel.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct GatewayConfig {
    /// Gateway base URL (e.g. `https://gateway.example.com`)
    pub base_url: Option<String>,

    /// Bearer token for the gateway API
    pub api_key: Option<String>,

    /// Shared channel used when thread and direct delivery both fail
    pub fallback_channel: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,

    /// Retries per channel for transient failures, before failing over
    #[serde(default = "default_gateway_retries")]
    pub max_retries: usize,
}

impl GatewayConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_none() {
            return Err(Error::Config("gateway.base_url is required".to_string()));
        }
        if self.fallback_channel.is_none() {
            return Err(Error::Config(
                "gateway.fallback_channel is required".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_gateway_timeout() -> u64 {
    10
}

fn default_gateway_retries() -> usize {
    1
}

/// Assist-match collaborator configuration
///
/// When enabled, the grouping engine asks this collaborator whether a new
/// report names the same underlying problem as a recent open incident.
/// The collaborator is advisory only and must tolerate being unavailable.
#[derive(Debug, Deserialize, Clone)]
pub struct AssistConfig {
    /// Enable/disable the assist-match pass
    #[serde(default)]
    pub enabled: bool,

    /// Collaborator base URL
    pub base_url: Option<String>,

    /// Bearer token
    pub api_key: Option<String>,

    /// Per-request timeout in seconds; on expiry the grouping engine
    /// silently falls through to the global text-similarity pass
    #[serde(default = "default_assist_timeout")]
    pub timeout_secs: u64,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            api_key: None,
            timeout_secs: default_assist_timeout(),
        }
    }
}

impl AssistConfig {
    /// Check if the assist collaborator is configured and enabled
    pub fn is_ready(&self) -> bool {
        self.enabled && self.base_url.is_some()
    }
}

fn default_assist_timeout() -> u64 {
    5
}

/// Classifier collaborator configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    /// Enable/disable the classifier
    #[serde(default)]
    pub enabled: bool,

    /// Collaborator base URL
    pub base_url: Option<String>,

    /// Bearer token
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            api_key: None,
            timeout_secs: default_classifier_timeout(),
        }
    }
}

impl ClassifierConfig {
    /// Check if the classifier is configured and enabled
    pub fn is_ready(&self) -> bool {
        self.enabled && self.base_url.is_some()
    }
}

fn default_classifier_timeout() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/loopdesk/config.toml` (~/.config/loopdesk/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("loopdesk").join("config.toml")
    }

    /// Returns the data directory path (for the SQLite database)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("loopdesk")
    }

    /// Returns the state directory path (for logs)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("loopdesk")
    }

    /// Returns the incident database file path
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("incidents.db")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("loopdesk.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poller.interval_secs, 5);
        assert_eq!(config.grouping.category_threshold, 0.40);
        assert_eq!(config.grouping.global_threshold, 0.45);
        assert_eq!(config.grouping.assist_candidates, 20);
        assert!(!config.assist.is_ready());
        assert!(!config.classifier.is_ready());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[poller]
interval_secs = 15

[grouping]
category_threshold = 0.5

[gateway]
base_url = "https://gateway.example.com"
fallback_channel = "900000000000000001"

[assist]
enabled = true
base_url = "https://assist.example.com"

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.poller.interval_secs, 15);
        assert_eq!(config.grouping.category_threshold, 0.5);
        // Unset fields keep their defaults
        assert_eq!(config.grouping.global_threshold, 0.45);
        assert!(config.gateway.validate().is_ok());
        assert!(config.assist.is_ready());
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_gateway_validation() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_err());

        let config = GatewayConfig {
            base_url: Some("https://gateway.example.com".to_string()),
            ..Default::default()
        };
        // Still missing the fallback channel
        assert!(config.validate().is_err());

        let config = GatewayConfig {
            base_url: Some("https://gateway.example.com".to_string()),
            fallback_channel: Some("900000000000000001".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
