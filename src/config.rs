use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::voter::evaluator::VotingPolicy;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    /// Conversation to watch, e.g. "12036341...@g.us" or "9194...@c.us".
    target_chat_id: String,
    /// Option text to vote for.
    #[serde(default = "default_target_option")]
    target_option: String,
    /// Polls older than this many hours are ignored.
    #[serde(default = "default_window_hours")]
    eligibility_window_hours: i64,
    /// Recovery scan period in milliseconds.
    #[serde(default = "default_scan_interval_ms")]
    scan_interval_ms: u64,
    /// Messages fetched per recovery scan.
    #[serde(default = "default_scan_depth")]
    scan_depth: usize,
    /// Delay before the first recovery scan in milliseconds.
    #[serde(default = "default_initial_scan_delay_ms")]
    initial_scan_delay_ms: u64,
    /// Base URL of the WhatsApp gateway.
    #[serde(default = "default_api_url")]
    api_url: String,
    id_instance: String,
    api_token: String,
    /// Directory for state files (history, logs). Defaults to current directory.
    data_dir: Option<String>,
}

fn default_target_option() -> String {
    "Yes".to_string()
}

fn default_window_hours() -> i64 {
    24
}

fn default_scan_interval_ms() -> u64 {
    60_000
}

fn default_scan_depth() -> usize {
    10
}

fn default_initial_scan_delay_ms() -> u64 {
    5_000
}

fn default_api_url() -> String {
    "https://api.green-api.com".to_string()
}

pub struct Config {
    pub target_chat_id: String,
    pub target_option: String,
    pub eligibility_window_hours: i64,
    pub scan_interval_ms: u64,
    pub scan_depth: usize,
    pub initial_scan_delay_ms: u64,
    pub api_url: String,
    pub id_instance: String,
    pub api_token: String,
    /// Directory for state files (history, logs).
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        // Validate required fields
        if file.target_chat_id.is_empty() {
            return Err(ConfigError::Validation("target_chat_id is required".into()));
        }
        // WhatsApp conversation ids look like {number}@c.us or {number}@g.us
        if !file.target_chat_id.contains('@') {
            return Err(ConfigError::Validation(
                "target_chat_id appears invalid (expected format: 123456789@c.us or ...@g.us)".into(),
            ));
        }
        if file.target_option.trim().is_empty() {
            return Err(ConfigError::Validation("target_option must not be blank".into()));
        }
        if file.id_instance.is_empty() {
            return Err(ConfigError::Validation("id_instance is required".into()));
        }
        if file.api_token.is_empty() {
            return Err(ConfigError::Validation("api_token is required".into()));
        }
        if file.eligibility_window_hours < 1 {
            return Err(ConfigError::Validation(
                "eligibility_window_hours must be at least 1".into(),
            ));
        }
        if file.scan_interval_ms == 0 {
            return Err(ConfigError::Validation("scan_interval_ms must be non-zero".into()));
        }
        if file.scan_depth == 0 {
            return Err(ConfigError::Validation("scan_depth must be at least 1".into()));
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            target_chat_id: file.target_chat_id,
            target_option: file.target_option,
            eligibility_window_hours: file.eligibility_window_hours,
            scan_interval_ms: file.scan_interval_ms,
            scan_depth: file.scan_depth,
            initial_scan_delay_ms: file.initial_scan_delay_ms,
            api_url: file.api_url,
            id_instance: file.id_instance,
            api_token: file.api_token,
            data_dir,
        })
    }

    /// Voting policy snapshot derived from this configuration.
    pub fn policy(&self) -> VotingPolicy {
        VotingPolicy {
            chat_id: self.target_chat_id.clone(),
            target_option: self.target_option.clone(),
            eligibility_window_hours: self.eligibility_window_hours,
            scan_interval: Duration::from_millis(self.scan_interval_ms),
            scan_depth: self.scan_depth,
            initial_scan_delay: Duration::from_millis(self.initial_scan_delay_ms),
        }
    }

    /// Path of the persisted vote history file.
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("poll_history.json")
    }
}
