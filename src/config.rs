//! Configuration file parser for ~/.config/headlines/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde and logged as warnings so typos are
//! visible.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::feed::FetchOptions;
use crate::util::{validate_feed_url, UrlValidationError};

/// Feed loaded when no `feed_url` is configured.
pub const DEFAULT_FEED_URL: &str = "https://lenta.ru/rss";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid feed_url '{url}': {source}")]
    InvalidFeedUrl {
        url: String,
        #[source]
        source: UrlValidationError,
    },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// RSS feed to load.
    pub feed_url: String,

    /// Timeout for each HTTP attempt, in seconds.
    pub request_timeout_secs: u64,

    /// Retries after rate limiting, server errors or truncated downloads.
    pub max_retries: u32,

    /// Base of the exponential retry backoff, in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Largest feed body accepted, in bytes.
    pub max_feed_size_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        let fetch = FetchOptions::default();
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            request_timeout_secs: fetch.timeout.as_secs(),
            max_retries: fetch.max_retries,
            retry_base_delay_ms: fetch.retry_base_delay.as_millis() as u64,
            max_feed_size_bytes: fetch.max_feed_size,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 5] = [
        "feed_url",
        "request_timeout_secs",
        "max_retries",
        "retry_base_delay_ms",
        "max_feed_size_bytes",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    /// - `feed_url` that is not http(s) → `Err(ConfigError::InvalidFeedUrl)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::from_toml(&content)?;
        tracing::info!(path = %path.display(), feed_url = %config.feed_url, "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from TOML text. Blank text yields the defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the configured feed URL, validating the new one.
    pub fn with_feed_url(mut self, url: &str) -> Result<Self, ConfigError> {
        self.feed_url = url.trim().to_string();
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_feed_url(&self.feed_url).map_err(|source| ConfigError::InvalidFeedUrl {
            url: self.feed_url.clone(),
            source,
        })?;
        Ok(())
    }

    /// Fetch limits derived from this configuration.
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_secs(self.request_timeout_secs),
            max_retries: self.max_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_feed_size: self.max_feed_size_bytes,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
