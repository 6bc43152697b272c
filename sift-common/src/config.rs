//! Configuration management for the sift pipeline.
//!
//! All settings live in a single JSON config file passed on the command
//! line. The file is optional: every field has a usable default, so the
//! binary runs with no configuration at all. A path that is passed but
//! cannot be read is an error.
//!
//! # Configuration Priority
//!
//! 1. Explicit config file values
//! 2. Environment variables (SIFT_* prefix)
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `SIFT_LOG_LEVEL` → observability.log_level
//! - `SIFT_LOG_FORMAT` → observability.log_format
//! - `SIFT_EXCHANGE_URL` → exchange.base_url
//! - `SIFT_OUTPUT_DIR` → screener.output_dir

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root configuration for the sift pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Exchange API configuration
    #[serde(default)]
    pub exchange: ExchangeConfig,

    /// Screener run configuration
    #[serde(default)]
    pub screener: ScreenerConfig,
}

impl Config {
    /// Load configuration from an optional path.
    ///
    /// `None` yields the default configuration. In both cases environment
    /// overrides are applied afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("SIFT_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("SIFT_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Ok(url) = std::env::var("SIFT_EXCHANGE_URL") {
            self.exchange.base_url = url;
        }
        if let Ok(dir) = std::env::var("SIFT_OUTPUT_DIR") {
            self.screener.output_dir = dir;
        }
    }

    /// Check the configuration for values that would make a run nonsensical.
    ///
    /// Called once at startup; a validation failure is fatal.
    pub fn validate(&self) -> Result<()> {
        if self.exchange.base_url.is_empty() {
            bail!("exchange.base_url must not be empty");
        }
        if self.exchange.requests_per_minute == 0 {
            bail!("exchange.requests_per_minute must be at least 1");
        }
        if self.exchange.candles_per_page == 0 {
            bail!("exchange.candles_per_page must be at least 1");
        }
        if self.screener.universe_size == 0 {
            bail!("screener.universe_size must be at least 1");
        }
        if self.screener.max_concurrency == 0 {
            bail!("screener.max_concurrency must be at least 1");
        }
        if self.screener.run_timeout_secs == 0 {
            bail!("screener.run_timeout_secs must be at least 1");
        }
        if self.screener.output_dir.is_empty() {
            bail!("screener.output_dir must not be empty");
        }
        Ok(())
    }
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// ============================================================================
// Exchange Configuration
// ============================================================================

/// Exchange REST API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Base URL of the exchange REST API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Request budget shared by all fetch workers
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Maximum candles requested per page (exchange caps this at 300)
    #[serde(default = "default_candles_per_page")]
    pub candles_per_page: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            requests_per_minute: default_requests_per_minute(),
            candles_per_page: default_candles_per_page(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.okx.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_requests_per_minute() -> u32 {
    600
}

fn default_candles_per_page() -> usize {
    300
}

// ============================================================================
// Screener Configuration
// ============================================================================

/// Run-level screener configuration.
///
/// The screening plan itself (timeframes, indicators, rules) is a separate
/// document; `plan_path` points at it. When unset, the built-in default
/// plan is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerConfig {
    /// Number of instruments to screen, ranked by 24h volume
    #[serde(default = "default_universe_size")]
    pub universe_size: usize,

    /// Maximum symbols evaluated concurrently
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Fetch attempts per request before the symbol is dropped from the run
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,

    /// Base backoff between retries in milliseconds (grows linearly)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Hard ceiling on total run duration in seconds
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,

    /// Directory snapshots are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Optional path to a JSON screening plan overriding the built-in one
    #[serde(default)]
    pub plan_path: Option<String>,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            universe_size: default_universe_size(),
            max_concurrency: default_max_concurrency(),
            fetch_retries: default_fetch_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            run_timeout_secs: default_run_timeout_secs(),
            output_dir: default_output_dir(),
            plan_path: None,
        }
    }
}

fn default_universe_size() -> usize {
    195
}

fn default_max_concurrency() -> usize {
    8
}

fn default_fetch_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_run_timeout_secs() -> u64 {
    600
}

fn default_output_dir() -> String {
    "snapshots".to_string()
}

// ============================================================================
// Tests
// ============================================================================
