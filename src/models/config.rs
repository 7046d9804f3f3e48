//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP client and retry behavior settings
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Challenge-solving proxy settings
    #[serde(default)]
    pub solver: SolverConfig,

    /// Change-detection worker settings
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Subscription storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.base_url.trim().is_empty() {
            return Err(AppError::validation("fetcher.base_url is empty"));
        }
        url::Url::parse(&self.fetcher.base_url)
            .map_err(|e| AppError::validation(format!("fetcher.base_url is invalid: {e}")))?;
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::validation("fetcher.timeout_secs must be > 0"));
        }
        if self.fetcher.max_concurrent == 0 {
            return Err(AppError::validation("fetcher.max_concurrent must be > 0"));
        }
        if self.fetcher.retry_statuses.is_empty() {
            return Err(AppError::validation("fetcher.retry_statuses is empty"));
        }
        if self.solver.mode == SolverMode::Proxy && self.solver.url.trim().is_empty() {
            return Err(AppError::validation(
                "solver.url is required in proxy mode",
            ));
        }
        if self.worker.interval_secs == 0 {
            return Err(AppError::validation("worker.interval_secs must be > 0"));
        }
        if self.worker.max_days == 0 {
            return Err(AppError::validation("worker.max_days must be > 0"));
        }
        Ok(())
    }
}

/// HTTP client and retry behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Base URL of the utility site
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Request timeout in seconds (generous: challenge pages stall)
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent outbound requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Maximum retry attempts for retryable failures
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds (doubles per attempt)
    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,

    /// HTTP status codes that trigger a retry
    #[serde(default = "defaults::retry_statuses")]
    pub retry_statuses: Vec<u16>,

    /// User-Agent header sent until the challenge solver supplies one
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Accept-Language header for all requests
    #[serde(default = "defaults::accept_language")]
    pub accept_language: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            max_retries: defaults::max_retries(),
            base_delay_ms: defaults::base_delay_ms(),
            retry_statuses: defaults::retry_statuses(),
            user_agent: defaults::user_agent(),
            accept_language: defaults::accept_language(),
        }
    }
}

/// Operating mode for anti-bot traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverMode {
    /// Issue requests directly, falling back to the solver on a challenge
    Direct,
    /// Route every request through the solver's browser session
    Proxy,
}

/// Challenge-solving proxy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Endpoint of the FlareSolverr-compatible proxy
    #[serde(default = "defaults::solver_url")]
    pub url: String,

    /// Direct requests with challenge fallback, or full proxying
    #[serde(default = "defaults::solver_mode")]
    pub mode: SolverMode,

    /// Browser session name reused across proxied requests
    #[serde(default = "defaults::solver_session")]
    pub session: String,

    /// Challenge budget passed to the proxy, in milliseconds
    #[serde(default = "defaults::solver_max_timeout_ms")]
    pub max_timeout_ms: u64,

    /// HTTP timeout for talking to the proxy itself, in seconds
    #[serde(default = "defaults::solver_timeout")]
    pub timeout_secs: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            url: defaults::solver_url(),
            mode: defaults::solver_mode(),
            session: defaults::solver_session(),
            max_timeout_ms: defaults::solver_max_timeout_ms(),
            timeout_secs: defaults::solver_timeout(),
        }
    }
}

/// Change-detection worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Seconds between polling ticks
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Calendar days to parse per schedule, starting today
    #[serde(default = "defaults::max_days")]
    pub max_days: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
            max_days: defaults::max_days(),
        }
    }
}

/// Subscription storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the JSON subscription store
    #[serde(default = "defaults::storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: defaults::storage_path(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (error, warn, info, debug, trace)
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use super::SolverMode;

    // Fetcher defaults
    pub fn base_url() -> String {
        "https://voe.com.ua".into()
    }
    pub fn timeout() -> u64 {
        150
    }
    pub fn max_concurrent() -> usize {
        3
    }
    pub fn max_retries() -> u32 {
        4
    }
    pub fn base_delay_ms() -> u64 {
        1000
    }
    pub fn retry_statuses() -> Vec<u16> {
        vec![500, 502, 503, 504]
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/141.0.0.0 Safari/537.36"
            .into()
    }
    pub fn accept_language() -> String {
        "uk-UA,uk;q=0.9,en-US;q=0.8,en;q=0.7".into()
    }

    // Solver defaults
    pub fn solver_url() -> String {
        "http://localhost:8191/v1".into()
    }
    pub fn solver_mode() -> SolverMode {
        SolverMode::Direct
    }
    pub fn solver_session() -> String {
        "gridwatch".into()
    }
    pub fn solver_max_timeout_ms() -> u64 {
        120_000
    }
    pub fn solver_timeout() -> u64 {
        120
    }

    // Worker defaults
    pub fn interval() -> u64 {
        900
    }
    pub fn max_days() -> usize {
        2
    }

    // Storage defaults
    pub fn storage_path() -> String {
        "data/subscriptions.json".into()
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_base_url() {
        let mut config = Config::default();
        config.fetcher.base_url = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.fetcher.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_requires_solver_url_in_proxy_mode() {
        let mut config = Config::default();
        config.solver.mode = SolverMode::Proxy;
        config.solver.url = "".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn solver_mode_parses_from_toml() {
        let config: Config = toml::from_str("[solver]\nmode = \"proxy\"").unwrap();
        assert_eq!(config.solver.mode, SolverMode::Proxy);
    }
}
