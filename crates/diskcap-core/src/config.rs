use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::transport::RequestTimeouts;

/// Environment variable read by the default token supplier.
pub const DEFAULT_TOKEN_ENV: &str = "DISKCAP_TOKEN";

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per operation (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.5 = 500ms).
    pub base_delay_secs: f64,
    /// Maximum computed backoff delay in seconds.
    pub max_delay_secs: u64,
    /// Prefer a numeric `Retry-After` from the server over computed backoff.
    #[serde(default = "default_true")]
    pub honor_retry_after: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 2.0,
            max_delay_secs: 60,
            honor_retry_after: true,
        }
    }
}

impl RetryConfig {
    /// Negative and NaN values read as zero; infinite or out-of-range values are errors.
    pub fn base_delay(&self) -> Result<Duration, std::time::TryFromFloatSecsError> {
        Duration::try_from_secs_f64(self.base_delay_secs.max(0.0))
    }

    /// An unrepresentable base delay saturates to the cap.
    pub fn policy(&self) -> RetryPolicy {
        let max_delay = Duration::from_secs(self.max_delay_secs);
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: self.base_delay().unwrap_or(max_delay),
            max_delay,
            honor_retry_after: self.honor_retry_after,
        }
    }
}

/// Completion polling defaults (optional section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            timeout_secs: 30 * 60,
        }
    }
}

/// Per-request timeouts (optional section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let t = RequestTimeouts::default();
        Self {
            connect_timeout_secs: t.connect.as_secs(),
            request_timeout_secs: t.overall.as_secs(),
        }
    }
}

/// Global configuration loaded from `~/.config/diskcap/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskcapConfig {
    /// Maximum concurrent operations per batch (None = unbounded).
    #[serde(default)]
    pub concurrency_limit: Option<usize>,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub poll: Option<PollConfig>,
    #[serde(default)]
    pub http: Option<HttpConfig>,
}

impl Default for DiskcapConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: Some(16),
            token_env: default_token_env(),
            retry: None,
            poll: None,
            http: None,
        }
    }
}

impl DiskcapConfig {
    /// Reject values that parse as TOML but cannot drive a policy.
    pub fn validate(&self) -> Result<()> {
        if let Some(retry) = &self.retry {
            retry.base_delay().with_context(|| {
                format!("retry.base_delay_secs = {} is not a usable delay", retry.base_delay_secs)
            })?;
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default().policy()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll.clone().unwrap_or_default().interval_secs.max(1))
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll.clone().unwrap_or_default().timeout_secs)
    }

    pub fn request_timeouts(&self) -> RequestTimeouts {
        let http = self.http.clone().unwrap_or_default();
        RequestTimeouts {
            connect: Duration::from_secs(http.connect_timeout_secs.max(1)),
            overall: Duration::from_secs(http.request_timeout_secs.max(1)),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("diskcap")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DiskcapConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = DiskcapConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit path.
pub fn load_from_path(path: &Path) -> Result<DiskcapConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg: DiskcapConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
