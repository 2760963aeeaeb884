use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::job::JobConfig;
use crate::retry::{Backoff, RetryPolicy};
use crate::source::CurlOptions;

/// What the pool does when one range fails terminally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureMode {
    /// Let every range drain to Finished or Failed, then report.
    #[default]
    FailSlow,
    /// Abort in-flight ranges and drop queued ones on the first failure.
    FailFast,
}

/// Retry delay growth: "fixed" (default) or "exponential".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

fn default_threads() -> usize {
    4
}
fn default_chunk_size() -> u64 {
    1024 * 1024
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_retry_on() -> Vec<u16> {
    vec![429, 500, 502, 503, 504]
}
fn default_max_retry_delay_ms() -> u64 {
    30_000
}
fn default_connect_timeout_secs() -> u64 {
    30
}
fn default_low_speed_limit() -> u32 {
    1024
}
fn default_low_speed_time_secs() -> u64 {
    60
}

/// Fetch settings loaded from `~/.config/chunkfetch/config.toml`.
///
/// Every field has a default, so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum concurrent range fetches.
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Bytes per range.
    #[serde(default = "default_chunk_size", alias = "range_size")]
    pub chunk_size: u64,
    /// Retries per range, not counting the first attempt.
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// HTTP statuses that are retried. Transport errors always are.
    #[serde(default = "default_retry_on")]
    pub retry_on: Vec<u16>,
    #[serde(default)]
    pub failure_mode: FailureMode,
    #[serde(default)]
    pub backoff: BackoffKind,
    /// Cap for exponential backoff.
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Stall detection: abort a range below this many bytes/s ...
    #[serde(default = "default_low_speed_limit")]
    pub low_speed_limit: u32,
    /// ... sustained for this long.
    #[serde(default = "default_low_speed_time_secs")]
    pub low_speed_time_secs: u64,
    /// Extra request headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            chunk_size: default_chunk_size(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_on: default_retry_on(),
            failure_mode: FailureMode::default(),
            backoff: BackoffKind::default(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            low_speed_limit: default_low_speed_limit(),
            low_speed_time_secs: default_low_speed_time_secs(),
            headers: BTreeMap::new(),
        }
    }
}

impl FetchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            bail!("threads must be at least 1");
        }
        if self.chunk_size == 0 {
            bail!("chunk_size must be at least 1 byte");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let backoff = match self.backoff {
            BackoffKind::Fixed => Backoff::Fixed,
            BackoffKind::Exponential => Backoff::Exponential {
                max_delay: Duration::from_millis(self.max_retry_delay_ms),
            },
        };
        RetryPolicy {
            retries: self.retries,
            delay: Duration::from_millis(self.retry_delay_ms),
            retry_on: self.retry_on.iter().copied().collect(),
            backoff,
        }
    }

    pub fn curl_options(&self) -> CurlOptions {
        CurlOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            low_speed_limit: self.low_speed_limit,
            low_speed_time: Duration::from_secs(self.low_speed_time_secs),
            buffer_size: None,
            headers: self.headers.clone(),
        }
    }

    /// Job settings for `url`; the content length is left to the probe.
    pub fn job_config(&self, url: impl Into<String>) -> JobConfig {
        JobConfig {
            url: url.into(),
            content_length: None,
            threads: self.threads,
            chunk_size: self.chunk_size,
            retry: self.retry_policy(),
            failure_mode: self.failure_mode,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("chunkfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: FetchConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}
