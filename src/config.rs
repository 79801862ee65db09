use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::key::YearSpan;
use crate::xdg;

/// Complete GDDP configuration (loaded from TOML file)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GddpConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Remote object store holding published artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Key prefix inside the bucket
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// S3-compatible endpoint (`https://...`) or a local directory (`file:///...`)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Signing region for S3 credentials
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub access_key: Option<String>,

    #[serde(default)]
    pub secret_key: Option<String>,

    /// Bearer token sent with every store request
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            prefix: default_prefix(),
            endpoint: default_endpoint(),
            region: default_region(),
            access_key: None,
            secret_key: None,
            token: None,
        }
    }
}

/// Local artifact cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: String,

    /// Remove inputs and outputs from the cache once a task has published
    #[serde(default)]
    pub nocache: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            nocache: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Worker threads; 0 means one per CPU
    #[serde(default)]
    pub max_workers: usize,

    /// Longest wait for any in-process task to finish
    #[serde(default = "default_timeout")]
    pub timeout: String,

    /// Abort on the first failed task
    #[serde(default = "default_true")]
    pub strict: bool,

    #[serde(default = "default_true")]
    pub skip_existing: bool,

    /// Reference period for baseline-relative indicators
    #[serde(default = "default_baseline")]
    pub baseline: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_workers: 0,
            timeout: default_timeout(),
            strict: true,
            skip_existing: true,
            baseline: default_baseline(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: usize,

    /// Fixed pause between attempts
    #[serde(default = "default_retry_delay")]
    pub delay: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay: default_retry_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Age after which another process's fetch lock is considered stale
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            lock_timeout: default_lock_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub verbose: bool,

    /// pretty, compact or json
    #[serde(default)]
    pub log_format: Option<String>,
}

// Default value functions
fn default_bucket() -> String {
    "gddp".to_string()
}

fn default_prefix() -> String {
    "gddp".to_string()
}

fn default_endpoint() -> String {
    "https://s3.amazonaws.com".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_cache_dir() -> String {
    xdg::cache_dir().display().to_string()
}

fn default_timeout() -> String {
    "900s".to_string()
}

fn default_baseline() -> String {
    "1970-2000".to_string()
}

fn default_attempts() -> usize {
    5
}

fn default_retry_delay() -> String {
    "5s".to_string()
}

fn default_lock_timeout() -> String {
    "360s".to_string()
}

fn default_poll_interval() -> String {
    "1s".to_string()
}

fn default_true() -> bool {
    true
}

/// Parse duration string (e.g., "900s", "5m", "1h", "500ms")
pub fn parse_duration(s: &str) -> Result<Duration> {
    if let Some(millis) = s.strip_suffix("ms") {
        let millis: u64 = millis
            .parse()
            .map_err(|_| anyhow!("Invalid duration: {}", s))?;
        return Ok(Duration::from_millis(millis));
    }
    if s.is_empty() {
        return Err(anyhow!("Empty duration string"));
    }

    let (num_str, unit) = s.split_at(s.len() - 1);
    let num: u64 = num_str
        .parse()
        .map_err(|_| anyhow!("Invalid duration: {}", s))?;

    let seconds = match unit {
        "s" => num,
        "m" => num * 60,
        "h" => num * 3600,
        _ => return Err(anyhow!("Invalid duration unit: {}. Use: ms, s, m, h", unit)),
    };

    Ok(Duration::from_secs(seconds))
}

/// Parse a `start-end` baseline window
pub fn parse_baseline(s: &str) -> Result<YearSpan> {
    match YearSpan::parse(s) {
        Some(span @ YearSpan::Range(start, end)) if start <= end => Ok(span),
        _ => Err(anyhow!("baseline must be a year range like 1970-2000, got {}", s)),
    }
}

impl GddpConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: GddpConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Annotated example configuration for `gddp config example`
    pub fn example() -> Result<String> {
        let config = GddpConfig {
            store: StoreConfig {
                bucket: "gddp".to_string(),
                prefix: "gddp".to_string(),
                endpoint: "https://s3.us-east-1.amazonaws.com".to_string(),
                ..Default::default()
            },
            cache: CacheConfig {
                dir: "/data/gddp/cache".to_string(),
                nocache: false,
            },
            build: BuildConfig {
                max_workers: 8,
                ..Default::default()
            },
            observability: ObservabilityConfig {
                verbose: false,
                log_format: Some("pretty".to_string()),
            },
            ..Default::default()
        };

        toml::to_string_pretty(&config).context("Failed to render example config")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache.dir.is_empty() {
            anyhow::bail!("cache.dir must be set");
        }

        if self.store.bucket.is_empty() {
            anyhow::bail!("store.bucket must be set");
        }

        if !self.store.endpoint.starts_with("http://")
            && !self.store.endpoint.starts_with("https://")
            && !self.store.endpoint.starts_with("file://")
        {
            anyhow::bail!(
                "store.endpoint must start with http://, https://, or file://: {}",
                self.store.endpoint
            );
        }

        if self.retry.attempts == 0 {
            anyhow::bail!("retry.attempts must be at least 1");
        }

        for (name, value) in [
            ("build.timeout", &self.build.timeout),
            ("retry.delay", &self.retry.delay),
            ("fetch.lock_timeout", &self.fetch.lock_timeout),
            ("fetch.poll_interval", &self.fetch.poll_interval),
        ] {
            parse_duration(value).with_context(|| format!("{} is not a valid duration", name))?;
        }

        parse_baseline(&self.build.baseline).context("build.baseline is invalid")?;

        if let Some(format) = &self.observability.log_format {
            if crate::logging::LogFormat::parse(format).is_none() {
                anyhow::bail!("observability.log_format must be one of: pretty, compact, json");
            }
        }

        Ok(())
    }
}
