/// Configuration merger: CLI args > Env vars > Config file > Defaults
///
/// This module handles merging configuration from multiple sources:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables
/// 3. Configuration file
/// 4. Built-in defaults (lowest priority)
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::build::BuildOptions;
use crate::cancel::CancelFlag;
use crate::cli::{BuildArgs, CommonConfigArgs};
use crate::config::{self, GddpConfig};
use crate::formula::{self, Registry};
use crate::key::YearSpan;
use crate::logging::LogFormat;
use crate::store::{
    Credentials, HttpObjectStore, LocalObjectStore, ObjectStore, RetryPolicy, StoreClient, Transports,
};

/// Effective configuration for one command invocation
#[derive(Debug, Clone, Serialize)]
pub struct MergedConfig {
    pub bucket: String,
    pub prefix: String,
    pub endpoint: String,
    pub region: String,
    #[serde(skip)]
    pub access_key: Option<String>,
    #[serde(skip)]
    pub secret_key: Option<String>,
    #[serde(skip)]
    pub token: Option<String>,
    pub cache_dir: PathBuf,
    pub nocache: bool,
    pub max_workers: usize,
    #[serde(serialize_with = "serialize_duration")]
    pub timeout: Duration,
    pub strict: bool,
    pub skip_existing: bool,
    pub baseline: String,
    #[serde(skip)]
    pub baseline_span: YearSpan,
    pub retry_attempts: usize,
    #[serde(serialize_with = "serialize_duration")]
    pub retry_delay: Duration,
    #[serde(serialize_with = "serialize_duration")]
    pub lock_timeout: Duration,
    #[serde(serialize_with = "serialize_duration")]
    pub poll_interval: Duration,
    pub verbose: bool,
    pub log_format: Option<String>,
}

fn serialize_duration<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{}ms", value.as_millis()))
}

impl MergedConfig {
    /// Merge configuration from CLI args and config file
    /// Precedence: CLI > env (already handled by clap) > config file > defaults
    pub fn merge(
        common: &CommonConfigArgs,
        build: Option<&BuildArgs>,
        file_config: Option<GddpConfig>,
    ) -> Result<Self> {
        let file = file_config.unwrap_or_default();
        let build = build.cloned().unwrap_or_default();

        let timeout = build.timeout.clone().unwrap_or_else(|| file.build.timeout.clone());
        let baseline = build.baseline.clone().unwrap_or_else(|| file.build.baseline.clone());
        let max_workers = build.max_workers.unwrap_or(file.build.max_workers);

        let merged = Self {
            bucket: common.bucket.clone().unwrap_or(file.store.bucket),
            prefix: common.prefix.clone().unwrap_or(file.store.prefix),
            endpoint: common.endpoint.clone().unwrap_or(file.store.endpoint),
            region: common.region.clone().unwrap_or(file.store.region),
            access_key: common.access_key.clone().or(file.store.access_key),
            secret_key: common.secret_key.clone().or(file.store.secret_key),
            token: common.token.clone().or(file.store.token),
            cache_dir: PathBuf::from(common.cache_dir.clone().unwrap_or(file.cache.dir)),
            nocache: common.nocache || file.cache.nocache,
            max_workers: if max_workers == 0 { num_cpus::get() } else { max_workers },
            timeout: config::parse_duration(&timeout).context("Invalid build timeout")?,
            strict: !build.permissive && file.build.strict,
            skip_existing: !build.no_skip_existing && file.build.skip_existing,
            baseline_span: config::parse_baseline(&baseline)?,
            baseline,
            retry_attempts: file.retry.attempts.max(1),
            retry_delay: config::parse_duration(&file.retry.delay).context("Invalid retry.delay")?,
            lock_timeout: config::parse_duration(&file.fetch.lock_timeout)
                .context("Invalid fetch.lock_timeout")?,
            poll_interval: config::parse_duration(&file.fetch.poll_interval)
                .context("Invalid fetch.poll_interval")?,
            verbose: common.verbose || file.observability.verbose,
            log_format: common.log_format.clone().or(file.observability.log_format),
        };

        Ok(merged)
    }

    /// Load the config file named on the command line (or discovered) and merge
    pub fn load(common: &CommonConfigArgs, build: Option<&BuildArgs>) -> Result<Self> {
        let file = crate::config_discovery::load_config_with_discovery(common.config.as_deref())?;
        if let Some((path, _)) = &file {
            tracing::debug!("Using config: {}", path.display());
        }
        Self::merge(common, build, file.map(|(_, config)| config))
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format
            .as_deref()
            .and_then(LogFormat::parse)
            .unwrap_or_else(LogFormat::from_env)
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            max_workers: self.max_workers,
            timeout: self.timeout,
            strict: self.strict,
            skip_existing: self.skip_existing,
            ..BuildOptions::default()
        }
    }

    pub fn registry(&self) -> Result<Registry> {
        formula::standard(self.baseline_span).context("Failed to build the formula catalogue")
    }

    fn credentials(&self) -> Option<Credentials> {
        match (&self.access_key, &self.secret_key) {
            (Some(access_key), Some(secret_key)) => Some(Credentials {
                access_key: access_key.clone(),
                secret_key: secret_key.clone(),
                region: self.region.clone(),
            }),
            _ => None,
        }
    }

    /// Object store for the configured endpoint
    ///
    /// `file://` endpoints map the bucket to a directory under the given path.
    pub fn object_store(&self) -> Result<Arc<dyn ObjectStore>> {
        if let Some(root) = self.endpoint.strip_prefix("file://") {
            return Ok(Arc::new(LocalObjectStore::new(PathBuf::from(root).join(&self.bucket))));
        }

        let store = HttpObjectStore::new(self.endpoint.clone(), self.bucket.clone())
            .with_context(|| format!("Invalid store endpoint: {}", self.endpoint))?
            .with_credentials(self.credentials())
            .with_bearer_token(self.token.clone());
        Ok(Arc::new(store))
    }

    pub fn store_client(&self, cancel: CancelFlag) -> Result<StoreClient> {
        let transports = Transports::standard().context("Failed to initialize source transports")?;
        Ok(StoreClient::new(&self.cache_dir, &self.prefix, self.object_store()?, transports)
            .with_retry(RetryPolicy::new(self.retry_attempts, self.retry_delay))
            .with_lock_timeout(self.lock_timeout, self.poll_interval)
            .with_nocache(self.nocache)
            .with_cancel(cancel))
    }
}
