//! Artifact store client
//!
//! Artifacts live in two places: a local cache directory (one file per
//! artifact, named by its key or, for raw sources, by the URI basename) and a
//! remote object store under `{prefix}/{key}`. Raw sources are never
//! published; they are downloaded on demand through the transport matching
//! their URI scheme.
//!
//! The remote listing used by [`StoreClient::exists`] is fetched once per
//! client and reused for its lifetime. Objects created afterwards by other
//! processes are not seen until a new client is built; objects this client
//! publishes are added to the memo as they land.

pub mod lock;
pub mod object_store;
pub mod retry;
pub mod sigv4;
pub mod transport;

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cancel::{CancelFlag, PartialFile};
use crate::error::{StoreError, TransportError};
use crate::graph::ExistenceCheck;
use crate::key::is_source_uri;
use crate::logging::{operations, status};

pub use lock::FetchLock;
pub use object_store::{HttpObjectStore, LocalObjectStore, ObjectInfo, ObjectStore};
pub use retry::RetryPolicy;
pub use sigv4::Credentials;
pub use transport::{FtpTransport, HttpTransport, Transport, Transports};

pub struct StoreClient {
    cache_dir: PathBuf,
    prefix: String,
    remote: Arc<dyn ObjectStore>,
    transports: Transports,
    retry: RetryPolicy,
    lock_timeout: Duration,
    poll_interval: Duration,
    nocache: bool,
    cancel: CancelFlag,
    /// Remote object names, listed on first use
    listing: Mutex<Option<HashSet<String>>>,
}

impl StoreClient {
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        remote: Arc<dyn ObjectStore>,
        transports: Transports,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
            remote,
            transports,
            retry: RetryPolicy::default(),
            lock_timeout: Duration::from_secs(360),
            poll_interval: Duration::from_secs(1),
            nocache: false,
            cancel: CancelFlag::new(),
            listing: Mutex::new(None),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// How long to wait on another caller's fetch lock, and how often to poll it
    pub fn with_lock_timeout(mut self, timeout: Duration, poll: Duration) -> Self {
        self.lock_timeout = timeout;
        self.poll_interval = poll;
        self
    }

    /// Do not trust or keep local copies
    pub fn with_nocache(mut self, nocache: bool) -> Self {
        self.nocache = nocache;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn nocache(&self) -> bool {
        self.nocache
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Remote object name for a key
    pub fn object_name(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }

    /// Cache path for a key or source URI
    pub fn local_path(&self, key: &str) -> PathBuf {
        if is_source_uri(key) {
            self.cache_dir.join(transport::basename(key))
        } else {
            self.cache_dir.join(key)
        }
    }

    fn listing_prefix(&self) -> String {
        if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.prefix)
        }
    }

    fn memo(&self) -> MutexGuard<'_, Option<HashSet<String>>> {
        self.listing.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn list_remote(&self) -> Result<Vec<ObjectInfo>, StoreError> {
        let prefix = self.listing_prefix();
        self.retry
            .run(operations::LIST, &prefix, &self.cancel, |_| self.remote.list(&prefix))
            .map_err(|(_, source)| StoreError::Listing { prefix, source })
    }

    /// True if cached locally, always for source URIs, otherwise per the
    /// memoized remote listing
    pub fn exists(&self, key: &str) -> Result<bool, StoreError> {
        if is_source_uri(key) {
            return Ok(true);
        }
        if !self.nocache && self.local_path(key).is_file() {
            return Ok(true);
        }

        let name = self.object_name(key);
        let mut memo = self.memo();
        if memo.is_none() {
            let objects = self.list_remote()?;
            debug!(
                operation = operations::LIST,
                objects = objects.len(),
                "memoized remote listing"
            );
            *memo = Some(objects.into_iter().map(|o| o.name).collect());
        }
        Ok(memo.as_ref().is_some_and(|names| names.contains(&name)))
    }

    fn download(&self, key: &str, dest: &mut dyn Write) -> Result<u64, TransportError> {
        if is_source_uri(key) {
            self.transports
                .for_uri(key)?
                .download(key, dest, &self.cancel)
        } else {
            self.remote.get(&self.object_name(key), dest, &self.cancel)
        }
    }

    /// Local path of an artifact, downloading it first if needed
    ///
    /// Concurrent fetches of the same key (from any process sharing the cache
    /// directory) download it once; the others wait on the sentinel lock and
    /// then find the completed file.
    pub fn fetch(&self, key: &str) -> Result<PathBuf, StoreError> {
        let target = self.local_path(key);
        if target.is_file() {
            debug!(operation = operations::FETCH, status = status::HIT, key = %key, "cache hit");
            return Ok(target);
        }

        let _lock = FetchLock::acquire(&target, self.lock_timeout, self.poll_interval, &self.cancel)?;
        if target.is_file() {
            debug!(operation = operations::FETCH, status = status::HIT, key = %key, "fetched by another caller");
            return Ok(target);
        }

        let (partial, size) = self
            .retry
            .run(operations::FETCH, key, &self.cancel, |attempt| {
                debug!(operation = operations::FETCH, key = %key, attempt, "downloading");
                let mut partial = PartialFile::create(&target)?;
                let size = self.download(key, &mut partial)?;
                Ok((partial, size))
            })
            .map_err(|(attempts, source)| match source {
                TransportError::Cancelled => StoreError::Cancelled(key.to_string()),
                source => StoreError::Fetch {
                    key: key.to_string(),
                    attempts,
                    source,
                },
            })?;

        let path = partial.commit().map_err(|e| StoreError::io(&target, e))?;
        info!(
            operation = operations::FETCH,
            status = status::SUCCESS,
            key = %key,
            size_bytes = size,
            "fetched"
        );
        Ok(path)
    }

    /// Upload a local file as `key`
    ///
    /// If the upload fails or is cancelled the remote object is deleted so a
    /// partial artifact never passes an existence check.
    pub fn publish(&self, local_path: &Path, key: &str) -> Result<(), StoreError> {
        let name = self.object_name(key);
        let result = self
            .retry
            .run(operations::PUBLISH, key, &self.cancel, |_| {
                self.remote.put(&name, local_path, &self.cancel)
            });

        match result {
            Ok(size) => {
                if let Some(names) = self.memo().as_mut() {
                    names.insert(name);
                }
                info!(
                    operation = operations::PUBLISH,
                    status = status::SUCCESS,
                    key = %key,
                    size_bytes = size,
                    "published"
                );
                Ok(())
            }
            Err((_, source)) => {
                if let Err(e) = self.remote.delete(&name) {
                    warn!(
                        operation = operations::PUBLISH,
                        status = status::ERROR,
                        key = %key,
                        "failed to delete partial remote object: {}",
                        e
                    );
                }
                match source {
                    TransportError::Cancelled => Err(StoreError::Cancelled(key.to_string())),
                    source => Err(StoreError::Publish {
                        key: key.to_string(),
                        source,
                    }),
                }
            }
        }
    }

    /// Best-effort removal of local files
    pub fn purge<P: AsRef<Path>>(&self, paths: &[P]) {
        for path in paths {
            let path = path.as_ref();
            match fs::remove_file(path) {
                Ok(()) => debug!(operation = operations::PURGE, path = %path.display(), "purged"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => debug!(
                    operation = operations::PURGE,
                    path = %path.display(),
                    "failed to purge: {}",
                    e
                ),
            }
        }
    }

    /// Delete zero-byte remote objects left by failed publishes
    pub fn prune_empty_remote_objects(&self) -> Result<usize, StoreError> {
        let empty: Vec<String> = self
            .list_remote()?
            .into_iter()
            .filter(|o| o.size == 0)
            .map(|o| o.name)
            .collect();

        let mut pruned = 0;
        for name in &empty {
            match self.remote.delete(name) {
                Ok(()) => {
                    info!(operation = operations::PRUNE, key = %name, "deleted empty object");
                    if let Some(names) = self.memo().as_mut() {
                        names.remove(name);
                    }
                    pruned += 1;
                }
                Err(e) => warn!(
                    operation = operations::PRUNE,
                    status = status::ERROR,
                    key = %name,
                    "failed to delete empty object: {}",
                    e
                ),
            }
        }
        Ok(pruned)
    }

    /// Remove every cached artifact; returns the number of files removed
    pub fn clean_cache(&self) -> Result<usize, StoreError> {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StoreError::io(&self.cache_dir, e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.cache_dir, e))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            // Locks and partial files belong to fetches that may still be running
            if is_file && !hidden {
                files.push(entry.path());
            }
        }
        self.purge(&files);
        Ok(files.len())
    }
}

impl ExistenceCheck for StoreClient {
    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        StoreClient::exists(self, key)
    }
}
