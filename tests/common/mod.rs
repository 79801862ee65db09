// Common test utilities shared across integration tests
//
// Every test builds against its own temp directory: the remote store is a
// LocalObjectStore under `remote/`, the cache lives under `cache/`, and raw
// sources are served by an in-memory transport instead of the network.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use gddp::cancel::CancelFlag;
use gddp::error::TransportError;
use gddp::raster::{GridCodec, Profile, Raster, RasterCodec};
use gddp::store::{LocalObjectStore, ObjectInfo, ObjectStore, RetryPolicy, StoreClient, Transport, Transports};
use tempfile::TempDir;

pub const PREFIX: &str = "gddp";

/// Serves daily source files as grid-codec rasters
///
/// Projection years (2006 onwards) get `projection`, earlier years `historical`.
/// Each value becomes one band of a 1x2 grid.
pub struct FakeSource {
    pub historical: Vec<f32>,
    pub projection: Vec<f32>,
}

impl FakeSource {
    fn days_for(&self, uri: &str) -> &[f32] {
        let historical = uri.contains("_historical_") || uri.contains("historical/");
        if historical {
            &self.historical
        } else {
            &self.projection
        }
    }
}

impl Transport for FakeSource {
    fn download(&self, uri: &str, dest: &mut dyn Write, _cancel: &CancelFlag) -> Result<u64, TransportError> {
        let days = self.days_for(uri);
        let data: Vec<f32> = days.iter().flat_map(|v| [*v, *v]).collect();
        let raster = Raster::new(days.len(), 1, 2, data, Profile::default())
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let temp = TempDir::new()?;
        let path = temp.path().join("source.grid");
        GridCodec
            .write(&raster, &path)
            .map_err(|e| TransportError::Http(e.to_string()))?;
        let bytes = std::fs::read(&path)?;
        dest.write_all(&bytes)?;
        Ok(bytes.len() as u64)
    }
}

/// Remote store whose uploads always fail
pub struct RejectingUploads(pub LocalObjectStore);

impl ObjectStore for RejectingUploads {
    fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, TransportError> {
        self.0.list(prefix)
    }
    fn exists(&self, name: &str) -> Result<bool, TransportError> {
        self.0.exists(name)
    }
    fn get(&self, name: &str, dest: &mut dyn Write, cancel: &CancelFlag) -> Result<u64, TransportError> {
        self.0.get(name, dest, cancel)
    }
    fn put(&self, _name: &str, _source: &Path, _cancel: &CancelFlag) -> Result<u64, TransportError> {
        Err(TransportError::Http("403 Forbidden".to_string()))
    }
    fn delete(&self, name: &str) -> Result<(), TransportError> {
        self.0.delete(name)
    }
}

pub struct Workspace {
    pub temp: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn remote_root(&self) -> PathBuf {
        self.path().join("remote")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.path().join("cache")
    }

    /// Published object path for a key
    pub fn published(&self, key: &str) -> PathBuf {
        self.remote_root().join(PREFIX).join(key)
    }

    /// Store client wired to the fake source
    pub fn store(&self, source: Option<FakeSource>) -> StoreClient {
        let remote = Arc::new(LocalObjectStore::new(self.remote_root()));
        let mut transports = Transports::new();
        if let Some(source) = source {
            transports.register("http", Arc::new(source));
        }
        StoreClient::new(self.cache_dir(), PREFIX, remote, transports)
    }

    /// Store client whose publishes are refused by the remote
    pub fn rejecting_store(&self, source: FakeSource) -> StoreClient {
        let remote = Arc::new(RejectingUploads(LocalObjectStore::new(self.remote_root())));
        let mut transports = Transports::new();
        transports.register("http", Arc::new(source));
        StoreClient::new(self.cache_dir(), PREFIX, remote, transports)
            .with_retry(RetryPolicy::new(1, Duration::from_millis(1)))
    }

    /// Regular files left in the cache directory
    pub fn cached_files(&self) -> Vec<String> {
        match std::fs::read_dir(self.cache_dir()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}
