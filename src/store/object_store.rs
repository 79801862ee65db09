//! Remote object store contract and backends
//!
//! Only list, exists, get, put and delete are used. Object names are
//! `{prefix}/{key}` inside one bucket.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode, Url};

use super::sigv4::{self, Credentials};
use super::transport;
use crate::cancel::{self, CancelFlag, PartialFile};
use crate::error::TransportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub name: String,
    pub size: u64,
}

pub trait ObjectStore: Send + Sync {
    /// Every object whose name starts with `prefix`
    fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, TransportError>;

    fn exists(&self, name: &str) -> Result<bool, TransportError>;

    fn get(&self, name: &str, dest: &mut dyn Write, cancel: &CancelFlag)
        -> Result<u64, TransportError>;

    fn put(&self, name: &str, source: &Path, cancel: &CancelFlag) -> Result<u64, TransportError>;

    /// Deleting a missing object is not an error
    fn delete(&self, name: &str) -> Result<(), TransportError>;
}

/// Directory-backed store, for tests and offline runs
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name.trim_start_matches('/'))
    }
}

impl ObjectStore for LocalObjectStore {
    fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, TransportError> {
        let mut objects = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            for entry in entries {
                let entry = entry?;
                let file_type = entry.file_type()?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                // In-flight uploads are not visible
                if name.rsplit('/').next().is_some_and(|n| n.starts_with('.')) {
                    continue;
                }
                if name.starts_with(prefix) {
                    objects.push(ObjectInfo {
                        name,
                        size: entry.metadata()?.len(),
                    });
                }
            }
        }
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    fn exists(&self, name: &str) -> Result<bool, TransportError> {
        Ok(self.path(name).is_file())
    }

    fn get(
        &self,
        name: &str,
        dest: &mut dyn Write,
        cancel: &CancelFlag,
    ) -> Result<u64, TransportError> {
        let mut file = match File::open(self.path(name)) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TransportError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        cancel::copy(&mut file, dest, cancel)
    }

    fn put(&self, name: &str, source: &Path, cancel: &CancelFlag) -> Result<u64, TransportError> {
        let mut input = File::open(source)?;
        let mut partial = PartialFile::create(self.path(name))?;
        let copied = cancel::copy(&mut input, &mut partial, cancel)?;
        partial.commit()?;
        Ok(copied)
    }

    fn delete(&self, name: &str) -> Result<(), TransportError> {
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// S3-compatible REST store
pub struct HttpObjectStore {
    endpoint: String,
    bucket: String,
    bearer_token: Option<String>,
    credentials: Option<Credentials>,
    client: Client,
}

impl HttpObjectStore {
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>) -> Result<Self, TransportError> {
        let client = transport::http_client(transport::CONNECT_TIMEOUT, transport::IO_TIMEOUT)?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            bearer_token: None,
            credentials: None,
            client,
        })
    }

    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|t| !t.is_empty());
        self
    }

    /// Sign requests with AWS Signature Version 4
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, TransportError> {
        let raw = format!("{}/{}", self.endpoint, path.trim_start_matches('/'));
        let parsed = if query.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, query)
        };
        parsed.map_err(|e| TransportError::InvalidUri {
            uri: raw.clone(),
            reason: e.to_string(),
        })
    }

    fn object_url(&self, name: &str) -> Result<Url, TransportError> {
        self.url(&format!("{}/{}", self.bucket, name.trim_start_matches('/')), &[])
    }

    /// Request with whichever authorization is configured
    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, TransportError> {
        if let Some(credentials) = &self.credentials {
            let signature = sigv4::sign(method.as_str(), &url, credentials, chrono::Utc::now())?;
            return Ok(self
                .client
                .request(method, url)
                .header("x-amz-date", signature.amz_date)
                .header("x-amz-content-sha256", signature.content_sha256)
                .header("authorization", signature.authorization));
        }
        let request = self.client.request(method, url);
        Ok(match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    fn send(
        &self,
        request: RequestBuilder,
        name: &str,
    ) -> Result<Response, TransportError> {
        let response = request
            .send()
            .map_err(|e| TransportError::Http(e.to_string()))?;
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(TransportError::NotFound(name.to_string())),
            status => Err(TransportError::Http(format!("{} returned {}", name, status))),
        }
    }
}

impl ObjectStore for HttpObjectStore {
    fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, TransportError> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut query = vec![("list-type", "2"), ("prefix", prefix)];
            if let Some(token) = &continuation {
                query.push(("continuation-token", token.as_str()));
            }
            let url = self.url(&self.bucket, &query)?;
            let body = self
                .send(self.request(Method::GET, url)?, prefix)?
                .text()
                .map_err(|e| TransportError::Http(e.to_string()))?;

            let page = parse_list_page(&body);
            objects.extend(page.objects);
            match page.next {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }
        Ok(objects)
    }

    fn exists(&self, name: &str) -> Result<bool, TransportError> {
        match self.send(self.request(Method::HEAD, self.object_url(name)?)?, name) {
            Ok(_) => Ok(true),
            Err(TransportError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn get(
        &self,
        name: &str,
        dest: &mut dyn Write,
        cancel: &CancelFlag,
    ) -> Result<u64, TransportError> {
        let mut response = self.send(self.request(Method::GET, self.object_url(name)?)?, name)?;
        cancel::copy(&mut response, dest, cancel)
    }

    fn put(&self, name: &str, source: &Path, cancel: &CancelFlag) -> Result<u64, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let file = File::open(source)?;
        let size = file.metadata()?.len();
        let request = self
            .request(Method::PUT, self.object_url(name)?)?
            .body(Body::sized(file, size));
        self.send(request, name)?;
        Ok(size)
    }

    fn delete(&self, name: &str) -> Result<(), TransportError> {
        match self.send(self.request(Method::DELETE, self.object_url(name)?)?, name) {
            Ok(_) | Err(TransportError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

struct ListPage {
    objects: Vec<ObjectInfo>,
    next: Option<String>,
}

/// Extract objects and the continuation token from a ListObjectsV2 response
fn parse_list_page(body: &str) -> ListPage {
    let objects = elements(body, "Contents")
        .into_iter()
        .filter_map(|contents| {
            let name = elements(contents, "Key").into_iter().next()?;
            let size = elements(contents, "Size")
                .into_iter()
                .next()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(0);
            Some(ObjectInfo {
                name: unescape(name),
                size,
            })
        })
        .collect();

    let truncated = elements(body, "IsTruncated")
        .into_iter()
        .next()
        .is_some_and(|v| v.trim() == "true");
    let next = if truncated {
        elements(body, "NextContinuationToken")
            .into_iter()
            .next()
            .map(unescape)
    } else {
        None
    };

    ListPage { objects, next }
}

/// Inner text of every `<tag>...</tag>` element, in document order
fn elements<'a>(body: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let mut found = Vec::new();
    let mut rest = body;
    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        let Some(end) = after.find(&close) else {
            break;
        };
        found.push(&after[..end]);
        rest = &after[end + close.len()..];
    }
    found
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_store_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp.path().join("bucket"));
        let source = temp.path().join("a.tif");
        fs::write(&source, b"raster").unwrap();

        assert!(!store.exists("gddp/a.tif").unwrap());
        store.put("gddp/a.tif", &source, &CancelFlag::new()).unwrap();
        assert!(store.exists("gddp/a.tif").unwrap());

        let mut out = Vec::new();
        store.get("gddp/a.tif", &mut out, &CancelFlag::new()).unwrap();
        assert_eq!(out, b"raster");

        store.delete("gddp/a.tif").unwrap();
        store.delete("gddp/a.tif").unwrap();
        assert!(!store.exists("gddp/a.tif").unwrap());
    }

    #[test]
    fn test_local_store_list_filters_prefix() {
        let temp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp.path());
        fs::create_dir_all(temp.path().join("gddp")).unwrap();
        fs::create_dir_all(temp.path().join("other")).unwrap();
        fs::write(temp.path().join("gddp/a.tif"), b"12").unwrap();
        fs::write(temp.path().join("gddp/empty.tif"), b"").unwrap();
        fs::write(temp.path().join("other/b.tif"), b"1").unwrap();

        let listed = store.list("gddp/").unwrap();
        assert_eq!(
            listed,
            vec![
                ObjectInfo { name: "gddp/a.tif".to_string(), size: 2 },
                ObjectInfo { name: "gddp/empty.tif".to_string(), size: 0 },
            ]
        );
    }

    #[test]
    fn test_local_store_missing_object() {
        let temp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp.path());
        let mut out = Vec::new();
        assert!(matches!(
            store.get("gddp/none.tif", &mut out, &CancelFlag::new()),
            Err(TransportError::NotFound(_))
        ));
        assert!(store.list("gddp/").unwrap().is_empty());
    }

    #[test]
    fn test_cancelled_local_put_leaves_nothing() {
        let temp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp.path().join("bucket"));
        let source = temp.path().join("a.tif");
        fs::write(&source, b"raster").unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();
        assert!(store.put("gddp/a.tif", &source, &cancel).is_err());
        assert!(store.list("").unwrap().is_empty());
    }

    #[test]
    fn test_http_store_urls() {
        let store = HttpObjectStore::new("https://s3.test/", "gddp").unwrap();
        assert_eq!(
            store.object_url("/gddp/a.tif").unwrap().as_str(),
            "https://s3.test/gddp/gddp/a.tif"
        );
        let listing = store.url("gddp", &[("list-type", "2"), ("prefix", "gddp/")]).unwrap();
        assert_eq!(listing.path(), "/gddp");
        assert_eq!(listing.query(), Some("list-type=2&prefix=gddp%2F"));
    }

    #[test]
    fn test_parse_list_page() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult>
  <Name>gddp</Name>
  <IsTruncated>true</IsTruncated>
  <Contents><Key>gddp/a.tif</Key><Size>10</Size></Contents>
  <Contents><Key>gddp/b&amp;c.tif</Key><Size>0</Size></Contents>
  <NextContinuationToken>abc==</NextContinuationToken>
</ListBucketResult>"#;
        let page = parse_list_page(body);
        assert_eq!(page.objects.len(), 2);
        assert_eq!(page.objects[1].name, "gddp/b&c.tif");
        assert_eq!(page.objects[1].size, 0);
        assert_eq!(page.next.as_deref(), Some("abc=="));

        let last = parse_list_page("<IsTruncated>false</IsTruncated>");
        assert!(last.objects.is_empty());
        assert!(last.next.is_none());
    }
}
