//! Source transports, chosen by URI scheme
//!
//! NEX-GDDP sources are served over HTTP, LOCA sources over anonymous FTP.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use suppaftp::types::FileType;
use suppaftp::FtpStream;
use tracing::debug;

use crate::cancel::{self, CancelFlag};
use crate::error::TransportError;

/// Downloads one source URI into a writer
pub trait Transport: Send + Sync {
    fn download(
        &self,
        uri: &str,
        dest: &mut dyn Write,
        cancel: &CancelFlag,
    ) -> Result<u64, TransportError>;
}

/// Scheme of a URI (`http`, `ftp`, ...)
pub fn scheme(uri: &str) -> Option<&str> {
    uri.split_once("://").map(|(scheme, _)| scheme)
}

/// Last path segment of a URI, used as its cache file name
pub fn basename(uri: &str) -> &str {
    let path = uri.split_once("://").map(|(_, rest)| rest).unwrap_or(uri);
    path.rsplit('/').next().unwrap_or(path)
}

fn parse(uri: &str) -> Result<Url, TransportError> {
    Url::parse(uri).map_err(|e| TransportError::InvalidUri {
        uri: uri.to_string(),
        reason: e.to_string(),
    })
}

/// Time allowed to establish a connection
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Time allowed for any single read or write on an open connection
pub const IO_TIMEOUT: Duration = Duration::from_secs(120);

/// Blocking HTTP client with both timeouts applied
pub(crate) fn http_client(connect: Duration, io: Duration) -> Result<Client, TransportError> {
    Client::builder()
        .connect_timeout(connect)
        .timeout(io)
        .build()
        .map_err(|e| TransportError::Http(e.to_string()))
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeouts(CONNECT_TIMEOUT, IO_TIMEOUT)
    }

    /// A source that stalls longer than `io` fails the download instead of
    /// hanging the worker
    pub fn with_timeouts(connect: Duration, io: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            client: http_client(connect, io)?,
        })
    }
}

impl Transport for HttpTransport {
    fn download(
        &self,
        uri: &str,
        dest: &mut dyn Write,
        cancel: &CancelFlag,
    ) -> Result<u64, TransportError> {
        let url = parse(uri)?;
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(TransportError::NotFound(uri.to_string())),
            status => return Err(TransportError::Http(format!("{} returned {}", uri, status))),
        }

        cancel::copy(&mut response, dest, cancel)
    }
}

/// Anonymous FTP
#[derive(Debug, Default)]
pub struct FtpTransport;

impl Transport for FtpTransport {
    fn download(
        &self,
        uri: &str,
        dest: &mut dyn Write,
        cancel: &CancelFlag,
    ) -> Result<u64, TransportError> {
        let url = parse(uri)?;
        let host = url.host_str().ok_or_else(|| TransportError::InvalidUri {
            uri: uri.to_string(),
            reason: "missing host".to_string(),
        })?;
        let port = url.port_or_known_default().unwrap_or(21);
        let user = match url.username() {
            "" => "anonymous",
            user => user,
        };
        let password = url.password().unwrap_or("anonymous");
        let ftp_err = |e: suppaftp::FtpError| TransportError::Ftp(e.to_string());

        debug!(host, port, path = url.path(), "opening FTP connection");
        let mut ftp = FtpStream::connect((host, port)).map_err(ftp_err)?;
        ftp.login(user, password).map_err(ftp_err)?;
        ftp.transfer_type(FileType::Binary).map_err(ftp_err)?;

        let mut stream = ftp.retr_as_stream(url.path()).map_err(ftp_err)?;
        let copied = cancel::copy(&mut stream, dest, cancel);
        let finalized = ftp.finalize_retr_stream(stream).map_err(ftp_err);
        let _ = ftp.quit();

        let copied = copied?;
        finalized?;
        Ok(copied)
    }
}

/// Transports keyed by URI scheme
#[derive(Clone, Default)]
pub struct Transports {
    by_scheme: HashMap<String, Arc<dyn Transport>>,
}

impl Transports {
    pub fn new() -> Self {
        Self::default()
    }

    /// HTTP(S) and FTP
    pub fn standard() -> Result<Self, TransportError> {
        let http: Arc<dyn Transport> = Arc::new(HttpTransport::new()?);
        let mut transports = Self::new();
        transports.register("http", http.clone());
        transports.register("https", http);
        transports.register("ftp", Arc::new(FtpTransport));
        Ok(transports)
    }

    pub fn register(&mut self, scheme: &str, transport: Arc<dyn Transport>) {
        self.by_scheme.insert(scheme.to_string(), transport);
    }

    pub fn for_uri(&self, uri: &str) -> Result<&dyn Transport, TransportError> {
        let scheme = scheme(uri).ok_or_else(|| TransportError::InvalidUri {
            uri: uri.to_string(),
            reason: "missing scheme".to_string(),
        })?;
        self.by_scheme
            .get(scheme)
            .map(|t| t.as_ref())
            .ok_or_else(|| TransportError::UnsupportedScheme(scheme.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static [u8]);

    impl Transport for Fixed {
        fn download(
            &self,
            _uri: &str,
            dest: &mut dyn Write,
            cancel: &CancelFlag,
        ) -> Result<u64, TransportError> {
            let mut reader = self.0;
            cancel::copy(&mut reader, dest, cancel)
        }
    }

    #[test]
    fn test_scheme_and_basename() {
        let uri = "ftp://gdo-dcp.ucllnl.org/pub/dcp/a/pr_day_CCSM4.nc";
        assert_eq!(scheme(uri), Some("ftp"));
        assert_eq!(basename(uri), "pr_day_CCSM4.nc");
        assert_eq!(scheme("annual_pr.tif"), None);
    }

    #[test]
    fn test_transport_selected_by_scheme() {
        let mut transports = Transports::new();
        transports.register("http", Arc::new(Fixed(b"http")));
        transports.register("ftp", Arc::new(Fixed(b"ftp")));

        let mut out = Vec::new();
        transports
            .for_uri("ftp://host/a.nc")
            .unwrap()
            .download("ftp://host/a.nc", &mut out, &CancelFlag::new())
            .unwrap();
        assert_eq!(out, b"ftp");

        assert!(matches!(
            transports.for_uri("s3://bucket/a.nc"),
            Err(TransportError::UnsupportedScheme(s)) if s == "s3"
        ));
        assert!(matches!(
            transports.for_uri("no-scheme"),
            Err(TransportError::InvalidUri { .. })
        ));
    }

    #[test]
    fn test_stalled_download_times_out() {
        use std::io::Read;
        use std::net::TcpListener;
        use std::time::Instant;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request);
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\npartial")
                .unwrap();
            stream.flush().unwrap();
            std::thread::sleep(Duration::from_secs(3));
        });

        let transport = HttpTransport::with_timeouts(Duration::from_secs(1), Duration::from_millis(300)).unwrap();
        let uri = format!("http://{}/pr_day.nc", addr);
        let started = Instant::now();
        let mut out = Vec::new();
        let result = transport.download(&uri, &mut out, &CancelFlag::new());

        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(2));
        server.join().unwrap();
    }

    #[test]
    fn test_standard_registers_source_schemes() {
        let transports = Transports::standard().unwrap();
        for uri in ["http://a/b.nc", "https://a/b.nc", "ftp://a/b.nc"] {
            assert!(transports.for_uri(uri).is_ok(), "{}", uri);
        }
    }
}
