//! AWS Signature Version 4 request signing for the S3-compatible store
//!
//! Payloads are never hashed; every request is signed with
//! `UNSIGNED-PAYLOAD`, which S3 accepts over both HTTP and HTTPS.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::error::TransportError;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

#[derive(Clone)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// Headers to attach to a signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub authorization: String,
    pub amz_date: String,
    pub content_sha256: &'static str,
}

fn hmac(key: &[u8], data: &str) -> Result<Vec<u8>, TransportError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| TransportError::Http(format!("invalid signing key: {}", e)))?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Derived key for one day, region and service
pub fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>, TransportError> {
    let key = hmac(format!("AWS4{}", secret).as_bytes(), date)?;
    let key = hmac(&key, region)?;
    let key = hmac(&key, service)?;
    hmac(&key, "aws4_request")
}

/// Percent-encode everything but unreserved characters (and `/` in paths)
fn uri_encode(value: &str, keep_slash: bool) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            b'/' if keep_slash => encoded.push('/'),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k, false), uri_encode(&v, false)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn host(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}

/// Sign `method url` as of `now`
pub fn sign(method: &str, url: &Url, credentials: &Credentials, now: DateTime<Utc>) -> Result<Signature, TransportError> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    // Url keeps the path percent-encoded; decode before canonical encoding
    let path = percent_decode(url.path());
    let canonical_request = format!(
        "{}\n{}\n{}\nhost:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n\n{}\n{}",
        method,
        uri_encode(&path, true),
        canonical_query(url),
        host(url),
        UNSIGNED_PAYLOAD,
        amz_date,
        SIGNED_HEADERS,
        UNSIGNED_PAYLOAD
    );

    let scope = format!("{}/{}/{}/aws4_request", date, credentials.region, SERVICE);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let key = signing_key(&credentials.secret_key, &date, &credentials.region, SERVICE)?;
    let signature = hex::encode(hmac(&key, &string_to_sign)?);

    Ok(Signature {
        authorization: format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, credentials.access_key, scope, SIGNED_HEADERS, signature
        ),
        amz_date,
        content_sha256: UNSIGNED_PAYLOAD,
    })
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&String::from_utf8_lossy(&bytes[i + 1..i + 3]), 16) {
                decoded.push(byte);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn credentials() -> Credentials {
        Credentials {
            access_key: "AKIDEXAMPLE".to_string(),
            secret_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            region: "us-east-1".to_string(),
        }
    }

    #[test]
    fn test_signing_key_derivation() {
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20150830",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            hex::encode(key),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );
    }

    #[test]
    fn test_uri_encode() {
        assert_eq!(uri_encode("gddp/a b+c.tif", true), "gddp/a%20b%2Bc.tif");
        assert_eq!(uri_encode("gddp/", false), "gddp%2F");
    }

    #[test]
    fn test_canonical_query_is_sorted() {
        let url = Url::parse("https://s3.test/bucket?prefix=gddp/&list-type=2").unwrap();
        assert_eq!(canonical_query(&url), "list-type=2&prefix=gddp%2F");
    }

    #[test]
    fn test_sign_is_deterministic() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let url = Url::parse("https://s3.test:9000/gddp/gddp/annual_pr_rcp85_CCSM4_2050_nexgddp.tif").unwrap();

        let a = sign("GET", &url, &credentials(), now).unwrap();
        let b = sign("GET", &url, &credentials(), now).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.amz_date, "20240501T120000Z");
        assert!(a
            .authorization
            .starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240501/us-east-1/s3/aws4_request, "));
        assert_ne!(a, sign("PUT", &url, &credentials(), now).unwrap());
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("/gddp/a%20b.tif"), "/gddp/a b.tif");
        assert_eq!(percent_decode("/100%"), "/100%");
    }
}
