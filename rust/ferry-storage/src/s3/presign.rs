//! AWS SigV4 query-string presigning.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt::Write;
use url::{Host, Url};

use crate::StorageError;

/// Location of an S3-compatible bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    endpoint: Url,
    region: String,
    bucket: String,
}

impl Address {
    /// Create an address from an endpoint URL, signing region and bucket.
    ///
    /// # Errors
    ///
    /// Fails if the endpoint is not a valid URL with a host.
    pub fn new(
        endpoint: &str,
        region: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|error| StorageError::Configuration(format!("Invalid S3 endpoint: {error}")))?;
        if endpoint.host_str().is_none() {
            return Err(StorageError::Configuration(format!(
                "S3 endpoint has no host: {endpoint}"
            )));
        }
        Ok(Self {
            endpoint,
            region: region.into(),
            bucket: bucket.into(),
        })
    }

    /// The signing region.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// The bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Whether path-style URLs are the sensible default for this endpoint.
    ///
    /// Virtual-hosted URLs need `{bucket}.{host}` to resolve, which is not the
    /// case for IP addresses and localhost.
    pub fn is_path_style_default(&self) -> bool {
        match self.endpoint.host() {
            Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => true,
            Some(Host::Domain(domain)) => domain == "localhost",
            None => false,
        }
    }
}

/// Access key pair used for signing.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessKey {
    id: String,
    secret: String,
}

impl AccessKey {
    /// Create an access key pair.
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessKey")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Produces URLs for S3 requests, presigned with SigV4 when an access key is
/// configured and left unsigned for public buckets otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presigner {
    address: Address,
    access_key: Option<AccessKey>,
    path_style: bool,
}

impl Presigner {
    /// Create a presigner; without an access key URLs are not signed.
    pub fn new(address: Address, access_key: Option<AccessKey>) -> Self {
        let path_style = address.is_path_style_default();
        Self {
            address,
            access_key,
            path_style,
        }
    }

    /// Choose between path-style and virtual-hosted URLs.
    pub fn with_path_style(mut self, path_style: bool) -> Self {
        self.path_style = path_style;
        self
    }

    /// The bucket address.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// URL of `key` within the bucket, without any query. The key is
    /// percent-encoded the way SigV4 canonicalizes paths.
    pub fn url(&self, key: &str) -> Result<Url, StorageError> {
        let mut url = self.address.endpoint.clone();
        if self.path_style {
            url.set_path(&percent_encode_path(&format!(
                "/{}/{}",
                self.address.bucket, key
            )));
        } else {
            let host = self
                .address
                .endpoint
                .host_str()
                .ok_or_else(|| StorageError::Configuration("S3 endpoint has no host".into()))?;
            url.set_host(Some(&format!("{}.{}", self.address.bucket, host)))
                .map_err(|error| StorageError::Configuration(format!("Invalid S3 host: {error}")))?;
            url.set_path(&percent_encode_path(&format!("/{key}")));
        }
        Ok(url)
    }

    /// Presign a `method` request for `key`, valid for `expires` seconds from
    /// now, carrying the extra query `params`.
    pub fn presign(
        &self,
        method: &str,
        key: &str,
        expires: u64,
        params: &[(&str, &str)],
    ) -> Result<Url, StorageError> {
        self.presign_at(method, key, expires, params, Utc::now())
    }

    pub(crate) fn presign_at(
        &self,
        method: &str,
        key: &str,
        expires: u64,
        params: &[(&str, &str)],
        time: DateTime<Utc>,
    ) -> Result<Url, StorageError> {
        let mut url = self.url(key)?;
        let mut query: Vec<(String, String)> = params
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        let Some(access_key) = &self.access_key else {
            query.sort();
            url.set_query(non_empty(canonical_query(&query)).as_deref());
            return Ok(url);
        };

        let timestamp = time.format("%Y%m%dT%H%M%SZ").to_string();
        let date = &timestamp[0..8];
        let region = self.address.region();
        let scope = format!("{date}/{region}/s3/aws4_request");

        let hostname = url
            .host_str()
            .ok_or_else(|| StorageError::Configuration("S3 URL has no host".into()))?;
        let host = match url.port() {
            Some(port) => format!("{hostname}:{port}"),
            None => hostname.to_string(),
        };

        query.extend([
            ("X-Amz-Algorithm".into(), "AWS4-HMAC-SHA256".into()),
            ("X-Amz-Credential".into(), format!("{}/{}", access_key.id, scope)),
            ("X-Amz-Date".into(), timestamp.clone()),
            ("X-Amz-Expires".into(), expires.to_string()),
            ("X-Amz-SignedHeaders".into(), "host".into()),
        ]);
        query.sort();
        let canonical_query = canonical_query(&query);

        // `url` carries the key already encoded for signing.
        let canonical_request = format!(
            "{method}\n{}\n{canonical_query}\nhost:{host}\n\nhost\nUNSIGNED-PAYLOAD",
            url.path(),
        );

        let digest = Sha256::digest(canonical_request.as_bytes());
        let payload = format!(
            "AWS4-HMAC-SHA256\n{timestamp}\n{scope}\n{}",
            hex_encode(&digest)
        );

        let signing_key = SigningKey::derive(&access_key.secret, date, region, "s3");
        let signature = hex_encode(&signing_key.sign(payload.as_bytes()));

        url.set_query(Some(&format!(
            "{canonical_query}&X-Amz-Signature={signature}"
        )));
        Ok(url)
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn canonical_query(query: &[(String, String)]) -> String {
    query
        .iter()
        .map(|(name, value)| format!("{}={}", percent_encode(name), percent_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// SigV4 signing key.
struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Derive the signing key for the given date, region and service.
    fn derive(secret: &str, date: &str, region: &str, service: &str) -> Self {
        let date_key = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes());
        let region_key = hmac_sha256(&date_key, region.as_bytes());
        let service_key = hmac_sha256(&region_key, service.as_bytes());
        Self(hmac_sha256(&service_key, b"aws4_request"))
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        hmac_sha256(&self.0, message)
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut hex, byte| {
        let _ = write!(hex, "{byte:02x}");
        hex
    })
}

/// Percent-encode everything except unreserved characters.
fn percent_encode(value: &str) -> String {
    value.bytes().fold(String::new(), |mut encoded, byte| {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => {
                let _ = write!(encoded, "%{byte:02X}");
            }
        }
        encoded
    })
}

/// Percent-encode a path, keeping its slashes.
fn percent_encode_path(path: &str) -> String {
    path.split('/')
        .map(percent_encode)
        .collect::<Vec<_>>()
        .join("/")
}
