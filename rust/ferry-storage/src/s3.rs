//! S3-compatible object storage.
//!
//! Objects are stored under `{path_prefix}/{organization}/{repository}/{oid}`
//! in a single bucket. Every request, including the ones this server makes
//! itself, goes through a presigned URL so the same [`Presigner`] serves
//! both the server and the download actions handed to clients.

mod presign;
pub use presign::*;

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::{Method, StatusCode, header};
use serde::Deserialize;

use crate::capability::counted;
use crate::{
    ActionDescriptor, ByteStream, DEFAULT_MIME_TYPE, ObjectExtra, StorageCapability,
    StorageError,
};

/// Lifetime of the presigned URLs the server uses for its own requests.
const INTERNAL_REQUEST_LIFETIME: u64 = 60;

/// Options accepted by [`S3Storage`] when built through the
/// [`StorageRegistry`](crate::StorageRegistry).
#[derive(Debug, Clone, Deserialize)]
pub struct S3Options {
    /// Endpoint URL, e.g. `https://s3.us-east-1.amazonaws.com`.
    pub endpoint: String,
    /// Signing region (`auto` for R2).
    pub region: String,
    /// Bucket name.
    pub bucket: String,
    /// Access key id; the bucket is treated as public without one.
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// Secret access key.
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Key prefix all objects are stored under.
    #[serde(default)]
    pub path_prefix: Option<String>,
    /// Force path-style (`true`) or virtual-hosted (`false`) URLs.
    #[serde(default)]
    pub path_style: Option<bool>,
}

/// A [`StorageCapability`] backed by an S3-compatible bucket.
///
/// Downloads are handed to clients as presigned `GET` URLs, so object content
/// never flows through this server on the way out.
#[derive(Debug, Clone)]
pub struct S3Storage {
    presigner: Presigner,
    path_prefix: Option<String>,
    client: reqwest::Client,
}

impl S3Storage {
    /// Create a storage writing through `presigner`.
    pub fn new(presigner: Presigner) -> Self {
        Self {
            presigner,
            path_prefix: None,
            client: reqwest::Client::new(),
        }
    }

    /// Store every object under `path_prefix` within the bucket.
    pub fn with_path_prefix(mut self, path_prefix: impl Into<String>) -> Self {
        let path_prefix = path_prefix.into();
        let path_prefix = path_prefix.trim_matches('/');
        self.path_prefix = (!path_prefix.is_empty()).then(|| path_prefix.to_string());
        self
    }

    /// Build from registry options.
    pub fn from_options(options: S3Options) -> Result<Self, StorageError> {
        let address = Address::new(&options.endpoint, options.region, options.bucket)?;
        let access_key = match (options.access_key_id, options.secret_access_key) {
            (Some(id), Some(secret)) => Some(AccessKey::new(id, secret)),
            (None, None) => None,
            _ => {
                return Err(StorageError::Configuration(
                    "S3 access key id and secret must be given together".into(),
                ));
            }
        };

        let mut presigner = Presigner::new(address, access_key);
        if let Some(path_style) = options.path_style {
            presigner = presigner.with_path_style(path_style);
        }

        let storage = Self::new(presigner);
        Ok(match options.path_prefix {
            Some(path_prefix) => storage.with_path_prefix(path_prefix),
            None => storage,
        })
    }

    /// Bucket key of an object.
    pub fn key(&self, prefix: &str, oid: &str) -> String {
        match &self.path_prefix {
            Some(path_prefix) => format!("{path_prefix}/{prefix}/{oid}"),
            None => format!("{prefix}/{oid}"),
        }
    }

    async fn head(&self, prefix: &str, oid: &str) -> Result<Option<reqwest::Response>, StorageError> {
        let url = self.presigner.presign(
            "HEAD",
            &self.key(prefix, oid),
            INTERNAL_REQUEST_LIFETIME,
            &[],
        )?;
        let response = self.client.request(Method::HEAD, url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response)),
            status => Err(StorageError::Backend(format!(
                "Unexpected status {status} checking {prefix}/{oid}"
            ))),
        }
    }
}

#[async_trait]
impl StorageCapability for S3Storage {
    async fn exists(&self, prefix: &str, oid: &str) -> Result<bool, StorageError> {
        Ok(self.head(prefix, oid).await?.is_some())
    }

    async fn get_size(&self, prefix: &str, oid: &str) -> Result<u64, StorageError> {
        let response = self
            .head(prefix, oid)
            .await?
            .ok_or(StorageError::ObjectNotFound)?;
        response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|length| length.to_str().ok())
            .and_then(|length| length.parse().ok())
            .ok_or_else(|| {
                StorageError::Backend(format!("Missing content length for {prefix}/{oid}"))
            })
    }

    async fn get(&self, prefix: &str, oid: &str) -> Result<ByteStream, StorageError> {
        let url = self.presigner.presign(
            "GET",
            &self.key(prefix, oid),
            INTERNAL_REQUEST_LIFETIME,
            &[],
        )?;
        let response = self.client.get(url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::ObjectNotFound),
            status if status.is_success() => Ok(response
                .bytes_stream()
                .map_err(StorageError::from)
                .boxed()),
            status => Err(StorageError::Backend(format!(
                "Unexpected status {status} fetching {prefix}/{oid}"
            ))),
        }
    }

    async fn put(&self, prefix: &str, oid: &str, content: ByteStream) -> Result<(), StorageError> {
        let url = self.presigner.presign(
            "PUT",
            &self.key(prefix, oid),
            INTERNAL_REQUEST_LIFETIME,
            &[],
        )?;
        let written = Arc::new(AtomicU64::new(0));
        let body = reqwest::Body::wrap_stream(counted(content, written.clone()));
        let response = self
            .client
            .put(url)
            .header(header::CONTENT_TYPE, DEFAULT_MIME_TYPE)
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StorageError::Backend(format!(
                "Unexpected status {} storing {prefix}/{oid}",
                response.status()
            )));
        }
        tracing::debug!(
            prefix,
            oid,
            written = written.load(std::sync::atomic::Ordering::Relaxed),
            "Stored object"
        );
        Ok(())
    }

    async fn get_mime_type(&self, prefix: &str, oid: &str) -> Result<String, StorageError> {
        let response = self
            .head(prefix, oid)
            .await?
            .ok_or(StorageError::ObjectNotFound)?;
        Ok(response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|content_type| content_type.to_str().ok())
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string())
    }

    async fn download_action(
        &self,
        prefix: &str,
        oid: &str,
        _size: u64,
        lifetime: u64,
        extra: &ObjectExtra,
    ) -> Result<Option<ActionDescriptor>, StorageError> {
        let disposition = extra.content_disposition();
        let params: Vec<(&str, &str)> = disposition
            .as_deref()
            .map(|disposition| ("response-content-disposition", disposition))
            .into_iter()
            .collect();

        let url = self
            .presigner
            .presign("GET", &self.key(prefix, oid), lifetime, &params)?;
        Ok(Some(ActionDescriptor::new(url, lifetime)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    fn options() -> S3Options {
        S3Options {
            endpoint: "https://s3.us-east-1.amazonaws.com".into(),
            region: "us-east-1".into(),
            bucket: "lfs-bucket".into(),
            access_key_id: Some("AKIATEST".into()),
            secret_access_key: Some("secret123".into()),
            path_prefix: Some("/ferry/".into()),
            path_style: None,
        }
    }

    #[test]
    fn it_prefixes_object_keys() -> TestResult {
        let storage = S3Storage::from_options(options())?;
        assert_eq!(storage.key("acme/widgets", "abc123"), "ferry/acme/widgets/abc123");

        let storage = S3Storage::from_options(S3Options {
            path_prefix: None,
            ..options()
        })?;
        assert_eq!(storage.key("acme/widgets", "abc123"), "acme/widgets/abc123");
        Ok(())
    }

    #[test]
    fn it_requires_complete_access_keys() {
        let result = S3Storage::from_options(S3Options {
            secret_access_key: None,
            ..options()
        });
        assert!(matches!(result, Err(StorageError::Configuration(_))));
    }

    #[tokio::test]
    async fn it_hands_out_presigned_downloads() -> TestResult {
        let storage = S3Storage::from_options(options())?;
        let extra = ObjectExtra {
            filename: Some("model.bin".into()),
            disposition: Some("attachment".into()),
        };
        let action = storage
            .download_action("acme/widgets", "abc123", 5, 900, &extra)
            .await?
            .ok_or("missing download action")?;

        assert_eq!(action.expires_in, 900);
        assert!(action.header.is_empty());
        assert!(action.href.starts_with(
            "https://lfs-bucket.s3.us-east-1.amazonaws.com/ferry/acme/widgets/abc123?"
        ));
        assert!(action.href.contains("X-Amz-Expires=900"));
        assert!(action.href.contains("X-Amz-Signature="));
        assert!(action.href.contains("response-content-disposition=attachment%3B"));
        Ok(())
    }
}
