use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use url::Url;

use crate::{ActionDescriptor, ByteStream, Endpoints, ObjectExtra, StorageCapability, StorageError};

/// Options accepted by [`FileSystemStorage`] when built through the
/// [`StorageRegistry`](crate::StorageRegistry).
#[derive(Debug, Clone, Deserialize)]
pub struct FileSystemOptions {
    /// Directory objects are stored under.
    pub path: PathBuf,
    /// Base URL of the server that streams objects out of this storage.
    #[serde(default)]
    pub download_base: Option<Url>,
}

static UPLOADS: AtomicU64 = AtomicU64::new(0);

/// A [`StorageCapability`] keeping every object in a file named
/// `<root>/<organization>/<repository>/<oid>`.
///
/// Uploads are written to a temporary file next to their destination and
/// renamed into place, so concurrent writers never produce a torn object and
/// the last rename wins.
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    root_dir: PathBuf,
    endpoints: Option<Endpoints>,
}

impl FileSystemStorage {
    /// Store objects under `root_dir`. The directory is created on first
    /// upload.
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        Self {
            root_dir: root_dir.as_ref().to_owned(),
            endpoints: None,
        }
    }

    /// Hand out download actions pointing at the object endpoints served
    /// under `endpoints`.
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Build from registry options.
    pub fn from_options(options: FileSystemOptions) -> Result<Self, StorageError> {
        let storage = Self::new(options.path);
        Ok(match options.download_base {
            Some(base) => storage.with_endpoints(Endpoints::new(base)?),
            None => storage,
        })
    }

    fn make_path(&self, prefix: &str, oid: &str) -> Result<PathBuf, StorageError> {
        let mut path = self.root_dir.clone();
        for segment in prefix.split('/').chain(std::iter::once(oid)) {
            if segment.is_empty() || segment.starts_with('.') || segment.contains(['/', '\\', '\0']) {
                return Err(StorageError::InvalidObject(format!(
                    "Invalid object path segment: {segment:?}"
                )));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

fn not_found(error: std::io::Error) -> StorageError {
    match error.kind() {
        ErrorKind::NotFound => StorageError::ObjectNotFound,
        _ => StorageError::Io(error),
    }
}

#[async_trait]
impl StorageCapability for FileSystemStorage {
    async fn exists(&self, prefix: &str, oid: &str) -> Result<bool, StorageError> {
        let path = self.make_path(prefix, oid)?;
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn get_size(&self, prefix: &str, oid: &str) -> Result<u64, StorageError> {
        let path = self.make_path(prefix, oid)?;
        let metadata = tokio::fs::metadata(path).await.map_err(not_found)?;
        Ok(metadata.len())
    }

    async fn get(&self, prefix: &str, oid: &str) -> Result<ByteStream, StorageError> {
        let path = self.make_path(prefix, oid)?;
        let file = tokio::fs::File::open(path).await.map_err(not_found)?;
        Ok(ReaderStream::new(file).map_err(StorageError::from).boxed())
    }

    async fn put(&self, prefix: &str, oid: &str, mut content: ByteStream) -> Result<(), StorageError> {
        let path = self.make_path(prefix, oid)?;
        let directory = path
            .parent()
            .ok_or_else(|| StorageError::InvalidObject(format!("Invalid object path: {oid}")))?;
        tokio::fs::create_dir_all(directory).await?;

        let upload = UPLOADS.fetch_add(1, Ordering::Relaxed);
        let partial = directory.join(format!(".{oid}.{}.{upload}.part", std::process::id()));

        let written = async {
            let mut file = tokio::fs::File::create(&partial).await?;
            let mut written = 0u64;
            while let Some(chunk) = content.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.sync_all().await?;
            Ok::<_, StorageError>(written)
        }
        .await;

        match written {
            Ok(written) => {
                tokio::fs::rename(&partial, &path).await?;
                tracing::debug!(prefix, oid, written, "Stored object");
                Ok(())
            }
            Err(error) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(error)
            }
        }
    }

    async fn download_action(
        &self,
        prefix: &str,
        oid: &str,
        _size: u64,
        lifetime: u64,
        extra: &ObjectExtra,
    ) -> Result<Option<ActionDescriptor>, StorageError> {
        Ok(self.endpoints.as_ref().map(|endpoints| {
            ActionDescriptor::new(endpoints.download(prefix, oid, extra), lifetime)
        }))
    }
}
