use std::pin::Pin;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, TryStreamExt, stream};

use crate::{ActionDescriptor, ObjectExtra, StorageError};

/// MIME type reported for objects whose type is unknown.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A stream of object content.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Wrap an in-memory buffer as a [`ByteStream`].
pub fn byte_stream(content: impl Into<Bytes>) -> ByteStream {
    let content = content.into();
    Box::pin(stream::once(async move { Ok(content) }))
}

/// Drain a [`ByteStream`] into a single buffer.
pub async fn collect(stream: ByteStream) -> Result<Bytes, StorageError> {
    let buffer = stream
        .try_fold(BytesMut::new(), |mut buffer, chunk| async move {
            buffer.extend_from_slice(&chunk);
            Ok(buffer)
        })
        .await?;
    Ok(buffer.freeze())
}

/// Count the bytes of a [`ByteStream`] as they pass through it.
#[cfg(feature = "s3")]
pub(crate) fn counted(
    stream: ByteStream,
    counter: std::sync::Arc<std::sync::atomic::AtomicU64>,
) -> ByteStream {
    use futures_util::StreamExt;

    Box::pin(stream.inspect(move |chunk| {
        if let Ok(chunk) = chunk {
            counter.fetch_add(chunk.len() as u64, std::sync::atomic::Ordering::Relaxed);
        }
    }))
}

/// The storage namespace for a repository.
pub fn prefix(organization: &str, repository: &str) -> String {
    format!("{organization}/{repository}")
}

/// Everything the transfer control plane needs from an object store.
///
/// Objects are addressed by a `prefix` (see [`prefix`]) and an object id.
/// Implementations must make `put` safe under concurrent writers to the same
/// object with a well defined winner, and answer `exists` / `get_size` from a
/// consistent snapshot.
#[async_trait]
pub trait StorageCapability: Send + Sync {
    /// Whether the object exists.
    async fn exists(&self, prefix: &str, oid: &str) -> Result<bool, StorageError>;

    /// Size of the stored object in bytes. Fails with
    /// [`StorageError::ObjectNotFound`] if it does not exist.
    async fn get_size(&self, prefix: &str, oid: &str) -> Result<u64, StorageError>;

    /// Stream the object's content. Fails with
    /// [`StorageError::ObjectNotFound`] if it does not exist.
    async fn get(&self, prefix: &str, oid: &str) -> Result<ByteStream, StorageError>;

    /// Store the object's content, replacing any previous content.
    async fn put(&self, prefix: &str, oid: &str, content: ByteStream) -> Result<(), StorageError>;

    /// MIME type of the stored object.
    async fn get_mime_type(&self, _prefix: &str, _oid: &str) -> Result<String, StorageError> {
        Ok(DEFAULT_MIME_TYPE.to_string())
    }

    /// Whether the object exists and has exactly `size` bytes.
    async fn verify_object(&self, prefix: &str, oid: &str, size: u64) -> Result<bool, StorageError> {
        match self.get_size(prefix, oid).await {
            Ok(stored) => Ok(stored == size),
            Err(StorageError::ObjectNotFound) => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// A descriptor the client can use to download the object directly, or
    /// `None` if this backend cannot hand one out.
    ///
    /// `lifetime` is the requested validity of the action in seconds.
    async fn download_action(
        &self,
        prefix: &str,
        oid: &str,
        size: u64,
        lifetime: u64,
        extra: &ObjectExtra,
    ) -> Result<Option<ActionDescriptor>, StorageError>;
}
