use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::RwLock;
use url::Url;

use crate::{
    ActionDescriptor, ByteStream, Endpoints, ObjectExtra, StorageCapability, StorageError,
    byte_stream, collect,
};

/// Options accepted by [`MemoryStorage`] when built through the
/// [`StorageRegistry`](crate::StorageRegistry).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryOptions {
    /// Base URL of the server that streams objects out of this storage.
    /// Without it, no download actions are handed out.
    #[serde(default)]
    pub download_base: Option<Url>,
}

/// A trivial [`StorageCapability`] where all objects are kept in memory and
/// never persisted. Clones share the same objects.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<RwLock<HashMap<(String, String), Bytes>>>,
    endpoints: Option<Endpoints>,
}

impl MemoryStorage {
    /// Create an empty storage that hands out no download actions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out download actions pointing at the object endpoints served
    /// under `endpoints`.
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Build from registry options.
    pub fn from_options(options: MemoryOptions) -> Result<Self, StorageError> {
        let storage = Self::new();
        Ok(match options.download_base {
            Some(base) => storage.with_endpoints(Endpoints::new(base)?),
            None => storage,
        })
    }

    /// Store `content` directly, bypassing the streaming interface.
    pub async fn insert(&self, prefix: &str, oid: &str, content: impl Into<Bytes>) {
        let mut objects = self.objects.write().await;
        objects.insert((prefix.to_string(), oid.to_string()), content.into());
    }

    async fn lookup(&self, prefix: &str, oid: &str) -> Option<Bytes> {
        let objects = self.objects.read().await;
        objects
            .get(&(prefix.to_string(), oid.to_string()))
            .cloned()
    }
}

#[async_trait]
impl StorageCapability for MemoryStorage {
    async fn exists(&self, prefix: &str, oid: &str) -> Result<bool, StorageError> {
        Ok(self.lookup(prefix, oid).await.is_some())
    }

    async fn get_size(&self, prefix: &str, oid: &str) -> Result<u64, StorageError> {
        self.lookup(prefix, oid)
            .await
            .map(|content| content.len() as u64)
            .ok_or(StorageError::ObjectNotFound)
    }

    async fn get(&self, prefix: &str, oid: &str) -> Result<ByteStream, StorageError> {
        self.lookup(prefix, oid)
            .await
            .map(byte_stream)
            .ok_or(StorageError::ObjectNotFound)
    }

    async fn put(&self, prefix: &str, oid: &str, content: ByteStream) -> Result<(), StorageError> {
        // Buffer first so a failed upload never replaces existing content.
        let content = collect(content).await?;
        self.insert(prefix, oid, content).await;
        Ok(())
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
