use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use ferry_permission::{Identity, Permission};
use ferry_preauth::Headers;
use ferry_storage::{ByteStream, ObjectExtra, StorageCapability, prefix};
use tracing::instrument;

use crate::TransferError;

/// Header carrying the MIME type of fetched content.
pub const CONTENT_TYPE: &str = "Content-Type";

/// Header carrying the requested disposition of fetched content.
pub const CONTENT_DISPOSITION: &str = "Content-Disposition";

/// Content of a fetched object along with the response headers to send.
pub struct ObjectDownload {
    /// Object content.
    pub stream: ByteStream,
    /// `Content-Type` and, when requested, `Content-Disposition`.
    pub headers: Headers,
}

impl Debug for ObjectDownload {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectDownload")
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Serves object content at the endpoint upload actions point at.
#[derive(Clone)]
pub struct ObjectService {
    storage: Arc<dyn StorageCapability>,
}

impl ObjectService {
    /// Create a service over `storage`.
    pub fn new(storage: Arc<dyn StorageCapability>) -> Self {
        Self { storage }
    }

    /// Store uploaded content. Requires [`Permission::Write`].
    #[instrument(skip(self, identity, content))]
    pub async fn put(
        &self,
        identity: &dyn Identity,
        organization: &str,
        repository: &str,
        oid: &str,
        content: ByteStream,
    ) -> Result<(), TransferError> {
        if !identity.is_authorized(organization, repository, Permission::Write, Some(oid)) {
            return Err(TransferError::forbidden());
        }

        self.storage
            .put(&prefix(organization, repository), oid, content)
            .await?;
        tracing::debug!("Object stored");
        Ok(())
    }

    /// Stream stored content. Requires [`Permission::Read`].
    ///
    /// `filename` and `disposition` shape the `Content-Disposition` header the
    /// same way download actions do.
    #[instrument(skip(self, identity))]
    pub async fn fetch(
        &self,
        identity: &dyn Identity,
        organization: &str,
        repository: &str,
        oid: &str,
        filename: Option<&str>,
        disposition: Option<&str>,
    ) -> Result<ObjectDownload, TransferError> {
        if !identity.is_authorized(organization, repository, Permission::Read, Some(oid)) {
            return Err(TransferError::forbidden());
        }

        let prefix = prefix(organization, repository);
        if !self.storage.exists(&prefix, oid).await? {
            return Err(TransferError::NotFound("The object was not found".into()));
        }

        let extra = ObjectExtra {
            filename: filename.map(str::to_string),
            disposition: disposition.map(str::to_string),
        };
        let mut headers = Headers::new();
        if let Some(disposition) = extra.content_disposition() {
            headers.insert(CONTENT_DISPOSITION.to_string(), disposition);
        }
        headers.insert(
            CONTENT_TYPE.to_string(),
            self.storage.get_mime_type(&prefix, oid).await?,
        );

        let stream = self.storage.get(&prefix, oid).await?;
        Ok(ObjectDownload { stream, headers })
    }
}
