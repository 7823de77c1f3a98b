use std::sync::Arc;

use ferry_permission::{Identity, Permission};
use ferry_storage::{StorageCapability, prefix};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::TransferError;

/// Body of a request against an issued `verify` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyPayload {
    /// Object id.
    pub oid: String,
    /// Size the client uploaded.
    pub size: u64,
}

/// Confirms that an uploaded object landed in storage intact.
#[derive(Clone)]
pub struct ObjectVerifier {
    storage: Arc<dyn StorageCapability>,
}

impl ObjectVerifier {
    /// Create a verifier over `storage`.
    pub fn new(storage: Arc<dyn StorageCapability>) -> Self {
        Self { storage }
    }

    /// Succeeds when the object exists with the claimed size.
    ///
    /// `identity` needs [`Permission::ReadMeta`] on the object; the transport
    /// answers a success with an empty `200`.
    #[instrument(skip(self, identity, payload), fields(oid = %payload.oid, size = payload.size))]
    pub async fn verify(
        &self,
        identity: &dyn Identity,
        organization: &str,
        repository: &str,
        payload: &VerifyPayload,
    ) -> Result<(), TransferError> {
        if !identity.is_authorized(
            organization,
            repository,
            Permission::ReadMeta,
            Some(&payload.oid),
        ) {
            return Err(TransferError::forbidden());
        }

        let prefix = prefix(organization, repository);
        if !self
            .storage
            .verify_object(&prefix, &payload.oid, payload.size)
            .await?
        {
            tracing::warn!("Rejected verification");
            return Err(TransferError::InvalidPayload(
                "Object does not exist or size does not match".into(),
            ));
        }

        tracing::debug!("Object verified");
        Ok(())
    }
}
