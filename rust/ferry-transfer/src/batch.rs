use std::sync::Arc;

use ferry_permission::{Identity, Permission};
use ferry_storage::{ErrorObject, ObjectExtra};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{BASIC_TRANSFER, TransferAdapter, TransferError, TransferResponse};

/// Direction of a batch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// The client wants to send objects.
    Upload,
    /// The client wants to receive objects.
    Download,
}

impl Operation {
    /// Permission required on each object of the batch.
    pub fn permission(&self) -> Permission {
        match self {
            Operation::Upload => Permission::Write,
            Operation::Download => Permission::Read,
        }
    }
}

/// The Git ref a batch request is made for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefSpec {
    /// Fully qualified ref name, e.g. `refs/heads/main`.
    pub name: String,
}

/// An object named in a batch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchObject {
    /// Object id.
    pub oid: String,
    /// Object size in bytes.
    pub size: u64,
    /// Optional download hints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<ObjectExtra>,
}

/// A batch request as posted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Whether objects are uploaded or downloaded.
    pub operation: Operation,
    /// Transfers the client supports, in order of preference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfers: Option<Vec<String>>,
    /// Ref the objects belong to.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<RefSpec>,
    /// Objects to transfer.
    pub objects: Vec<BatchObject>,
}

/// The answer to a [`BatchRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    /// The transfer the server picked.
    pub transfer: String,
    /// One entry per requested object, in request order.
    pub objects: Vec<TransferResponse>,
}

impl BatchResponse {
    /// HTTP status for this response.
    ///
    /// `200` while at least one object succeeded. When every object failed,
    /// their common error code, or `422` if the codes differ.
    pub fn status(&self) -> u16 {
        let mut codes = self
            .objects
            .iter()
            .map(|object| object.error.as_ref().map(|error| error.code));

        let Some(Some(first)) = codes.next() else {
            return 200;
        };
        let mut common = Some(first);
        for code in codes {
            match code {
                None => return 200,
                Some(code) if Some(code) != common => common = None,
                Some(_) => {}
            }
        }
        common.unwrap_or(422)
    }
}

/// Answers batch requests by checking permissions and delegating each object
/// to a [`TransferAdapter`].
#[derive(Clone)]
pub struct BatchProcessor {
    adapter: Arc<dyn TransferAdapter>,
}

impl BatchProcessor {
    /// Create a processor delegating to `adapter`.
    pub fn new(adapter: Arc<dyn TransferAdapter>) -> Self {
        Self { adapter }
    }

    /// Process `request` on behalf of `identity`.
    ///
    /// Per-object failures are reported in the response; only an unsupported
    /// transfer list or a failure to issue actions fails the whole batch.
    #[instrument(
        skip(self, identity, request),
        fields(operation = ?request.operation, objects = request.objects.len())
    )]
    pub async fn process(
        &self,
        identity: &dyn Identity,
        organization: &str,
        repository: &str,
        request: &BatchRequest,
    ) -> Result<BatchResponse, TransferError> {
        let transfer = self.adapter.name();
        let offered = request.transfers.as_deref().unwrap_or_default();
        if !offered.is_empty() && !offered.iter().any(|name| name == transfer) {
            return Err(TransferError::InvalidPayload(format!(
                "Unable to offer any of the requested transfers: only {BASIC_TRANSFER} is supported"
            )));
        }

        let permission = request.operation.permission();
        let default_extra = ObjectExtra::default();
        let mut objects = Vec::with_capacity(request.objects.len());

        for object in &request.objects {
            let extra = object.extra.as_ref().unwrap_or(&default_extra);

            if !identity.is_authorized(organization, repository, permission, Some(&object.oid)) {
                tracing::debug!(oid = %object.oid, "Object forbidden");
                objects.push(TransferResponse::new(&object.oid, object.size).with_error(
                    ErrorObject {
                        code: 403,
                        message: "Forbidden".into(),
                    },
                ));
                continue;
            }

            let response = match request.operation {
                Operation::Upload => {
                    match self
                        .adapter
                        .upload(organization, repository, &object.oid, object.size, extra)
                        .await
                    {
                        Err(TransferError::Storage(error)) => {
                            tracing::warn!(oid = %object.oid, %error, "Upload check failed");
                            TransferResponse::new(&object.oid, object.size)
                                .with_error(error.as_error_object())
                        }
                        response => response?,
                    }
                }
                Operation::Download => {
                    self.adapter
                        .download(organization, repository, &object.oid, object.size, extra)
                        .await?
                }
            };
            objects.push(response);
        }

        Ok(BatchResponse {
            transfer: transfer.to_string(),
            objects,
        })
    }
}
