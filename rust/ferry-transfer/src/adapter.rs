//! Transfer adapters turn a single object of a batch request into the
//! actions a client should perform.

use std::sync::Arc;

use async_trait::async_trait;
use ferry_preauth::{Headers, PreAuthAction, PreAuthScope, PreAuthorizer};
use ferry_storage::{
    ActionDescriptor, Endpoints, ObjectExtra, StorageCapability, StorageError, prefix,
};
use tracing::instrument;

use crate::{
    Actions, ObjectService, ObjectVerifier, TransferError, TransferResponse, TransferSettings,
};

/// Name of the transfer every client supports.
pub const BASIC_TRANSFER: &str = "basic";

/// Decides, per object, what a client has to do to upload or download it.
///
/// Adapters hold no per-object state: every call re-derives its answer from
/// the storage backend.
#[async_trait]
pub trait TransferAdapter: Send + Sync {
    /// Transfer name advertised in batch responses.
    fn name(&self) -> &str {
        BASIC_TRANSFER
    }

    /// Actions needed to upload an object of `size` bytes.
    async fn upload(
        &self,
        organization: &str,
        repository: &str,
        oid: &str,
        size: u64,
        extra: &ObjectExtra,
    ) -> Result<TransferResponse, TransferError>;

    /// Actions needed to download an object of `size` bytes.
    async fn download(
        &self,
        organization: &str,
        repository: &str,
        oid: &str,
        size: u64,
        extra: &ObjectExtra,
    ) -> Result<TransferResponse, TransferError>;
}

/// The `basic` transfer, streaming uploads through this server's object
/// endpoint and downloads through whatever the storage backend offers.
#[derive(Clone)]
pub struct BasicStreamingAdapter {
    storage: Arc<dyn StorageCapability>,
    preauth: Arc<dyn PreAuthorizer>,
    endpoints: Endpoints,
    action_lifetime: u64,
    verify_lifetime: u64,
}

impl BasicStreamingAdapter {
    /// Create an adapter serving endpoints under `settings.base_url`.
    pub fn new(
        storage: Arc<dyn StorageCapability>,
        preauth: Arc<dyn PreAuthorizer>,
        settings: &TransferSettings,
    ) -> Result<Self, TransferError> {
        Ok(Self {
            storage,
            preauth,
            endpoints: settings.endpoints()?,
            action_lifetime: settings.action_lifetime,
            verify_lifetime: settings.verify_lifetime,
        })
    }

    /// A verifier for objects uploaded through this adapter's actions.
    pub fn verifier(&self) -> ObjectVerifier {
        ObjectVerifier::new(self.storage.clone())
    }

    /// The object endpoint this adapter's upload actions point at.
    pub fn objects(&self) -> ObjectService {
        ObjectService::new(self.storage.clone())
    }

    fn preauth_headers(
        &self,
        organization: &str,
        repository: &str,
        oid: &str,
        action: PreAuthAction,
        lifetime: u64,
    ) -> Result<Headers, TransferError> {
        let scope = PreAuthScope::new(organization, repository)
            .with_oid(oid)
            .with_actions([action]);
        Ok(self.preauth.headers(&scope, lifetime)?)
    }

    /// Fails unless the object exists with exactly `size` bytes, keeping
    /// [`StorageError::ObjectNotFound`] distinct from a size mismatch.
    async fn check_object(&self, prefix: &str, oid: &str, size: u64) -> Result<(), StorageError> {
        if self.storage.get_size(prefix, oid).await? != size {
            return Err(StorageError::InvalidObject(
                "Object size does not match".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TransferAdapter for BasicStreamingAdapter {
    #[instrument(skip(self))]
    async fn upload(
        &self,
        organization: &str,
        repository: &str,
        oid: &str,
        size: u64,
        _extra: &ObjectExtra,
    ) -> Result<TransferResponse, TransferError> {
        let response = TransferResponse::new(oid, size);
        let prefix = prefix(organization, repository);

        if self.storage.exists(&prefix, oid).await?
            && self.storage.get_size(&prefix, oid).await? == size
        {
            tracing::debug!("Object already present");
            return Ok(response);
        }

        let upload_href = self.endpoints.object(&prefix, oid);
        let upload = ActionDescriptor::new(upload_href, self.action_lifetime)
            .with_header(self.preauth_headers(
                organization,
                repository,
                oid,
                PreAuthAction::Write,
                self.action_lifetime,
            )?);
        let verify = ActionDescriptor::new(self.endpoints.verify(&prefix), self.verify_lifetime)
            .with_header(self.preauth_headers(
                organization,
                repository,
                oid,
                PreAuthAction::Verify,
                self.verify_lifetime,
            )?);

        tracing::debug!("Object needs upload");
        Ok(response.with_actions(Actions {
            upload: Some(upload),
            verify: Some(verify),
            download: None,
        }))
    }

    #[instrument(skip(self, extra))]
    async fn download(
        &self,
        organization: &str,
        repository: &str,
        oid: &str,
        size: u64,
        extra: &ObjectExtra,
    ) -> Result<TransferResponse, TransferError> {
        let response = TransferResponse::new(oid, size);
        let prefix = prefix(organization, repository);

        let action = async {
            self.check_object(&prefix, oid, size).await?;
            self.storage
                .download_action(&prefix, oid, size, self.action_lifetime, extra)
                .await
        };

        match action.await {
            Ok(Some(download)) => Ok(response.with_actions(Actions {
                download: Some(download),
                ..Actions::default()
            })),
            Ok(None) => {
                tracing::debug!("Storage offers no download action");
                Ok(response)
            }
            Err(error) => {
                tracing::warn!(%error, "Object cannot be downloaded");
                Ok(response.with_error(error.as_error_object()))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ferry_preauth::{NoPreAuthorizer, SignedTokenAuthorizer};
    use ferry_permission::{Identity, Permission};
    use ferry_storage::{ErrorObject, MemoryStorage};
    use pretty_assertions::assert_eq;
    use testresult::TestResult;
    use url::Url;

    pub(crate) const SECRET: &str = "s3cr3t";

    pub(crate) fn settings() -> TestResult<TransferSettings> {
        Ok(TransferSettings::new(Url::parse("https://lfs.example.com/")?))
    }

    pub(crate) fn adapter(storage: &MemoryStorage) -> TestResult<BasicStreamingAdapter> {
        Ok(BasicStreamingAdapter::new(
            Arc::new(storage.clone()),
            Arc::new(SignedTokenAuthorizer::new(SECRET)),
            &settings()?,
        )?)
    }

    /// Storage whose every operation fails.
    pub(crate) struct BrokenStorage;

    #[async_trait]
    impl StorageCapability for BrokenStorage {
        async fn exists(&self, _prefix: &str, _oid: &str) -> Result<bool, StorageError> {
            Err(StorageError::Backend("unreachable".into()))
        }

        async fn get_size(&self, _prefix: &str, _oid: &str) -> Result<u64, StorageError> {
            Err(StorageError::Backend("unreachable".into()))
        }

        async fn get(
            &self,
            _prefix: &str,
            _oid: &str,
        ) -> Result<ferry_storage::ByteStream, StorageError> {
            Err(StorageError::Backend("unreachable".into()))
        }

        async fn put(
            &self,
            _prefix: &str,
            _oid: &str,
            _content: ferry_storage::ByteStream,
        ) -> Result<(), StorageError> {
            Err(StorageError::Backend("unreachable".into()))
        }

        async fn download_action(
            &self,
            _prefix: &str,
            _oid: &str,
            _size: u64,
            _lifetime: u64,
            _extra: &ObjectExtra,
        ) -> Result<Option<ActionDescriptor>, StorageError> {
            Err(StorageError::Backend("unreachable".into()))
        }
    }

    #[tokio::test]
    async fn it_offers_upload_and_verify_for_absent_objects() -> TestResult {
        let storage = MemoryStorage::new();
        let response = adapter(&storage)?
            .upload("acme", "widgets", "abc123", 5, &ObjectExtra::default())
            .await?;

        assert_eq!(response.authenticated, Some(true));
        assert_eq!(response.error, None);
        let actions = response.actions.ok_or("missing actions")?;
        assert_eq!(actions.download, None);

        let upload = actions.upload.ok_or("missing upload action")?;
        assert_eq!(
            upload.href,
            "https://lfs.example.com/acme/widgets/objects/storage/abc123"
        );
        assert_eq!(upload.expires_in, 900);

        let verify = actions.verify.ok_or("missing verify action")?;
        assert_eq!(
            verify.href,
            "https://lfs.example.com/acme/widgets/objects/storage/verify"
        );
        assert_eq!(verify.expires_in, 43200);
        Ok(())
    }

    #[tokio::test]
    async fn it_scopes_action_headers_to_the_object() -> TestResult {
        let storage = MemoryStorage::new();
        let response = adapter(&storage)?
            .upload("acme", "widgets", "abc123", 5, &ObjectExtra::default())
            .await?;
        let actions = response.actions.ok_or("missing actions")?;
        let authorizer = SignedTokenAuthorizer::new(SECRET);

        let upload = authorizer
            .authenticate(&actions.upload.ok_or("missing upload action")?.header)?
            .ok_or("upload action is not pre-authorized")?;
        assert!(upload.is_authorized("acme", "widgets", Permission::Write, Some("abc123")));
        assert!(!upload.is_authorized("acme", "widgets", Permission::Write, Some("def456")));
        assert!(!upload.is_authorized("acme", "widgets", Permission::ReadMeta, Some("abc123")));

        let verify = authorizer
            .authenticate(&actions.verify.ok_or("missing verify action")?.header)?
            .ok_or("verify action is not pre-authorized")?;
        assert!(verify.is_authorized("acme", "widgets", Permission::ReadMeta, Some("abc123")));
        assert!(!verify.is_authorized("acme", "widgets", Permission::Write, Some("abc123")));
        Ok(())
    }

    #[tokio::test]
    async fn it_skips_objects_already_present() -> TestResult {
        let storage = MemoryStorage::new();
        storage.insert("acme/widgets", "abc123", "hello").await;
        let adapter = adapter(&storage)?;

        let first = adapter
            .upload("acme", "widgets", "abc123", 5, &ObjectExtra::default())
            .await?;
        assert_eq!(first, TransferResponse::new("abc123", 5));

        let second = adapter
            .upload("acme", "widgets", "abc123", 5, &ObjectExtra::default())
            .await?;
        assert_eq!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn it_ignores_download_hints_on_upload() -> TestResult {
        let storage = MemoryStorage::new();
        storage.insert("acme/widgets", "abc123", "hello").await;
        let adapter = adapter(&storage)?;
        let extra = ObjectExtra {
            filename: Some("hello.txt".into()),
            disposition: Some("attachment".into()),
        };

        let hinted = adapter.upload("acme", "widgets", "abc123", 5, &extra).await?;
        let plain = adapter
            .upload("acme", "widgets", "abc123", 5, &ObjectExtra::default())
            .await?;
        assert_eq!(hinted, plain);
        Ok(())
    }

    #[tokio::test]
    async fn it_offers_upload_when_sizes_differ() -> TestResult {
        let storage = MemoryStorage::new();
        storage.insert("acme/widgets", "abc123", "hello").await;

        let response = adapter(&storage)?
            .upload("acme", "widgets", "abc123", 6, &ObjectExtra::default())
            .await?;
        assert_eq!(response.authenticated, Some(true));
        assert!(response.actions.is_some_and(|actions| actions.upload.is_some()));
        Ok(())
    }

    #[tokio::test]
    async fn it_issues_empty_headers_without_pre_authorization() -> TestResult {
        let adapter = BasicStreamingAdapter::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(NoPreAuthorizer),
            &settings()?,
        )?;
        let response = adapter
            .upload("acme", "widgets", "abc123", 5, &ObjectExtra::default())
            .await?;
        let actions = response.actions.ok_or("missing actions")?;

        assert!(actions.upload.ok_or("missing upload action")?.header.is_empty());
        assert!(actions.verify.ok_or("missing verify action")?.header.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn it_propagates_storage_failures_on_upload() -> TestResult {
        let adapter = BasicStreamingAdapter::new(
            Arc::new(BrokenStorage),
            Arc::new(NoPreAuthorizer),
            &settings()?,
        )?;
        let result = adapter
            .upload("acme", "widgets", "abc123", 5, &ObjectExtra::default())
            .await;
        assert!(matches!(
            result,
            Err(TransferError::Storage(StorageError::Backend(_)))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn it_returns_the_storage_download_action() -> TestResult {
        let endpoints = Endpoints::new(Url::parse("https://lfs.example.com/")?)?;
        let storage = MemoryStorage::new().with_endpoints(endpoints);
        storage.insert("acme/widgets", "abc123", "hello").await;
        let extra = ObjectExtra {
            filename: Some("hello.txt".into()),
            disposition: Some("attachment".into()),
        };

        let expected = storage
            .download_action("acme/widgets", "abc123", 5, 900, &extra)
            .await?
            .ok_or("memory storage offers no download action")?;
        let response = adapter(&storage)?
            .download("acme", "widgets", "abc123", 5, &extra)
            .await?;

        assert_eq!(response.authenticated, Some(true));
        assert_eq!(
            response.actions,
            Some(Actions {
                download: Some(expected),
                ..Actions::default()
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn it_reports_missing_objects_in_band() -> TestResult {
        let response = adapter(&MemoryStorage::new())?
            .download("acme", "widgets", "abc123", 5, &ObjectExtra::default())
            .await?;

        assert_eq!(
            response.error,
            Some(ErrorObject {
                code: 404,
                message: "Object was not found".into(),
            })
        );
        assert_eq!(response.actions, None);
        assert_eq!(response.authenticated, None);
        Ok(())
    }

    #[tokio::test]
    async fn it_reports_size_mismatches_in_band() -> TestResult {
        let storage = MemoryStorage::new();
        storage.insert("acme/widgets", "abc123", "hello").await;

        let response = adapter(&storage)?
            .download("acme", "widgets", "abc123", 6, &ObjectExtra::default())
            .await?;
        assert_eq!(
            response.error,
            Some(ErrorObject {
                code: 422,
                message: "Object size does not match".into(),
            })
        );
        assert_eq!(response.actions, None);
        assert_eq!(response.authenticated, None);
        Ok(())
    }

    #[tokio::test]
    async fn it_reports_backend_failures_on_download_in_band() -> TestResult {
        let adapter = BasicStreamingAdapter::new(
            Arc::new(BrokenStorage),
            Arc::new(NoPreAuthorizer),
            &settings()?,
        )?;
        let response = adapter
            .download("acme", "widgets", "abc123", 5, &ObjectExtra::default())
            .await?;
        assert_eq!(response.error.map(|error| error.code), Some(500));
        Ok(())
    }

    #[tokio::test]
    async fn it_omits_actions_when_storage_offers_no_download() -> TestResult {
        let storage = MemoryStorage::new();
        storage.insert("acme/widgets", "abc123", "hello").await;

        let response = adapter(&storage)?
            .download("acme", "widgets", "abc123", 5, &ObjectExtra::default())
            .await?;
        assert_eq!(response, TransferResponse::new("abc123", 5));
        Ok(())
    }
}
