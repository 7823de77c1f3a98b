use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use ferry_permission::{DefaultIdentity, Permission};
use ferry_preauth::{PreAuthorizer, SignedTokenAuthorizer};
use ferry_storage::{Endpoints, MemoryStorage, StorageCapability, byte_stream, collect};
use ferry_transfer::{
    BasicStreamingAdapter, BatchProcessor, BatchRequest, TransferError, TransferSettings,
    VerifyPayload,
};
use serde_json::json;
use url::Url;

const CONTENT: &[u8] = b"large file content";
const OID: &str = "4d7a214614ab2935c943f9e0ff69d22eadbb8f32b1258daaa5e2ca24d17e2393";

struct Server {
    storage: MemoryStorage,
    authorizer: Arc<SignedTokenAuthorizer>,
    adapter: BasicStreamingAdapter,
    batch: BatchProcessor,
}

impl Server {
    fn new() -> Result<Self> {
        let settings = TransferSettings::new(Url::parse("https://lfs.example.com/")?);
        let endpoints = Endpoints::new(settings.base_url.clone())?;
        let storage = MemoryStorage::new().with_endpoints(endpoints);
        let authorizer = Arc::new(SignedTokenAuthorizer::new("integration secret"));
        let adapter = BasicStreamingAdapter::new(
            Arc::new(storage.clone()),
            authorizer.clone(),
            &settings,
        )?;
        let batch = BatchProcessor::new(Arc::new(adapter.clone()));

        Ok(Self {
            storage,
            authorizer,
            adapter,
            batch,
        })
    }
}

fn developer() -> DefaultIdentity {
    let mut identity = DefaultIdentity::new()
        .with_id("dev-1")
        .with_name("Developer")
        .with_email("dev@example.com");
    identity.allow(
        Some("acme"),
        Some("widgets"),
        Some([Permission::Read, Permission::ReadMeta, Permission::Write].into()),
        None,
    );
    identity
}

fn batch(operation: &str, size: usize) -> Result<BatchRequest> {
    Ok(serde_json::from_value(json!({
        "operation": operation,
        "transfers": ["basic"],
        "ref": { "name": "refs/heads/main" },
        "objects": [{
            "oid": OID,
            "size": size,
            "extra": { "filename": "model.bin", "disposition": "attachment" }
        }]
    }))?)
}

#[test_log::test(tokio::test)]
async fn it_uploads_verifies_and_downloads_an_object() -> Result<()> {
    let server = Server::new()?;
    let developer = developer();

    // Nothing stored yet: the client is told to upload and then verify.
    let response = server
        .batch
        .process(&developer, "acme", "widgets", &batch("upload", CONTENT.len())?)
        .await?;
    assert_eq!(response.status(), 200);
    let actions = response.objects[0]
        .actions
        .clone()
        .context("upload actions")?;
    let upload = actions.upload.context("upload action")?;
    let verify = actions.verify.context("verify action")?;
    assert_eq!(
        upload.href,
        format!("https://lfs.example.com/acme/widgets/objects/storage/{OID}")
    );

    // The upload is authorized by the action's headers alone.
    let uploader = server
        .authorizer
        .authenticate(&upload.header)?
        .context("upload headers authenticate")?;
    server
        .adapter
        .objects()
        .put(&uploader, "acme", "widgets", OID, byte_stream(CONTENT))
        .await?;

    // Upload headers do not double as verify headers.
    let payload = VerifyPayload {
        oid: OID.into(),
        size: CONTENT.len() as u64,
    };
    let verifier = server.adapter.verifier();
    assert!(matches!(
        verifier.verify(&uploader, "acme", "widgets", &payload).await,
        Err(TransferError::Forbidden(_))
    ));

    let checker = server
        .authorizer
        .authenticate(&verify.header)?
        .context("verify headers authenticate")?;
    verifier.verify(&checker, "acme", "widgets", &payload).await?;

    let wrong_size = VerifyPayload {
        size: payload.size + 1,
        ..payload.clone()
    };
    let rejected = verifier
        .verify(&checker, "acme", "widgets", &wrong_size)
        .await
        .err()
        .ok_or_else(|| anyhow!("verification of a wrong size succeeded"))?;
    assert_eq!(rejected.status(), 422);

    // A second upload batch finds nothing left to do.
    let response = server
        .batch
        .process(&developer, "acme", "widgets", &batch("upload", CONTENT.len())?)
        .await?;
    assert_eq!(response.objects[0].actions, None);
    assert_eq!(response.objects[0].authenticated, None);

    // Downloads point at the object endpoint with the requested disposition.
    let response = server
        .batch
        .process(&developer, "acme", "widgets", &batch("download", CONTENT.len())?)
        .await?;
    let download = response.objects[0]
        .actions
        .clone()
        .and_then(|actions| actions.download)
        .context("download action")?;
    assert_eq!(response.objects[0].authenticated, Some(true));
    let href = Url::parse(&download.href)?;
    assert_eq!(
        href.path(),
        format!("/acme/widgets/objects/storage/{OID}")
    );

    let query: Vec<(String, String)> = href.query_pairs().into_owned().collect();
    let param = |name: &str| {
        query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    };
    let fetched = server
        .adapter
        .objects()
        .fetch(
            &developer,
            "acme",
            "widgets",
            OID,
            param("filename").as_deref(),
            param("disposition").as_deref(),
        )
        .await?;
    assert_eq!(
        fetched.headers.get("Content-Disposition").map(String::as_str),
        Some("attachment; filename=\"model.bin\"")
    );
    assert_eq!(collect(fetched.stream).await?, Bytes::from_static(CONTENT));

    // A download batch with the wrong size reports the mismatch in band.
    let response = server
        .batch
        .process(&developer, "acme", "widgets", &batch("download", CONTENT.len() + 1)?)
        .await?;
    assert_eq!(response.status(), 422);
    assert!(server.storage.exists("acme/widgets", OID).await?);

    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_keeps_pre_authorization_to_its_repository() -> Result<()> {
    let server = Server::new()?;
    let response = server
        .batch
        .process(&developer(), "acme", "widgets", &batch("upload", CONTENT.len())?)
        .await?;
    let upload = response.objects[0]
        .actions
        .clone()
        .and_then(|actions| actions.upload)
        .context("upload action")?;
    let uploader = server
        .authorizer
        .authenticate(&upload.header)?
        .context("upload headers authenticate")?;

    let result = server
        .adapter
        .objects()
        .put(&uploader, "acme", "gadgets", OID, byte_stream(CONTENT))
        .await;
    assert!(matches!(result, Err(TransferError::Forbidden(_))));

    let result = server
        .adapter
        .objects()
        .put(&uploader, "acme", "widgets", "another-oid", byte_stream(CONTENT))
        .await;
    assert!(matches!(result, Err(TransferError::Forbidden(_))));
    Ok(())
}
