use url::Url;

use crate::{ObjectExtra, StorageError};

/// URL layout of the object endpoints served alongside the batch API.
///
/// - object: `{base}/{organization}/{repository}/objects/storage/{oid}`
/// - verify: `{base}/{organization}/{repository}/objects/storage/verify`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    /// Serve endpoints under `base`.
    ///
    /// # Errors
    ///
    /// Fails if `base` cannot carry a path (e.g. `mailto:` URLs).
    pub fn new(base: Url) -> Result<Self, StorageError> {
        if base.cannot_be_a_base() {
            return Err(StorageError::Configuration(format!(
                "Endpoint base URL cannot carry a path: {base}"
            )));
        }
        Ok(Self { base })
    }

    /// The base URL.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// URL objects in `prefix` are uploaded to and downloaded from.
    pub fn object(&self, prefix: &str, oid: &str) -> Url {
        self.storage(prefix, oid)
    }

    /// URL of the object download endpoint, carrying the filename and
    /// disposition hints as query parameters.
    pub fn download(&self, prefix: &str, oid: &str, extra: &ObjectExtra) -> Url {
        let mut url = self.object(prefix, oid);
        if extra.filename.is_some() || extra.disposition.is_some() {
            let mut query = url.query_pairs_mut();
            if let Some(filename) = &extra.filename {
                query.append_pair("filename", filename);
            }
            if let Some(disposition) = &extra.disposition {
                query.append_pair("disposition", disposition);
            }
        }
        url
    }

    /// URL uploaded objects in `prefix` are verified at.
    pub fn verify(&self, prefix: &str) -> Url {
        self.storage(prefix, "verify")
    }

    fn storage(&self, prefix: &str, last: &str) -> Url {
        let mut url = self.base.clone();
        // Checked in `new`.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(prefix.split('/'))
                .extend(["objects", "storage", last]);
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    #[test]
    fn it_builds_object_and_verify_urls() -> TestResult {
        let endpoints = Endpoints::new(Url::parse("https://lfs.example.com/")?)?;

        assert_eq!(
            endpoints.object("acme/widgets", "abc123").as_str(),
            "https://lfs.example.com/acme/widgets/objects/storage/abc123"
        );
        assert_eq!(
            endpoints.verify("acme/widgets").as_str(),
            "https://lfs.example.com/acme/widgets/objects/storage/verify"
        );
        Ok(())
    }

    #[test]
    fn it_keeps_a_base_path() -> TestResult {
        let endpoints = Endpoints::new(Url::parse("https://example.com/lfs")?)?;
        assert_eq!(
            endpoints.object("acme/widgets", "abc123").as_str(),
            "https://example.com/lfs/acme/widgets/objects/storage/abc123"
        );
        Ok(())
    }

    #[test]
    fn it_adds_download_hints() -> TestResult {
        let endpoints = Endpoints::new(Url::parse("https://lfs.example.com/")?)?;
        let extra = ObjectExtra {
            filename: Some("model.bin".into()),
            disposition: Some("attachment".into()),
        };
        assert_eq!(
            endpoints.download("acme/widgets", "abc123", &extra).as_str(),
            "https://lfs.example.com/acme/widgets/objects/storage/abc123?filename=model.bin&disposition=attachment"
        );
        Ok(())
    }

    #[test]
    fn it_rejects_bases_without_paths() -> TestResult {
        assert!(Endpoints::new(Url::parse("mailto:lfs@example.com")?).is_err());
        Ok(())
    }
}
