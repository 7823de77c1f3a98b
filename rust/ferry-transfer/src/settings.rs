use ferry_storage::Endpoints;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::TransferError;

/// Default lifetime of upload and download actions, in seconds.
pub const DEFAULT_ACTION_LIFETIME: u64 = 900;

/// Default lifetime of verify actions, in seconds.
///
/// Verification happens after the upload completes, which for large objects
/// can be long after the batch request.
pub const DEFAULT_VERIFY_LIFETIME: u64 = 12 * 60 * 60;

const DEFAULT_BASE_URL: &str = "http://localhost:5000/";

/// Settings of the transfer control plane.
///
/// ```
/// use ferry_transfer::TransferSettings;
///
/// let settings: TransferSettings =
///     serde_json::from_str(r#"{ "base_url": "https://lfs.example.com/" }"#).unwrap();
/// assert_eq!(settings.action_lifetime, 900);
/// assert_eq!(settings.verify_lifetime, 43200);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSettings {
    /// External URL the object and verify endpoints are served under.
    pub base_url: Url,
    /// Lifetime of upload and download actions, in seconds.
    #[serde(default = "default_action_lifetime")]
    pub action_lifetime: u64,
    /// Lifetime of verify actions, in seconds.
    #[serde(default = "default_verify_lifetime")]
    pub verify_lifetime: u64,
}

impl TransferSettings {
    /// Settings serving endpoints under `base_url` with default lifetimes.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            action_lifetime: DEFAULT_ACTION_LIFETIME,
            verify_lifetime: DEFAULT_VERIFY_LIFETIME,
        }
    }

    /// Endpoint builder for [`TransferSettings::base_url`].
    pub fn endpoints(&self) -> Result<Endpoints, TransferError> {
        Ok(Endpoints::new(self.base_url.clone())?)
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self::new(Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"))
    }
}

fn default_action_lifetime() -> u64 {
    DEFAULT_ACTION_LIFETIME
}

fn default_verify_lifetime() -> u64 {
    DEFAULT_VERIFY_LIFETIME
}
