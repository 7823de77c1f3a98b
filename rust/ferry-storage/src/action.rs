use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Tells a client where and how to perform a transfer or verification step
/// out of band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// URL the client should send its request to.
    pub href: String,
    /// Headers the client must include with the request.
    #[serde(default)]
    pub header: BTreeMap<String, String>,
    /// Number of seconds the action remains usable.
    pub expires_in: u64,
}

impl ActionDescriptor {
    /// Create a descriptor without headers.
    pub fn new(href: impl Into<String>, expires_in: u64) -> Self {
        Self {
            href: href.into(),
            header: BTreeMap::new(),
            expires_in,
        }
    }

    /// Attach headers to the descriptor.
    pub fn with_header(mut self, header: BTreeMap<String, String>) -> Self {
        self.header = header;
        self
    }
}

/// Client supplied hints that accompany an object in a batch request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectExtra {
    /// Name the downloaded file should be saved as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Requested `Content-Disposition` of the download.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposition: Option<String>,
}

impl ObjectExtra {
    /// The `Content-Disposition` header value implied by these hints, if any.
    ///
    /// A filename turns into an attachment disposition; a bare disposition is
    /// passed through as given. Filenames that sanitize to nothing count as
    /// absent.
    pub fn content_disposition(&self) -> Option<String> {
        let filename = self
            .filename
            .as_deref()
            .map(safe_filename)
            .filter(|filename| !filename.is_empty());
        match (filename, &self.disposition) {
            (Some(filename), Some(_)) => Some(format!("attachment; filename=\"{filename}\"")),
            (None, Some(disposition)) => Some(disposition.clone()),
            _ => None,
        }
    }
}

/// Strip everything but ASCII alphanumerics, `.`, `_`, `-` and spaces from a
/// client supplied filename.
pub fn safe_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' '))
        .collect()
}
