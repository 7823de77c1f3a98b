use ferry_storage::{ActionDescriptor, ErrorObject};
use serde::{Deserialize, Serialize};

/// Actions offered for a single object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actions {
    /// Where to send the object's content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<ActionDescriptor>,
    /// Where to confirm a completed upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify: Option<ActionDescriptor>,
    /// Where to fetch the object's content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<ActionDescriptor>,
}

/// The per-object entry of a batch response.
///
/// A response carries either `actions` or an `error`, never both. Neither
/// means the object needs no transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResponse {
    /// Object id.
    pub oid: String,
    /// Object size the client asked about.
    pub size: u64,
    /// Whether the actions carry their own authorization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticated: Option<bool>,
    /// Actions the client should perform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Actions>,
    /// Why the object cannot be transferred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl TransferResponse {
    /// A response with nothing to do.
    pub fn new(oid: impl Into<String>, size: u64) -> Self {
        Self {
            oid: oid.into(),
            size,
            authenticated: None,
            actions: None,
            error: None,
        }
    }

    /// A response offering self-authenticating `actions`.
    pub fn with_actions(mut self, actions: Actions) -> Self {
        self.actions = Some(actions);
        self.authenticated = Some(true);
        self.error = None;
        self
    }

    /// A response reporting `error`.
    pub fn with_error(mut self, error: ErrorObject) -> Self {
        self.error = Some(error);
        self.actions = None;
        self.authenticated = None;
        self
    }

    /// Whether this response reports an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
