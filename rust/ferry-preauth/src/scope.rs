use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use ferry_permission::{Permission, PermissionSet};
use serde::{Deserialize, Serialize};

/// A follow-up action a pre-authorization may cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreAuthAction {
    /// Downloading object content.
    Read,
    /// Uploading object content.
    Write,
    /// Verifying an uploaded object.
    Verify,
}

impl PreAuthAction {
    /// Permissions an identity needs to perform this action.
    pub fn permissions(&self) -> PermissionSet {
        match self {
            PreAuthAction::Read => PermissionSet::from([Permission::Read, Permission::ReadMeta]),
            PreAuthAction::Write => PermissionSet::from([Permission::Write]),
            PreAuthAction::Verify => PermissionSet::from([Permission::ReadMeta]),
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PreAuthAction::Read => "read",
            PreAuthAction::Write => "write",
            PreAuthAction::Verify => "verify",
        }
    }
}

/// What a pre-authorization grants: some actions on one repository,
/// optionally narrowed to a single object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreAuthScope {
    /// Organization the repository belongs to.
    pub organization: String,
    /// Repository name.
    pub repository: String,
    /// Object the scope is narrowed to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,
    /// Granted actions.
    pub actions: BTreeSet<PreAuthAction>,
}

impl PreAuthScope {
    /// An empty scope on a repository.
    pub fn new(organization: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            repository: repository.into(),
            oid: None,
            actions: BTreeSet::new(),
        }
    }

    /// Narrow the scope to one object.
    pub fn with_oid(mut self, oid: impl Into<String>) -> Self {
        self.oid = Some(oid.into());
        self
    }

    /// Add `actions` to the scope.
    pub fn with_actions(mut self, actions: impl IntoIterator<Item = PreAuthAction>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Union of the permissions every granted action needs.
    pub fn permissions(&self) -> PermissionSet {
        self.actions
            .iter()
            .flat_map(|action| action.permissions())
            .collect()
    }
}

impl Display for PreAuthScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let actions: Vec<_> = self.actions.iter().map(PreAuthAction::as_str).collect();
        write!(
            f,
            "obj:{}/{}/{}:{}",
            self.organization,
            self.repository,
            self.oid.as_deref().unwrap_or("*"),
            actions.join(",")
        )
    }
}
