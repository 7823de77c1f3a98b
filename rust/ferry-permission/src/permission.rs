use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A set of [`Permission`]s. Permissions are always granted and checked as
/// sets.
pub type PermissionSet = BTreeSet<Permission>;

/// System wide permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    /// Download object content.
    #[serde(rename = "read")]
    Read,
    /// Inspect object metadata (existence, size) without reading content.
    #[serde(rename = "read-meta")]
    ReadMeta,
    /// Upload object content.
    #[serde(rename = "write")]
    Write,
}

impl Permission {
    /// Every permission known to the system.
    pub fn all() -> PermissionSet {
        PermissionSet::from([Permission::Read, Permission::ReadMeta, Permission::Write])
    }

    /// The wire name of this permission.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::ReadMeta => "read-meta",
            Permission::Write => "write",
        }
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a string that does not name a [`Permission`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown permission: {0}")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "read" => Ok(Permission::Read),
            "read-meta" => Ok(Permission::ReadMeta),
            "write" => Ok(Permission::Write),
            other => Err(UnknownPermission(other.to_string())),
        }
    }
}
