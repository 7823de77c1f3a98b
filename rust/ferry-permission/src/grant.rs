use std::collections::HashMap;

use crate::{Permission, PermissionSet};

/// One dimension of the grant tree.
///
/// Entries are keyed either by a concrete name or by the wildcard, which
/// applies regardless of the dimension's value. A missing entry and an entry
/// holding an empty value are different states: lookups never create entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level<T> {
    named: HashMap<String, T>,
    wildcard: Option<T>,
}

impl<T> Default for Level<T> {
    fn default() -> Self {
        Self {
            named: HashMap::new(),
            wildcard: None,
        }
    }
}

impl<T> Level<T> {
    /// Look up the entry for `key`, where `None` addresses the wildcard
    /// entry.
    pub fn get(&self, key: Option<&str>) -> Option<&T> {
        match key {
            Some(name) => self.named.get(name),
            None => self.wildcard.as_ref(),
        }
    }

    /// Whether no entry (named or wildcard) has been recorded.
    pub fn is_empty(&self) -> bool {
        self.named.is_empty() && self.wildcard.is_none()
    }
}

impl<T: Default> Level<T> {
    fn entry(&mut self, key: Option<&str>) -> &mut T {
        match key {
            Some(name) => self.named.entry(name.to_string()).or_default(),
            None => self.wildcard.get_or_insert_with(T::default),
        }
    }
}

/// Grants keyed by organization, then repository, then object id.
///
/// Grants are additive: there is no way to revoke a permission once it has
/// been allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantTree {
    organizations: Level<Level<Level<PermissionSet>>>,
}

impl GrantTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a grant at the given coordinate.
    ///
    /// With `permissions` set, they are unioned into whatever the coordinate
    /// already holds. Without, the coordinate is still recorded (holding an
    /// empty set when new), which makes it a known, more specific entry than
    /// the wildcard entries around it.
    pub fn allow(
        &mut self,
        organization: Option<&str>,
        repository: Option<&str>,
        permissions: Option<PermissionSet>,
        oid: Option<&str>,
    ) {
        let granted = self
            .organizations
            .entry(organization)
            .entry(repository)
            .entry(oid);

        if let Some(permissions) = permissions {
            granted.extend(permissions);
        }
    }

    /// The permissions recorded at exactly this coordinate, if any.
    pub fn grant(
        &self,
        organization: Option<&str>,
        repository: Option<&str>,
        oid: Option<&str>,
    ) -> Option<&PermissionSet> {
        self.organizations
            .get(organization)?
            .get(repository)?
            .get(oid)
    }

    /// Whether `permission` is granted for the object `oid` in
    /// `organization/repository`.
    pub fn is_authorized(
        &self,
        organization: &str,
        repository: &str,
        permission: Permission,
        oid: Option<&str>,
    ) -> bool {
        let granted = match self.organizations.get(Some(organization)) {
            // Unknown organization: the global wildcard applies, but its
            // object level is keyed by the requested oid.
            None => self
                .organizations
                .get(None)
                .and_then(|repositories| repositories.get(None))
                .and_then(|objects| objects.get(oid)),
            Some(repositories) => match repositories.get(Some(repository)) {
                None => repositories
                    .get(None)
                    .and_then(|objects| objects.get(None)),
                Some(objects) => objects.get(oid).or_else(|| objects.get(None)),
            },
        };

        granted.is_some_and(|permissions| permissions.contains(&permission))
    }

    /// Whether nothing has been granted at all.
    pub fn is_empty(&self) -> bool {
        self.organizations.is_empty()
    }
}
