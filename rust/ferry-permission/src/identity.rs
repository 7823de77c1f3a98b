use std::fmt::{Debug, Display, Formatter};

use crate::{GrantTree, Permission, PermissionSet};

/// An authenticated user (or token bearer) that can be asked whether it may
/// perform an operation on an object or repository.
pub trait Identity: Debug + Send + Sync {
    /// Display name, if known.
    fn name(&self) -> Option<&str>;

    /// Stable identifier, if known.
    fn id(&self) -> Option<&str>;

    /// Email address, if known.
    fn email(&self) -> Option<&str>;

    /// Whether this identity holds `permission` for `oid` (or the repository
    /// as a whole when `oid` is `None`).
    fn is_authorized(
        &self,
        organization: &str,
        repository: &str,
        permission: Permission,
        oid: Option<&str>,
    ) -> bool;
}

/// An [`Identity`] backed by an in-memory [`GrantTree`].
///
/// Identities are built once per request context, granted what the
/// authentication step decides, and discarded with the request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DefaultIdentity {
    name: Option<String>,
    id: Option<String>,
    email: Option<String>,
    grants: GrantTree,
}

impl DefaultIdentity {
    /// Create an anonymous identity with no grants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Grant `permissions` at the given coordinate; `None` for organization,
    /// repository or oid grants regardless of that dimension.
    ///
    /// See [`GrantTree::allow`] for the meaning of `permissions: None`.
    pub fn allow(
        &mut self,
        organization: Option<&str>,
        repository: Option<&str>,
        permissions: Option<PermissionSet>,
        oid: Option<&str>,
    ) {
        self.grants.allow(organization, repository, permissions, oid);
    }

    /// The grants held by this identity.
    pub fn grants(&self) -> &GrantTree {
        &self.grants
    }
}

impl Identity for DefaultIdentity {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    fn is_authorized(
        &self,
        organization: &str,
        repository: &str,
        permission: Permission,
        oid: Option<&str>,
    ) -> bool {
        self.grants
            .is_authorized(organization, repository, permission, oid)
    }
}

impl Display for DefaultIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<DefaultIdentity id:{} name:{}>",
            self.id.as_deref().unwrap_or("None"),
            self.name.as_deref().unwrap_or("None")
        )
    }
}

// Grants are left out so that logging an identity never dumps its tree.
impl Debug for DefaultIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}
