#![warn(missing_docs)]

//! Permission model for the ferry transfer control plane.
//!
//! Access is granted along three nested dimensions: organization, repository
//! and object id. Each dimension may be granted for a concrete value or for
//! any value (a wildcard, expressed as `None`). Lookups walk from the most
//! specific grant to the least specific one:
//!
//! 1. exact object id under a known organization and repository
//! 2. any object id under a known organization and repository
//! 3. any repository under a known organization
//! 4. any organization and any repository, for the requested object id
//!
//! ```
//! use ferry_permission::{DefaultIdentity, Identity, Permission, PermissionSet};
//!
//! let mut identity = DefaultIdentity::new().with_name("alice");
//! identity.allow(
//!     Some("acme"),
//!     Some("widgets"),
//!     Some(PermissionSet::from([Permission::Write])),
//!     None,
//! );
//!
//! assert!(identity.is_authorized("acme", "widgets", Permission::Write, Some("abc123")));
//! assert!(!identity.is_authorized("acme", "widgets", Permission::Read, Some("abc123")));
//! assert!(!identity.is_authorized("acme", "other", Permission::Write, None));
//! ```

mod grant;
pub use grant::*;

mod identity;
pub use identity::*;

mod permission;
pub use permission::*;
