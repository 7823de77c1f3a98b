#![warn(missing_docs)]

//! Pre-authorization for follow-up transfer requests.
//!
//! When the batch API hands out an upload or verify action, it embeds
//! headers that authorize exactly that action on exactly that object for a
//! limited time. The follow-up request presents those headers instead of the
//! client's credentials, and [`PreAuthorizer::authenticate`] turns them back
//! into an identity holding only the granted scope.
//!
//! Expiry is checked when headers are authenticated, never when they are
//! issued.

mod error;
pub use error::*;

mod scope;
pub use scope::*;

mod signed;
pub use signed::*;

use std::collections::BTreeMap;

use ferry_permission::DefaultIdentity;

/// Request or response headers, keyed by name.
pub type Headers = BTreeMap<String, String>;

/// Issues and checks pre-authorization headers.
pub trait PreAuthorizer: Send + Sync {
    /// Headers authorizing `scope` for `lifetime` seconds.
    fn headers(&self, scope: &PreAuthScope, lifetime: u64) -> Result<Headers, PreAuthError>;

    /// The identity authorized by previously issued `headers`.
    ///
    /// Returns `Ok(None)` when the headers carry no pre-authorization at all,
    /// so the caller can fall back to regular authentication.
    fn authenticate(&self, headers: &Headers) -> Result<Option<DefaultIdentity>, PreAuthError>;
}

/// A [`PreAuthorizer`] that never pre-authorizes anything: follow-up requests
/// must carry the client's own credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPreAuthorizer;

impl PreAuthorizer for NoPreAuthorizer {
    fn headers(&self, _scope: &PreAuthScope, _lifetime: u64) -> Result<Headers, PreAuthError> {
        Ok(Headers::new())
    }

    fn authenticate(&self, _headers: &Headers) -> Result<Option<DefaultIdentity>, PreAuthError> {
        Ok(None)
    }
}

/// Look up a header by name, ignoring ASCII case.
pub fn header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
