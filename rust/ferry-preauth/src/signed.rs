use std::fmt::{Debug, Formatter};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use ferry_permission::DefaultIdentity;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{Headers, PreAuthError, PreAuthScope, PreAuthorizer, header};

/// Default header carrying the token.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

const BEARER: &str = "Bearer ";

/// Name given to identities recovered from a token.
pub const PRE_AUTHORIZED_NAME: &str = "pre-authorized";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    scope: PreAuthScope,
    exp: i64,
}

/// Issues `Authorization: Bearer <token>` headers where the token is an
/// HMAC-SHA256 signed, base64url encoded JSON description of the scope and
/// its expiry time.
///
/// Tokens are stateless: anyone holding the secret can check them, and
/// nothing can revoke one before it expires.
#[derive(Clone)]
pub struct SignedTokenAuthorizer {
    secret: Vec<u8>,
    header_name: String,
}

impl SignedTokenAuthorizer {
    /// Create an authorizer signing with `secret`.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            header_name: AUTHORIZATION_HEADER.to_string(),
        }
    }

    /// Carry tokens in `header_name` instead of `Authorization`.
    pub fn with_header_name(mut self, header_name: impl Into<String>) -> Self {
        self.header_name = header_name.into();
        self
    }

    fn mac(&self) -> Hmac<Sha256> {
        Hmac::new_from_slice(&self.secret).expect("HMAC can take key of any size")
    }

    pub(crate) fn issue_at(
        &self,
        scope: &PreAuthScope,
        lifetime: u64,
        now: DateTime<Utc>,
    ) -> Result<String, PreAuthError> {
        let lifetime = i64::try_from(lifetime)
            .map_err(|_| PreAuthError::Signing(format!("Lifetime {lifetime}s is out of range")))?;
        let claims = Claims {
            scope: scope.clone(),
            exp: now.timestamp().saturating_add(lifetime),
        };
        let payload = serde_json::to_vec(&claims)
            .map_err(|error| PreAuthError::Encoding(error.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(payload);

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{payload}.{signature}"))
    }

    pub(crate) fn verify_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<PreAuthScope, PreAuthError> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| PreAuthError::InvalidToken("Missing signature".into()))?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|error| PreAuthError::InvalidToken(error.to_string()))?;

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| PreAuthError::InvalidToken("Signature mismatch".into()))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|error| PreAuthError::InvalidToken(error.to_string()))?;
        let claims: Claims = serde_json::from_slice(&payload)
            .map_err(|error| PreAuthError::InvalidToken(error.to_string()))?;

        if now.timestamp() >= claims.exp {
            return Err(PreAuthError::Expired);
        }
        Ok(claims.scope)
    }
}

impl Debug for SignedTokenAuthorizer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedTokenAuthorizer")
            .field("secret", &"[redacted]")
            .field("header_name", &self.header_name)
            .finish()
    }
}

impl PreAuthorizer for SignedTokenAuthorizer {
    fn headers(&self, scope: &PreAuthScope, lifetime: u64) -> Result<Headers, PreAuthError> {
        let token = self.issue_at(scope, lifetime, Utc::now())?;
        tracing::debug!(%scope, lifetime, "Issued pre-authorization");
        Ok(Headers::from([(
            self.header_name.clone(),
            format!("{BEARER}{token}"),
        )]))
    }

    fn authenticate(&self, headers: &Headers) -> Result<Option<DefaultIdentity>, PreAuthError> {
        let Some(token) = header(headers, &self.header_name)
            .and_then(|value| value.strip_prefix(BEARER))
        else {
            return Ok(None);
        };

        let scope = self.verify_at(token.trim(), Utc::now()).inspect_err(|error| {
            tracing::warn!(%error, "Rejected pre-authorization");
        })?;

        let mut identity = DefaultIdentity::new().with_name(PRE_AUTHORIZED_NAME);
        identity.allow(
            Some(&scope.organization),
            Some(&scope.repository),
            Some(scope.permissions()),
            scope.oid.as_deref(),
        );
        Ok(Some(identity))
    }
}
