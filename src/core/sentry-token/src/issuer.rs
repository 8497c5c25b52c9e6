//! Token issuance.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{Algorithm, Header};
use tracing::debug;

use sentry_idgen::IdGenerator;
use sentry_keystore::{KeyStore, KeyStoreError};

use crate::claims::{Claims, IssuedToken};
use crate::error::IssueError;

/// Allowed range for requested token lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlBounds {
    /// Smallest lifetime a caller may request.
    pub min: Duration,
    /// Largest lifetime a caller may request.
    pub max: Duration,
}

impl Default for TtlBounds {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(1),
            max: Duration::from_secs(3600),
        }
    }
}

/// Builds and signs tokens asserting this service's identity.
///
/// Holds the issuer identity, a handle to the key store for the active
/// signing key, and the identifier generator for unique token ids.
pub struct TokenIssuer {
    identity: String,
    key_store: Arc<KeyStore>,
    ids: Arc<IdGenerator>,
    ttl_bounds: TtlBounds,
}

impl TokenIssuer {
    /// Creates an issuer with the default lifetime bounds (1 s to 1 h).
    pub fn new(
        identity: impl Into<String>,
        key_store: Arc<KeyStore>,
        ids: Arc<IdGenerator>,
    ) -> Self {
        Self {
            identity: identity.into(),
            key_store,
            ids,
            ttl_bounds: TtlBounds::default(),
        }
    }

    /// Replaces the lifetime bounds.
    pub fn with_ttl_bounds(mut self, ttl_bounds: TtlBounds) -> Self {
        self.ttl_bounds = ttl_bounds;
        self
    }

    /// The issuer identity stamped into every token.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Issues a signed token asserting `subject` for the next `ttl`.
    ///
    /// # Errors
    ///
    /// - [`IssueError::EmptySubject`] / [`IssueError::TtlOutOfRange`] for
    ///   bad requests.
    /// - [`IssueError::NoSigningKey`] if the key store cannot sign — fatal
    ///   misconfiguration, never retried.
    /// - [`IssueError::Id`] if the identifier generator refuses (clock
    ///   regression); issuance halts rather than weakening uniqueness.
    pub fn issue(&self, subject: &str, ttl: Duration) -> Result<IssuedToken, IssueError> {
        if subject.is_empty() {
            return Err(IssueError::EmptySubject);
        }

        if ttl < self.ttl_bounds.min || ttl > self.ttl_bounds.max {
            return Err(IssueError::TtlOutOfRange {
                requested_secs: ttl.as_secs(),
                min_secs: self.ttl_bounds.min.as_secs(),
                max_secs: self.ttl_bounds.max.as_secs(),
            });
        }

        let (key_id, signing_key) = self.key_store.signing_key().map_err(|e| match e {
            KeyStoreError::NoSigningKey => IssueError::NoSigningKey,
            other => IssueError::Signing(other.to_string()),
        })?;

        let token_id = self.ids.next_id()?;

        let now = now_secs();
        let expires_at = now + ttl.as_secs();
        let claims = Claims {
            jti: token_id.to_string(),
            iss: self.identity.clone(),
            sub: subject.to_string(),
            iat: now,
            exp: expires_at,
        };

        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(key_id.clone());

        let token = jsonwebtoken::encode(&header, &claims, &signing_key)
            .map_err(|e| IssueError::Signing(e.to_string()))?;

        debug!(
            token_id,
            subject = %claims.sub,
            key_id = %key_id,
            expires_at,
            "issued token"
        );

        Ok(IssuedToken {
            token,
            token_id,
            expires_at,
        })
    }
}

pub(crate) fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time before UNIX epoch")
        .as_secs()
}
