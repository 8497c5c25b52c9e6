//! Token validation.
//!
//! Validation is a pure decision function: a presented token moves through
//! a fixed sequence of checks and comes out `Accepted` or `Rejected` with a
//! structured reason. Every rejection is terminal and every ambiguity
//! rejects — there is no "unknown" outcome and nothing to clean up if the
//! caller abandons the request mid-way.
//!
//! The transitions, each its own fallible step:
//!
//! ```text
//! Received -> KeyResolved -> SignatureChecked -> ClaimsChecked -> Accepted
//!     |            |               |                  |
//!     v            v               v                  v
//! Malformed    UnknownKey     BadSignature     Expired | UntrustedIssuer
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, Validation};
use tracing::debug;

use sentry_keystore::KeyStore;

use crate::claims::Claims;
use crate::error::RejectReason;
use crate::issuer::now_secs;

/// Tolerance for clock skew between issuer and validator.
///
/// Applied conservatively: a token stops validating this long *before* its
/// nominal expiry, so a validator with a slow clock can never accept a
/// token the issuer already considers dead.
pub const CLOCK_SKEW: Duration = Duration::from_secs(5);

/// The validator's decision on a presented token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The token is genuine, current, and from a trusted issuer.
    Accepted {
        /// Identity the token asserts.
        subject: String,
        /// Identity of the issuing service.
        issuer: String,
        /// The token's unique id.
        token_id: u64,
    },
    /// The token was refused.
    Rejected {
        /// Why it was refused.
        reason: RejectReason,
    },
}

impl Verdict {
    /// True if the token was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted { .. })
    }
}

/// What a structurally valid presentation tells us before verification.
struct Presented {
    kid: String,
}

/// Validates presented tokens against the key store and a trusted-issuer
/// set.
///
/// Holds no mutable state: validations are independent and may run
/// concurrently or be abandoned at any point without side effects.
pub struct TokenValidator {
    key_store: Arc<KeyStore>,
    trusted_issuers: HashSet<String>,
    clock_skew_secs: u64,
}

impl TokenValidator {
    /// Creates a validator trusting exactly the given issuer identities.
    pub fn new(key_store: Arc<KeyStore>, trusted_issuers: impl IntoIterator<Item = String>) -> Self {
        Self {
            key_store,
            trusted_issuers: trusted_issuers.into_iter().collect(),
            clock_skew_secs: CLOCK_SKEW.as_secs(),
        }
    }

    /// Validates a presented token against the current clock.
    pub fn validate(&self, token: &str) -> Verdict {
        self.validate_at(token, now_secs())
    }

    /// Validates against an explicit clock reading.
    ///
    /// The decision is deterministic in `(token, key set, now)`, which is
    /// what makes each rejection reason independently testable.
    pub fn validate_at(&self, token: &str, now: u64) -> Verdict {
        match self.decide(token, now) {
            Ok(verdict) => verdict,
            Err(reason) => {
                debug!(%reason, "token rejected");
                Verdict::Rejected { reason }
            }
        }
    }

    /// Runs the transition sequence.
    fn decide(&self, token: &str, now: u64) -> Result<Verdict, RejectReason> {
        // Received: structural parse of the presented bytes.
        let presented = parse(token)?;

        // KeyResolved: a miss is a definite rejection, never a fetch.
        let key = self
            .key_store
            .public_key_for(&presented.kid)
            .ok_or(RejectReason::UnknownKey)?;

        // SignatureChecked.
        let claims = check_signature(token, &key)?;

        // ClaimsChecked.
        let token_id = self.check_claims(&claims, now)?;

        Ok(Verdict::Accepted {
            subject: claims.sub,
            issuer: claims.iss,
            token_id,
        })
    }

    fn check_claims(&self, claims: &Claims, now: u64) -> Result<u64, RejectReason> {
        // A claim set that expires at or before its own issuance never
        // described a valid token.
        if claims.exp <= claims.iat {
            return Err(RejectReason::Malformed);
        }

        let token_id: u64 = claims.jti.parse().map_err(|_| RejectReason::Malformed)?;

        if now + self.clock_skew_secs >= claims.exp {
            return Err(RejectReason::Expired);
        }

        if !self.trusted_issuers.contains(&claims.iss) {
            return Err(RejectReason::UntrustedIssuer);
        }

        Ok(token_id)
    }
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("trusted_issuers", &self.trusted_issuers)
            .field("clock_skew_secs", &self.clock_skew_secs)
            .finish()
    }
}

/// Structural parse: compact JWS shape, EdDSA algorithm, key id present.
///
/// Algorithm substitution (`none`, HMAC variants) is a malformed
/// presentation, caught here before any key material is touched.
fn parse(token: &str) -> Result<Presented, RejectReason> {
    let header = jsonwebtoken::decode_header(token).map_err(|_| RejectReason::Malformed)?;

    if header.alg != Algorithm::EdDSA {
        return Err(RejectReason::Malformed);
    }

    let kid = header.kid.ok_or(RejectReason::Malformed)?;

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || parts[2].is_empty() {
        return Err(RejectReason::Malformed);
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|_| RejectReason::Malformed)?;
    let _: Claims = serde_json::from_slice(&payload).map_err(|_| RejectReason::Malformed)?;

    Ok(Presented { kid })
}

/// Verifies the signature over the signing input and returns the claims as
/// actually signed.
///
/// Expiry is checked separately so the skew policy lives in one place.
fn check_signature(token: &str, key: &DecodingKey) -> Result<Claims, RejectReason> {
    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    match jsonwebtoken::decode::<Claims>(token, key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(e) => match e.kind() {
            ErrorKind::InvalidSignature => Err(RejectReason::BadSignature),
            _ => Err(RejectReason::Malformed),
        },
    }
}
